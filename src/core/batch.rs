use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::client::Mailer;
use crate::core::profiles::Profile;
use crate::core::rate::SendPacer;
use crate::core::recipients::RowEntry;
use crate::core::template::{TemplateSpec, render};
use crate::core::terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every attempted row was sent.
    Completed,
    /// Ran to completion with at least one failed row.
    PartiallyFailed,
    /// Stopped early because continue-on-error was disabled.
    Aborted,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Completed => "completed",
            BatchStatus::PartiallyFailed => "partially_failed",
            BatchStatus::Aborted => "aborted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(BatchStatus::Completed),
            "partially_failed" => Some(BatchStatus::PartiallyFailed),
            "aborted" => Some(BatchStatus::Aborted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Sent,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Sent => "sent",
            OutcomeStatus::Failed => "failed",
        }
    }
}

/// Result of attempting one recipient. `to` is absent when the row was too
/// malformed to carry a recipient address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageOutcome {
    pub row_index: usize,
    pub to: Option<String>,
    pub status: OutcomeStatus,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

/// One sealed batch invocation. Built in memory during the run, never
/// mutated after sealing, persisted write-once by the batch store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRecord {
    pub batch_id: String,
    pub created_at: String,
    pub finished_at: Option<String>,
    pub profile: String,
    pub total_count: usize,
    pub continue_on_error: bool,
    pub rate_limit: Option<u32>,
    pub status: BatchStatus,
    pub outcomes: Vec<MessageOutcome>,
}

impl BatchRecord {
    pub fn sent_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Sent)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub continue_on_error: bool,
    pub rate_limit: Option<u32>,
    /// Draw the in-place progress bar (CLI runs only; tests leave it off).
    pub progress: bool,
}

/// Drives the render → pace → send loop over the rows in input order and
/// aggregates one outcome per attempted row. Render and send failures are
/// treated identically: a failed outcome, and an abort when
/// continue-on-error is disabled. No row is ever retried here.
pub async fn run_batch(
    mailer: &dyn Mailer,
    rows: &[RowEntry],
    template: Option<&TemplateSpec>,
    profile: &Profile,
    options: &BatchOptions,
) -> BatchRecord {
    let batch_id = Uuid::new_v4().simple().to_string();
    let total = rows.len();
    info!(batch_id = %batch_id, total, "starting batch");

    let mut pacer = options.rate_limit.map(SendPacer::new);
    let mut outcomes: Vec<MessageOutcome> = Vec::with_capacity(total);
    let mut aborted = false;

    let created_at = chrono::Utc::now().to_rfc3339();

    for (row_index, entry) in rows.iter().enumerate() {
        let outcome = match entry {
            Err(reason) => MessageOutcome {
                row_index,
                to: None,
                status: OutcomeStatus::Failed,
                message_id: None,
                error: Some(reason.clone()),
            },
            Ok(row) => {
                let to = Some(row.to.join(", "));
                match render(template, row, profile.from_address.as_deref()) {
                    Err(e) => MessageOutcome {
                        row_index,
                        to,
                        status: OutcomeStatus::Failed,
                        message_id: None,
                        error: Some(e.to_string()),
                    },
                    Ok(message) => {
                        if let Some(pacer) = pacer.as_mut() {
                            pacer.acquire().await;
                        }
                        match mailer
                            .send(
                                &message.to,
                                &message.subject,
                                &message.body,
                                message.from_address.as_deref(),
                            )
                            .await
                        {
                            Ok(message_id) => MessageOutcome {
                                row_index,
                                to,
                                status: OutcomeStatus::Sent,
                                message_id: Some(message_id),
                                error: None,
                            },
                            Err(e) => MessageOutcome {
                                row_index,
                                to,
                                status: OutcomeStatus::Failed,
                                message_id: None,
                                error: Some(e.to_string()),
                            },
                        }
                    }
                }
            }
        };

        let failed = outcome.status == OutcomeStatus::Failed;
        if failed {
            warn!(
                batch_id = %batch_id,
                row = row_index,
                error = outcome.error.as_deref().unwrap_or(""),
                "row failed"
            );
        }
        outcomes.push(outcome);

        if options.progress {
            let sent = outcomes
                .iter()
                .filter(|o| o.status == OutcomeStatus::Sent)
                .count();
            terminal::print_progress(row_index + 1, total, sent, outcomes.len() - sent);
        }

        if failed && !options.continue_on_error {
            aborted = true;
            break;
        }
    }
    if options.progress && total > 0 {
        println!();
    }

    let failed_count = outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Failed)
        .count();
    let status = if aborted {
        BatchStatus::Aborted
    } else if failed_count == 0 {
        BatchStatus::Completed
    } else {
        BatchStatus::PartiallyFailed
    };

    let record = BatchRecord {
        batch_id,
        created_at,
        finished_at: Some(chrono::Utc::now().to_rfc3339()),
        profile: profile.name.clone(),
        total_count: total,
        continue_on_error: options.continue_on_error,
        rate_limit: options.rate_limit,
        status,
        outcomes,
    };
    info!(
        batch_id = %record.batch_id,
        status = record.status.as_str(),
        sent = record.sent_count(),
        failed = record.failed_count(),
        "batch sealed"
    );
    record
}
