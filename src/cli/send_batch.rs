use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::json;

use crate::core::batch::{BatchOptions, BatchRecord, BatchStatus, OutcomeStatus, run_batch};
use crate::core::client::MailClient;
use crate::core::profiles::{ProfileStore, resolve_profile};
use crate::core::recipients::{RecipientSource, read_recipients};
use crate::core::store::BatchStore;
use crate::core::template::TemplateSpec;
use crate::core::terminal::{print_error, print_warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SendBatchArgs {
    pub profile: Option<String>,
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub stdin: bool,
    pub template: Option<PathBuf>,
    pub continue_on_error: bool,
    pub rate_limit: Option<u32>,
    pub error_log: Option<PathBuf>,
}

pub(crate) fn parse_send_batch_args(
    args: &[String],
    start: usize,
) -> Result<SendBatchArgs, String> {
    let mut parsed = SendBatchArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--profile" | "-p" => {
                if i + 1 < args.len() {
                    parsed.profile = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    return Err("--profile requires a value".to_string());
                }
            }
            "--csv" => {
                if i + 1 < args.len() {
                    parsed.csv = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    return Err("--csv requires a path".to_string());
                }
            }
            "--json" => {
                if i + 1 < args.len() {
                    parsed.json = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    return Err("--json requires a path".to_string());
                }
            }
            "--stdin" => {
                parsed.stdin = true;
                i += 1;
            }
            "--template" | "-t" => {
                if i + 1 < args.len() {
                    parsed.template = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    return Err("--template requires a path".to_string());
                }
            }
            "--continue-on-error" => {
                parsed.continue_on_error = true;
                i += 1;
            }
            "--rate-limit" => {
                if i + 1 < args.len() {
                    let rate: u32 = args[i + 1]
                        .parse()
                        .ok()
                        .filter(|r| *r >= 1)
                        .ok_or_else(|| {
                            format!("--rate-limit must be a positive integer, got '{}'", args[i + 1])
                        })?;
                    parsed.rate_limit = Some(rate);
                    i += 2;
                } else {
                    return Err("--rate-limit requires a value".to_string());
                }
            }
            "--error-log" => {
                if i + 1 < args.len() {
                    parsed.error_log = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    return Err("--error-log requires a path".to_string());
                }
            }
            other => return Err(format!("unknown flag: {}", other)),
        }
    }
    Ok(parsed)
}

fn error_log_path(explicit: Option<&Path>, batch_id: &str) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("batch_{}_errors.log", batch_id)))
}

/// Appends one line per failed row. Leaves the filesystem alone when every
/// row was sent, and returns the path it wrote to.
fn write_error_log(
    record: &BatchRecord,
    explicit: Option<&Path>,
) -> std::io::Result<Option<PathBuf>> {
    if record.failed_count() == 0 {
        return Ok(None);
    }
    let path = error_log_path(explicit, &record.batch_id);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    for outcome in &record.outcomes {
        if outcome.status != OutcomeStatus::Failed {
            continue;
        }
        writeln!(
            file,
            "row {}: {}: {}",
            outcome.row_index,
            outcome.to.as_deref().unwrap_or("<no recipient>"),
            outcome.error.as_deref().unwrap_or("unknown error")
        )?;
    }
    Ok(Some(path))
}

fn summary_json(record: &BatchRecord) -> String {
    json!({
        "batch_id": record.batch_id,
        "status": record.status,
        "total": record.total_count,
        "sent": record.sent_count(),
        "failed": record.failed_count(),
        "created_at": record.created_at,
        "finished_at": record.finished_at,
    })
    .to_string()
}

pub(crate) async fn run_send_batch(args: &[String]) -> Result<i32> {
    let parsed = parse_send_batch_args(args, 2)
        .map_err(|e| anyhow::anyhow!("configuration error: {}", e))?;

    let source = RecipientSource::select(parsed.csv, parsed.json, parsed.stdin)?;
    let template = parsed
        .template
        .as_deref()
        .map(TemplateSpec::load)
        .transpose()?;
    let rows = read_recipients(&source, template.is_some())?;

    let profile_store = ProfileStore::open_default();
    let env_profile = std::env::var("MAILGOAT_PROFILE").ok();
    let profile = resolve_profile(
        parsed.profile.as_deref(),
        env_profile.as_deref(),
        &profile_store,
    )?;

    // Open the store up front so an unusable store aborts before any send.
    let store = BatchStore::open_default()?;

    let client = MailClient::new(&profile.server, &profile.api_key);
    let options = BatchOptions {
        continue_on_error: parsed.continue_on_error,
        rate_limit: parsed.rate_limit,
        progress: true,
    };
    let record = run_batch(&client, &rows, template.as_ref(), &profile, &options).await;

    match write_error_log(&record, parsed.error_log.as_deref()) {
        Ok(Some(path)) => print_warn(&format!(
            "failure details appended to {}",
            path.display()
        )),
        Ok(None) => {}
        Err(e) => print_warn(&format!("could not write error log: {}", e)),
    }

    let save_result = store.save(&record).await;
    println!("{}", summary_json(&record));

    if let Err(e) = save_result {
        print_error(&format!(
            "storage error: {}; the batch result above was NOT persisted and `batch status` will not find it",
            e
        ));
        return Ok(1);
    }

    if record.status == BatchStatus::Aborted {
        if let Some(last) = record.outcomes.last() {
            print_error(&format!(
                "batch aborted at row {}: {}",
                last.row_index,
                last.error.as_deref().unwrap_or("unknown error")
            ));
        }
        return Ok(1);
    }
    if record.status == BatchStatus::PartiallyFailed {
        print_warn(&format!(
            "{} of {} rows failed; see `mailgoat batch status {}`",
            record.failed_count(),
            record.total_count,
            record.batch_id
        ));
    }
    Ok(0)
}
