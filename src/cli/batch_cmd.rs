use anyhow::Result;
use serde_json::json;

use crate::core::batch::OutcomeStatus;
use crate::core::store::BatchStore;
use crate::core::terminal::{GuideSection, print_error};

pub(crate) async fn run_batch_status(args: &[String]) -> Result<i32> {
    let Some(batch_id) = args.get(3) else {
        GuideSection::new("mailgoat batch status")
            .text("Show the stored result of one batch.")
            .blank()
            .hint("mailgoat batch status 4f7f3f2a0c6e4b5d", "")
            .print();
        println!();
        return Ok(1);
    };

    let store = BatchStore::open_default()?;
    let Some(record) = store.load(batch_id).await? else {
        print_error(&format!("batch not found: {}", batch_id));
        return Ok(1);
    };

    let failures: Vec<_> = record
        .outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Failed)
        .map(|o| {
            json!({
                "row_index": o.row_index,
                "to": o.to,
                "error": o.error,
            })
        })
        .collect();

    println!(
        "{}",
        json!({
            "batch_id": record.batch_id,
            "status": record.status,
            "total": record.total_count,
            "sent": record.sent_count(),
            "failed": record.failed_count(),
            "continue_on_error": record.continue_on_error,
            "rate_limit": record.rate_limit,
            "created_at": record.created_at,
            "finished_at": record.finished_at,
            "failures": failures,
        })
    );
    Ok(0)
}
