use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, params};
use tokio::sync::Mutex;
use tracing::info;

use crate::core::batch::{BatchRecord, BatchStatus, MessageOutcome, OutcomeStatus};
use crate::core::error::StorageError;

/// Write-once persistence for sealed batch records. Records are keyed by
/// batch id; concurrent saves with distinct ids do not interfere because
/// each save is a single transaction and no update path exists.
pub struct BatchStore {
    db: Arc<Mutex<Connection>>,
}

impl BatchStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(&crate::core::data_dir().join("batches.db"))
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Persists a sealed record. Saving the same batch id twice is an error.
    pub async fn save(&self, record: &BatchRecord) -> Result<(), StorageError> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO batches (
                batch_id, profile, status, total_count,
                continue_on_error, rate_limit, created_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.batch_id,
                record.profile,
                record.status.as_str(),
                record.total_count as i64,
                record.continue_on_error,
                record.rate_limit,
                record.created_at,
                record.finished_at,
            ],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => {
                StorageError::Duplicate(record.batch_id.clone())
            }
            _ => StorageError::Database(e),
        })?;

        for outcome in &record.outcomes {
            tx.execute(
                "INSERT INTO batch_outcomes (
                    batch_id, row_index, recipient, status, message_id, error
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.batch_id,
                    outcome.row_index as i64,
                    outcome.to,
                    outcome.status.as_str(),
                    outcome.message_id,
                    outcome.error,
                ],
            )?;
        }
        tx.commit()?;
        info!(batch_id = %record.batch_id, "batch record persisted");
        Ok(())
    }

    pub async fn load(&self, batch_id: &str) -> Result<Option<BatchRecord>, StorageError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT profile, status, total_count, continue_on_error,
                    rate_limit, created_at, finished_at
             FROM batches WHERE batch_id = ?1",
        )?;
        let mut rows = stmt.query([batch_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let status_text: String = row.get(1)?;
        let status = BatchStatus::parse(&status_text)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown status '{status_text}'")))?;
        let total_count: i64 = row.get(2)?;
        let mut record = BatchRecord {
            batch_id: batch_id.to_string(),
            profile: row.get(0)?,
            status,
            total_count: total_count as usize,
            continue_on_error: row.get(3)?,
            rate_limit: row.get(4)?,
            created_at: row.get(5)?,
            finished_at: row.get(6)?,
            outcomes: Vec::new(),
        };
        drop(rows);
        drop(stmt);

        let mut stmt = db.prepare(
            "SELECT row_index, recipient, status, message_id, error
             FROM batch_outcomes WHERE batch_id = ?1 ORDER BY row_index ASC",
        )?;
        let outcomes = stmt.query_map([batch_id], |row| {
            let row_index: i64 = row.get(0)?;
            let status_text: String = row.get(2)?;
            Ok((
                row_index,
                row.get::<_, Option<String>>(1)?,
                status_text,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        for outcome in outcomes {
            let (row_index, to, status_text, message_id, error) = outcome?;
            let status = match status_text.as_str() {
                "sent" => OutcomeStatus::Sent,
                "failed" => OutcomeStatus::Failed,
                other => {
                    return Err(StorageError::Corrupt(format!(
                        "unknown outcome status '{other}'"
                    )));
                }
            };
            record.outcomes.push(MessageOutcome {
                row_index: row_index as usize,
                to,
                status,
                message_id,
                error,
            });
        }
        Ok(Some(record))
    }
}

fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS batches (
            batch_id TEXT PRIMARY KEY,
            profile TEXT NOT NULL,
            status TEXT NOT NULL,
            total_count INTEGER NOT NULL,
            continue_on_error INTEGER NOT NULL,
            rate_limit INTEGER,
            created_at TEXT NOT NULL,
            finished_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS batch_outcomes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT NOT NULL,
            row_index INTEGER NOT NULL,
            recipient TEXT,
            status TEXT NOT NULL,
            message_id TEXT,
            error TEXT
        )",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(batch_id: &str) -> BatchRecord {
        BatchRecord {
            batch_id: batch_id.to_string(),
            created_at: "2026-08-30T10:00:00+00:00".to_string(),
            finished_at: Some("2026-08-30T10:00:05+00:00".to_string()),
            profile: "work".to_string(),
            total_count: 2,
            continue_on_error: true,
            rate_limit: Some(5),
            status: BatchStatus::PartiallyFailed,
            outcomes: vec![
                MessageOutcome {
                    row_index: 0,
                    to: Some("a@example.com".to_string()),
                    status: OutcomeStatus::Sent,
                    message_id: Some("m-1".to_string()),
                    error: None,
                },
                MessageOutcome {
                    row_index: 1,
                    to: Some("b@example.com".to_string()),
                    status: OutcomeStatus::Failed,
                    message_id: None,
                    error: Some("API error (500): boom".to_string()),
                },
            ],
        }
    }

    #[tokio::test]
    async fn save_then_load_roundtrips_the_record() {
        let store = BatchStore::open_in_memory().unwrap();
        let record = sample_record("b-1");
        store.save(&record).await.unwrap();
        let loaded = store.load("b-1").await.unwrap().expect("record present");
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn load_unknown_batch_returns_none() {
        let store = BatchStore::open_in_memory().unwrap();
        assert!(store.load("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_save_is_rejected() {
        let store = BatchStore::open_in_memory().unwrap();
        let record = sample_record("b-2");
        store.save(&record).await.unwrap();
        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(id) if id == "b-2"));
    }

    #[tokio::test]
    async fn outcomes_come_back_in_row_order() {
        let store = BatchStore::open_in_memory().unwrap();
        let mut record = sample_record("b-3");
        record.outcomes.reverse();
        store.save(&record).await.unwrap();
        let loaded = store.load("b-3").await.unwrap().unwrap();
        let indices: Vec<usize> = loaded.outcomes.iter().map(|o| o.row_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn distinct_batch_ids_do_not_interfere() {
        let store = BatchStore::open_in_memory().unwrap();
        store.save(&sample_record("b-4")).await.unwrap();
        store.save(&sample_record("b-5")).await.unwrap();
        assert!(store.load("b-4").await.unwrap().is_some());
        assert!(store.load("b-5").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("batches.db");
        let store = BatchStore::open(&path).unwrap();
        store.save(&sample_record("b-6")).await.unwrap();
        assert!(path.exists());
    }
}
