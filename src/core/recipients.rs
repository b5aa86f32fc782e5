use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::core::error::SetupError;

/// One recipient as read from the input source. `fields` keeps the extra
/// columns in input order for placeholder lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientRow {
    pub to: Vec<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub from: Option<String>,
    pub fields: Vec<(String, String)>,
}

impl RecipientRow {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A row as yielded by the reader. Per-row parse problems are carried as
/// errors so the orchestrator can apply the continue-on-error policy to
/// them exactly like render failures.
pub type RowEntry = Result<RecipientRow, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSource {
    Csv(PathBuf),
    Json(PathBuf),
    Stdin,
}

impl RecipientSource {
    /// Exactly one of csv/json/stdin must be given; anything else is a
    /// configuration error raised before any I/O.
    pub fn select(
        csv: Option<PathBuf>,
        json: Option<PathBuf>,
        stdin: bool,
    ) -> Result<Self, SetupError> {
        let mut sources = Vec::new();
        if let Some(path) = csv {
            sources.push(RecipientSource::Csv(path));
        }
        if let Some(path) = json {
            sources.push(RecipientSource::Json(path));
        }
        if stdin {
            sources.push(RecipientSource::Stdin);
        }
        match sources.len() {
            1 => Ok(sources.remove(0)),
            _ => Err(SetupError::Configuration(
                "exactly one input source must be provided (--csv, --json, or --stdin)"
                    .to_string(),
            )),
        }
    }
}

/// Reads the chosen source into ordered row entries. `has_template` relaxes
/// the CSV subject/body column requirement since those fields will come from
/// the template instead.
pub fn read_recipients(
    source: &RecipientSource,
    has_template: bool,
) -> Result<Vec<RowEntry>, SetupError> {
    match source {
        RecipientSource::Csv(path) => read_csv(path, has_template),
        RecipientSource::Json(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                SetupError::Validation(format!("failed to read {}: {}", path.display(), e))
            })?;
            parse_json_rows(&text)
        }
        RecipientSource::Stdin => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| SetupError::Validation(format!("failed to read stdin: {}", e)))?;
            parse_json_rows(&text)
        }
    }
}

fn read_csv(path: &Path, has_template: bool) -> Result<Vec<RowEntry>, SetupError> {
    let mut reader = csv::ReaderBuilder::new().from_path(path).map_err(|e| {
        SetupError::Validation(format!("failed to read {}: {}", path.display(), e))
    })?;
    let headers = reader
        .headers()
        .map_err(|e| SetupError::Validation(format!("invalid CSV header: {}", e)))?
        .clone();

    // Header-level requirements fail before any row is parsed.
    let require = |name: &str| -> Result<(), SetupError> {
        if headers.iter().any(|h| h == name) {
            Ok(())
        } else {
            Err(SetupError::Validation(format!(
                "CSV input is missing the required '{}' column",
                name
            )))
        }
    };
    require("to")?;
    if !has_template {
        require("subject")?;
        require("body")?;
    }

    let mut entries = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => entries.push(parse_csv_row(&headers, &record)),
            Err(e) => entries.push(Err(format!("malformed CSV row: {}", e))),
        }
    }
    Ok(entries)
}

fn parse_csv_row(headers: &csv::StringRecord, record: &csv::StringRecord) -> RowEntry {
    let mut row = RecipientRow::default();
    for (header, value) in headers.iter().zip(record.iter()) {
        match header {
            "to" => {
                if !value.is_empty() {
                    row.to.push(value.to_string());
                }
            }
            "subject" => row.subject = Some(value.to_string()),
            "body" => row.body = Some(value.to_string()),
            "from" | "from_address" => {
                if !value.is_empty() {
                    row.from = Some(value.to_string());
                }
            }
            _ => row.fields.push((header.to_string(), value.to_string())),
        }
    }
    if row.to.is_empty() {
        return Err("recipient row is missing 'to'".to_string());
    }
    Ok(row)
}

/// Shared by `--json` and `--stdin`: both carry a JSON array of recipient
/// objects with identical row semantics.
pub fn parse_json_rows(text: &str) -> Result<Vec<RowEntry>, SetupError> {
    let payload: Value = serde_json::from_str(text)
        .map_err(|e| SetupError::Validation(format!("invalid JSON input: {}", e)))?;
    let Value::Array(items) = payload else {
        return Err(SetupError::Validation(
            "JSON input must be an array of recipient objects".to_string(),
        ));
    };
    Ok(items.into_iter().map(parse_json_row).collect())
}

fn parse_json_row(item: Value) -> RowEntry {
    let Value::Object(map) = item else {
        return Err("each JSON array item must be an object".to_string());
    };
    let mut row = RecipientRow::default();
    for (key, value) in map {
        match key.as_str() {
            "to" => match value {
                Value::String(s) => row.to.push(s),
                Value::Array(items) => {
                    for entry in items {
                        match entry {
                            Value::String(s) => row.to.push(s),
                            _ => {
                                return Err(
                                    "'to' must be a string or an array of strings".to_string()
                                );
                            }
                        }
                    }
                }
                Value::Null => {}
                _ => return Err("'to' must be a string or an array of strings".to_string()),
            },
            "subject" => row.subject = non_null_string(value),
            "body" => row.body = non_null_string(value),
            "from" | "from_address" => row.from = non_null_string(value),
            _ => {
                if !value.is_null() {
                    row.fields.push((key, scalar_to_string(&value)));
                }
            }
        }
    }
    if row.to.is_empty() {
        return Err("recipient row is missing 'to'".to_string());
    }
    Ok(row)
}

/// Numbers and booleans render as their plain string representation;
/// nested structures keep their JSON form.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_null_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(scalar_to_string(&other)),
    }
}
