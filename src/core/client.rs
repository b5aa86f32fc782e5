use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::core::error::ClientError;

const USER_AGENT: &str = concat!("mailgoat/", env!("CARGO_PKG_VERSION"));

/// Single-message send seam. The orchestrator only depends on this trait so
/// batch runs can be driven by a scripted mailer in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
        from_address: Option<&str>,
    ) -> Result<String, ClientError>;
}

/// A message as returned by the MailGoat read API. Field extraction is
/// lenient because deployed servers differ in which aliases they emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub to: Vec<String>,
    pub from_address: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub status: Option<String>,
}

impl Message {
    pub fn from_api(payload: &Value) -> Self {
        let to = match payload.get("to") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let str_field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| payload.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        };
        Self {
            id: str_field(&["id", "message_id"]).unwrap_or_default(),
            to,
            from_address: str_field(&["from", "from_address"]),
            subject: str_field(&["subject"]),
            body: str_field(&["body", "plain_body", "text_body"]),
            status: str_field(&["status"]),
        }
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
}

/// MailGoat HTTP API client.
pub struct MailClient {
    server: String,
    api_key: String,
    client: Client,
}

impl MailClient {
    pub fn new(server: &str, api_key: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: Client::new(),
        }
    }

    /// Submits one message and returns the API-assigned message id.
    /// Attachments switch the request to multipart; batch mode never
    /// passes any.
    pub async fn send(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
        from_address: Option<&str>,
        attachments: &[PathBuf],
    ) -> Result<String, ClientError> {
        let url = format!("{}/api/v1/messages/send", self.server);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);

        let response = if attachments.is_empty() {
            request
                .json(&SendRequest {
                    to,
                    subject,
                    body,
                    from: from_address,
                })
                .send()
                .await?
        } else {
            let mut form = reqwest::multipart::Form::new()
                .text("subject", subject.to_string())
                .text("body", body.to_string());
            for addr in to {
                form = form.text("to", addr.clone());
            }
            if let Some(from) = from_address {
                form = form.text("from", from.to_string());
            }
            for path in attachments {
                let bytes = tokio::fs::read(path).await.map_err(|e| ClientError::Api {
                    status: 0,
                    message: format!("failed to read attachment {}: {}", path.display(), e),
                })?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "attachment".to_string());
                form = form.part(
                    "attachments",
                    reqwest::multipart::Part::bytes(bytes).file_name(name),
                );
            }
            request.multipart(form).send().await?
        };

        let status = response.status().as_u16();
        let text = response.text().await?;
        let data = parse_api_payload(status, &text)?;
        extract_message_id(status, &data)
    }

    /// Fetches one message by id.
    pub async fn read(&self, message_id: &str) -> Result<Message, ClientError> {
        let url = format!("{}/api/v1/messages/{}", self.server, message_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let data = parse_api_payload(status, &text)?;
        Ok(Message::from_api(&data))
    }
}

#[async_trait]
impl Mailer for MailClient {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
        from_address: Option<&str>,
    ) -> Result<String, ClientError> {
        MailClient::send(self, to, subject, body, from_address, &[]).await
    }
}

/// Classifies a raw response. Non-2xx statuses become `Api` errors carrying
/// the server's `error`/`message` field when present; success bodies must
/// be JSON objects.
fn parse_api_payload(status: u16, text: &str) -> Result<Value, ClientError> {
    let data: Option<Value> = serde_json::from_str(text).ok();
    if status >= 400 {
        let message = data
            .as_ref()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .or_else(|| (!text.is_empty()).then(|| text.to_string()))
            .unwrap_or_else(|| "unknown API error".to_string());
        return Err(ClientError::Api { status, message });
    }
    match data {
        Some(value @ Value::Object(_)) => Ok(value),
        _ => Err(ClientError::Api {
            status,
            message: "invalid JSON response from API".to_string(),
        }),
    }
}

fn extract_message_id(status: u16, data: &Value) -> Result<String, ClientError> {
    data.get("message_id")
        .or_else(|| data.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ClientError::Api {
            status,
            message: "missing message_id in API response".to_string(),
        })
}
