use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised before any recipient row is attempted. The process
/// exits non-zero without touching the network or the batch store.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Bad or missing CLI combination (e.g. zero or several input sources).
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Malformed input source (e.g. CSV missing the `to` column).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Row-scoped rendering failure. Recorded as a failed outcome for that row
/// only; it never propagates past the orchestrator loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("missing value for placeholder {{{{{0}}}}}")]
    MissingPlaceholder(String),
    #[error("recipient row is missing '{0}'")]
    MissingField(&'static str),
}

/// Failures from the MailGoat HTTP API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connectivity or timeout while talking to the server.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-success response from the API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Batch store failures. Fatal for the current invocation: the batch may
/// have completed in memory but its record could not be persisted.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("batch store unavailable: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to access batch store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("batch {0} already exists")]
    Duplicate(String),
    #[error("corrupt batch record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),
    #[error(
        "no profile configured (pass --profile, set MAILGOAT_PROFILE, or run `mailgoat profile use <name>`)"
    )]
    NoneConfigured,
    #[error("profile config at {path} is not valid: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("failed to access profile config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
