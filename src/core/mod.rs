pub mod batch;
pub mod client;
pub mod error;
pub mod profiles;
pub mod rate;
pub mod recipients;
pub mod store;
pub mod template;
pub mod terminal;

use std::path::PathBuf;

/// Root data directory holding `profiles.json` and `batches.db`.
/// `MAILGOAT_DATA_DIR` overrides the default `~/.mailgoat`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MAILGOAT_DATA_DIR")
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".mailgoat"))
        .unwrap_or_else(|| PathBuf::from(".mailgoat"))
}
