use std::time::Duration;

use thiserror::Error;
use zax_history::HistoryError;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid admin criteria: {0}")]
    AdminCriteria(String),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of an external lookup.  Never fatal: the caller logs it and
/// sends nothing.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("No result")]
    NoResult,

    #[error("Unexpected response: {0}")]
    Decode(String),
}
