use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the history layer.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The log file could not be opened for reading or appending.
    #[error("Cannot open history log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O error while appending or reading the log.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single log line could not be turned into a record.
///
/// Replay skips such lines and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("empty line")]
    Empty,

    #[error("unknown record tag '{0}'")]
    UnknownTag(String),

    #[error("'{tag}' record needs {expected} fields, found {found}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    #[error("missing participant id")]
    MissingParticipant,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HistoryError>;
