//! Durable, append-only log writer.
//!
//! The [`LogWriter`] exclusively owns the append handle of the history log.
//! Every append is written and synced before it returns, so a record
//! acknowledged to the store survives a crash.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec;
use crate::error::{HistoryError, Result};
use crate::models::LogRecord;

/// Exclusive writer for the history log file.
#[derive(Debug)]
pub struct LogWriter {
    file: File,
    path: PathBuf,
}

impl LogWriter {
    /// Open (or create) the log at `path` in append mode.
    ///
    /// Failure here is fatal for the caller: without the append handle no
    /// record can be made durable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| HistoryError::Open {
                path: path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| HistoryError::Open {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), "history log opened for append");
        Ok(Self { file, path })
    }

    /// Serialize `record` as one line, append it and sync it to disk.
    pub fn append(&mut self, record: &LogRecord) -> Result<()> {
        let mut line = codec::encode_line(record);
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        debug!(tag = record.tag(), participant = record.participant(), "record appended");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
