//! Cold-start recovery: rebuild a [`History`] from the durable log.
//!
//! Lines are decoded in order and fed through [`History::insert`], the same
//! path live records take.  A malformed line is logged and skipped; only a
//! failing reader aborts replay.

use std::io::BufRead;
use std::time::Instant;

use tracing::{info, warn};

use crate::codec::decode_line;
use crate::error::{LineError, Result};
use crate::models::LogRecord;
use crate::store::History;

/// Counters collected while replaying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    pub messages: usize,
    pub links: usize,
    /// Malformed lines that produced no record.
    pub skipped: usize,
}

impl ReplayStats {
    pub fn records(&self) -> usize {
        self.events + self.messages + self.links
    }
}

/// Rebuild the in-memory history from `source`.
pub fn replay<R: BufRead>(mut source: R) -> Result<(History, ReplayStats)> {
    let started = Instant::now();
    let mut history = History::new();
    let mut stats = ReplayStats::default();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        if source.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = String::from_utf8_lossy(&buf);
        match decode_line(&line) {
            Ok(record) => {
                match &record {
                    LogRecord::Event { .. } => stats.events += 1,
                    LogRecord::Message { .. } => stats.messages += 1,
                    LogRecord::Link { .. } => stats.links += 1,
                }
                history.insert(record);
            }
            // Blank lines are not worth a warning.
            Err(LineError::Empty) => {}
            Err(e) => {
                stats.skipped += 1;
                warn!(line = line_no, error = %e, "skipping malformed history line");
            }
        }
    }

    info!(
        events = stats.events,
        messages = stats.messages,
        links = stats.links,
        skipped = stats.skipped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "history replayed"
    );

    Ok((history, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_bad_lines_are_skipped_not_fatal() {
        let log = "msg,1,alice,#chat,hi\n\
                   garbage\n\
                   msg,notatime,alice,#chat,lost\n\
                   \n\
                   url,2,alice,http://example.com\n\
                   event,3,alice,#chat,quit,bye\n";
        let (history, stats) = replay(Cursor::new(log)).unwrap();

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.records(), 3);
        assert_eq!(history.messages().len(), 1);
        assert_eq!(history.links().len(), 1);
        assert_eq!(history.events().len(), 1);
    }

    #[test]
    fn test_missing_trailing_newline_still_counts() {
        let (history, _) = replay(Cursor::new("url,2,bob,http://x")).unwrap();
        assert_eq!(history.links().len(), 1);
    }

    #[test]
    fn test_invalid_utf8_does_not_abort() {
        let mut log = b"msg,1,alice,#chat,caf\xe9\n".to_vec();
        log.extend_from_slice(b"msg,2,alice,#chat,ok\n");
        let (history, stats) = replay(Cursor::new(log)).unwrap();
        assert_eq!(stats.messages, 2);
        assert_eq!(history.messages().last().unwrap().text, "ok");
    }

    #[test]
    fn test_replay_is_deterministic() {
        let log = "msg,1,a,#c,x\nevent,2,b,#c,join,\nurl,3,a,http://y\n";
        let (first, _) = replay(Cursor::new(log)).unwrap();
        let (second, _) = replay(Cursor::new(log)).unwrap();
        assert_eq!(first, second);
    }
}
