//! In-memory history with global and per-participant indices.
//!
//! [`History`] is the pure index: three global insertion-ordered vectors and
//! a map from participant id to positions in those vectors.  It has a single
//! mutation path, [`History::insert`], shared by live recording and replay.
//!
//! [`HistoryStore`] wraps a `History` with a clock and a [`Journal`] (the
//! durable log in production) and exposes the `record_*` operations used by
//! the bot.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::{truncate_to_second, Clock, SystemClock};
use crate::error::{HistoryError, Result};
use crate::models::{Event, EventKind, LinkRecord, LogRecord, Message, Participant, RecordView};
use crate::replay::{replay, ReplayStats};
use crate::writer::LogWriter;

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Durable sink for new records.
pub trait Journal: Send {
    fn append(&mut self, record: &LogRecord) -> Result<()>;
}

impl Journal for LogWriter {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        LogWriter::append(self, record)
    }
}

/// In-memory journal, handy for tests and dry runs.
impl Journal for Vec<LogRecord> {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// History (index)
// ---------------------------------------------------------------------------

/// Dual-indexed record store.
///
/// Invariant: for each record family, the sum of all participants' position
/// lists equals the global vector, position for position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct History {
    messages: Vec<Message>,
    events: Vec<Event>,
    links: Vec<LinkRecord>,
    participants: HashMap<String, Participant>,
    next_seq: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one record into both indices.
    ///
    /// The participant is created on first sighting, then the record's
    /// position is added to it, then the record lands in the global vector.
    pub fn insert(&mut self, record: LogRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;

        match record {
            LogRecord::Message {
                timestamp,
                participant,
                channel,
                text,
            } => {
                let position = self.messages.len();
                self.participant_entry(&participant).messages.push(position);
                self.messages.push(Message {
                    text,
                    author: participant,
                    channel,
                    timestamp,
                    seq,
                });
            }
            LogRecord::Event {
                timestamp,
                participant,
                channel,
                kind,
                data,
            } => {
                let position = self.events.len();
                self.participant_entry(&participant).events.push(position);
                self.events.push(Event {
                    kind,
                    author: participant,
                    data,
                    channel,
                    timestamp,
                    seq,
                });
            }
            LogRecord::Link {
                timestamp,
                participant,
                url,
            } => {
                let position = self.links.len();
                self.participant_entry(&participant).links.push(position);
                self.links.push(LinkRecord {
                    url,
                    author: participant,
                    timestamp,
                    seq,
                });
            }
        }
    }

    fn participant_entry(&mut self, id: &str) -> &mut Participant {
        if !self.participants.contains_key(id) {
            debug!(participant = %id, "new participant");
        }
        self.participants.entry(id.to_string()).or_default()
    }

    // -- Participants --

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = &str> {
        self.participants.keys().map(String::as_str)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    // -- Global views --

    pub fn messages(&self) -> RecordView<'_, Message> {
        RecordView::Global(&self.messages)
    }

    pub fn events(&self) -> RecordView<'_, Event> {
        RecordView::Global(&self.events)
    }

    pub fn links(&self) -> RecordView<'_, LinkRecord> {
        RecordView::Global(&self.links)
    }

    // -- Participant views (None = no such participant) --

    pub fn participant_messages(&self, id: &str) -> Option<RecordView<'_, Message>> {
        self.participants.get(id).map(|p| RecordView::Indexed {
            records: &self.messages,
            positions: &p.messages,
        })
    }

    pub fn participant_events(&self, id: &str) -> Option<RecordView<'_, Event>> {
        self.participants.get(id).map(|p| RecordView::Indexed {
            records: &self.events,
            positions: &p.events,
        })
    }

    pub fn participant_links(&self, id: &str) -> Option<RecordView<'_, LinkRecord>> {
        self.participants.get(id).map(|p| RecordView::Indexed {
            records: &self.links,
            positions: &p.links,
        })
    }
}

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// The single-writer aggregate owned by the event loop.
pub struct HistoryStore {
    history: History,
    journal: Box<dyn Journal>,
    clock: Box<dyn Clock>,
}

impl HistoryStore {
    /// Assemble a store from already-built parts.
    pub fn new(history: History, journal: Box<dyn Journal>, clock: Box<dyn Clock>) -> Self {
        Self {
            history,
            journal,
            clock,
        }
    }

    /// Replay the log at `path` (if it exists) and open it for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, ReplayStats)> {
        Self::open_with_clock(path, Box::new(SystemClock))
    }

    pub fn open_with_clock(
        path: impl AsRef<Path>,
        clock: Box<dyn Clock>,
    ) -> Result<(Self, ReplayStats)> {
        let path = path.as_ref();

        let (history, stats) = match File::open(path) {
            Ok(file) => replay(BufReader::new(file))?,
            Err(e) if e.kind() == ErrorKind::NotFound => (History::new(), ReplayStats::default()),
            Err(source) => {
                return Err(HistoryError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let writer = LogWriter::open(path)?;
        Ok((Self::new(history, Box::new(writer), clock), stats))
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn record_message(&mut self, author: &str, channel: &str, text: &str) -> Result<()> {
        let record = LogRecord::Message {
            timestamp: self.stamp(),
            participant: author.to_string(),
            channel: channel.to_string(),
            text: text.to_string(),
        };
        self.record(record)
    }

    pub fn record_event(
        &mut self,
        author: &str,
        kind: EventKind,
        data: &str,
        channel: &str,
    ) -> Result<()> {
        let record = LogRecord::Event {
            timestamp: self.stamp(),
            participant: author.to_string(),
            channel: channel.to_string(),
            kind,
            data: data.to_string(),
        };
        self.record(record)
    }

    pub fn record_link(&mut self, author: &str, url: &str) -> Result<()> {
        let record = LogRecord::Link {
            timestamp: self.stamp(),
            participant: author.to_string(),
            url: url.to_string(),
        };
        self.record(record)
    }

    /// Index first, then persist.  A failed append leaves the index at most
    /// one record ahead of the log.
    fn record(&mut self, record: LogRecord) -> Result<()> {
        self.history.insert(record.clone());
        self.journal.append(&record)
    }

    fn stamp(&self) -> DateTime<Utc> {
        truncate_to_second(self.clock.now())
    }
}
