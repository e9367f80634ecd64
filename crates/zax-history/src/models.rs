//! Record types held by the history store.
//!
//! Records are immutable once appended.  Each one carries a store-wide
//! sequence number (`seq`) assigned at insertion; it is not persisted, but
//! replay re-derives the same numbers because it inserts in log order.

use std::fmt;

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A line of chat text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub author: String,
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// What kind of presence change an [`Event`] describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Join,
    Quit,
    /// Any tag this version does not interpret.  Kept verbatim so that the
    /// log round-trips.
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Join => "join",
            EventKind::Quit => "quit",
            EventKind::Other(tag) => tag,
        }
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "join" => EventKind::Join,
            "quit" => EventKind::Quit,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A presence change (join, quit, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub author: String,
    /// Free-form payload, e.g. the quit reason.  May be empty.
    pub data: String,
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// A URL seen in a participant's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub url: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Per-identity index into the global sequences.
///
/// Each vector holds positions into the matching global vector, in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participant {
    pub(crate) messages: Vec<usize>,
    pub(crate) events: Vec<usize>,
    pub(crate) links: Vec<usize>,
}

impl Participant {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// One line of the durable log, before it is given a sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Event {
        timestamp: DateTime<Utc>,
        participant: String,
        channel: String,
        kind: EventKind,
        data: String,
    },
    Message {
        timestamp: DateTime<Utc>,
        participant: String,
        channel: String,
        text: String,
    },
    Link {
        timestamp: DateTime<Utc>,
        participant: String,
        url: String,
    },
}

impl LogRecord {
    /// The leading tag written for this record kind.
    pub fn tag(&self) -> &'static str {
        match self {
            LogRecord::Event { .. } => "event",
            LogRecord::Message { .. } => "msg",
            LogRecord::Link { .. } => "url",
        }
    }

    pub fn participant(&self) -> &str {
        match self {
            LogRecord::Event { participant, .. }
            | LogRecord::Message { participant, .. }
            | LogRecord::Link { participant, .. } => participant,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LogRecord::Event { timestamp, .. }
            | LogRecord::Message { timestamp, .. }
            | LogRecord::Link { timestamp, .. } => *timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Read-only views
// ---------------------------------------------------------------------------

/// An ordered, read-only view over one record family.
///
/// Either the whole global sequence or a participant's positions into it.
pub enum RecordView<'a, T> {
    Global(&'a [T]),
    Indexed {
        records: &'a [T],
        positions: &'a [usize],
    },
}

impl<T> Clone for RecordView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RecordView<'_, T> {}

impl<'a, T> RecordView<'a, T> {
    pub fn len(&self) -> usize {
        match self {
            RecordView::Global(records) => records.len(),
            RecordView::Indexed { positions, .. } => positions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`-th record of the view, in insertion order.
    pub fn get(&self, i: usize) -> Option<&'a T> {
        match *self {
            RecordView::Global(records) => records.get(i),
            RecordView::Indexed { records, positions } => {
                positions.get(i).and_then(|&p| records.get(p))
            }
        }
    }

    /// The most recently appended record, if any.
    pub fn last(&self) -> Option<&'a T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn iter(self) -> impl DoubleEndedIterator<Item = &'a T> + 'a
    where
        T: 'a,
    {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}
