//! `last` / `random` / `find` over messages or links, globally or for one
//! participant.
//!
//! Every "nothing to return" case (unknown participant, empty scope, no
//! match) is `None`.  An unknown participant never falls back to the global
//! scope.

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use thiserror::Error;

use crate::models::{LinkRecord, Message, RecordView};
use crate::store::History;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Which record family a query searches.  Events are not queryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFamily {
    Messages,
    Links,
}

/// The subset of a family a query runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Global,
    Participant(&'a str),
}

#[derive(Debug, Clone)]
pub enum QueryMode {
    /// The most recently appended record.
    Last,
    /// A uniformly chosen record, re-drawn on every call.
    Random,
    /// The last record whose text (or URL) contains a match.
    Find(Regex),
}

impl QueryMode {
    pub fn find(pattern: &str) -> Result<Self, QueryError> {
        Ok(QueryMode::Find(Regex::new(pattern)?))
    }
}

/// Source of uniform indices for [`QueryMode::Random`].
pub trait RandomSource {
    /// An index in `0..len`.  Only called with `len > 0`.
    fn pick(&mut self, len: usize) -> usize;
}

impl<R: rand::RngCore> RandomSource for R {
    fn pick(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }
}

/// A query result, borrowed from the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit<'a> {
    Message(&'a Message),
    Link(&'a LinkRecord),
}

impl Hit<'_> {
    pub fn author(&self) -> &str {
        match self {
            Hit::Message(m) => &m.author,
            Hit::Link(l) => &l.author,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Hit::Message(m) => m.timestamp,
            Hit::Link(l) => l.timestamp,
        }
    }

    /// The searchable text: message body or URL.
    pub fn text(&self) -> &str {
        match self {
            Hit::Message(m) => &m.text,
            Hit::Link(l) => &l.url,
        }
    }
}

/// Run one query against `history`.
pub fn query<'h>(
    history: &'h History,
    family: RecordFamily,
    scope: Scope<'_>,
    mode: &QueryMode,
    rng: &mut dyn RandomSource,
) -> Option<Hit<'h>> {
    match family {
        RecordFamily::Messages => {
            let view = match scope {
                Scope::Global => history.messages(),
                Scope::Participant(id) => history.participant_messages(id)?,
            };
            select(view, mode, rng, message_text).map(Hit::Message)
        }
        RecordFamily::Links => {
            let view = match scope {
                Scope::Global => history.links(),
                Scope::Participant(id) => history.participant_links(id)?,
            };
            select(view, mode, rng, link_url).map(Hit::Link)
        }
    }
}

fn message_text(message: &Message) -> &str {
    &message.text
}

fn link_url(link: &LinkRecord) -> &str {
    &link.url
}

fn select<'h, T>(
    view: RecordView<'h, T>,
    mode: &QueryMode,
    rng: &mut dyn RandomSource,
    text: fn(&T) -> &str,
) -> Option<&'h T> {
    if view.is_empty() {
        return None;
    }
    match mode {
        QueryMode::Last => view.last(),
        QueryMode::Random => view.get(rng.pick(view.len())),
        // Scanning backwards yields the same record as "last match in
        // insertion order".
        QueryMode::Find(re) => view.iter().rev().find(|r| re.is_match(text(r))),
    }
}
