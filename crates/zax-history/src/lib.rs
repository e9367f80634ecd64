//! # zax-history
//!
//! Append-only chat history for the zax bot.
//!
//! Every message, join/quit event and posted link is written as one
//! comma-delimited line to a log file and indexed twice in memory: once in a
//! global insertion-ordered sequence and once under the participant that
//! produced it.  On startup the log is replayed through the same insertion
//! path, so a restarted process holds exactly the state it had before.
//!
//! On top of the store sit two read-only components:
//! - [`presence`] answers "when was this participant last active, and doing
//!   what?"
//! - [`query`] implements `last` / `random` / `find` over either the global
//!   sequence or a single participant's sequence.

pub mod clock;
pub mod codec;
pub mod models;
pub mod presence;
pub mod query;
pub mod replay;
pub mod store;
pub mod writer;

mod error;

pub use clock::{Clock, SystemClock};
pub use error::{HistoryError, LineError, Result};
pub use models::*;
pub use presence::{seen, Seen, Sighting};
pub use query::{query, Hit, QueryError, QueryMode, RandomSource, RecordFamily, Scope};
pub use replay::{replay, ReplayStats};
pub use store::{History, HistoryStore, Journal};
pub use writer::LogWriter;
