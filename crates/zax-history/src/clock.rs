//! Wall-clock source used to stamp new records.

use chrono::{DateTime, Utc};

/// Source of "now" for the history store.
///
/// The log persists whole seconds, so implementations are expected to be
/// truncated by the caller; see [`truncate_to_second`].
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Drop sub-second precision so an in-memory timestamp equals the one read
/// back from the log.
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_closures_are_clocks() {
        let fixed = Utc.timestamp_opt(1_000, 0).unwrap();
        let clock = move || fixed;
        assert_eq!(clock.now(), fixed);
    }

    #[test]
    fn test_truncation_drops_nanos() {
        let ts = Utc.timestamp_opt(42, 999_000_000).unwrap();
        assert_eq!(truncate_to_second(ts).timestamp_subsec_nanos(), 0);
        assert_eq!(truncate_to_second(ts).timestamp(), 42);
    }
}
