//! "Seen": when was a participant last active, and doing what.
//!
//! The latest activity is chosen from the participant's last event and last
//! message.  A side that has never been populated never wins, whatever its
//! default timestamp would compare as; only when both exist are they
//! compared, on `(timestamp, seq)`.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Event, EventKind, Message};
use crate::store::History;

/// Outcome of a presence lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    /// No participant with that id has ever been recorded.
    NotFound,
    Found(Sighting),
}

impl Seen {
    pub fn is_found(&self) -> bool {
        matches!(self, Seen::Found(_))
    }
}

/// What the participant was doing when last seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    Joining,
    Quitting,
    Writing(String),
    /// An event this version has no wording for, or link-only activity.
    Unspecified,
}

impl Activity {
    fn from_event(event: &Event) -> Self {
        match event.kind {
            EventKind::Join => Activity::Joining,
            EventKind::Quit => Activity::Quitting,
            EventKind::Other(_) => Activity::Unspecified,
        }
    }

    /// The action clause, if this activity has one.
    pub fn describe(&self) -> Option<String> {
        match self {
            Activity::Joining => Some("joining".to_string()),
            Activity::Quitting => Some("quitting".to_string()),
            Activity::Writing(text) => Some(format!("writing: \"{text}\"")),
            Activity::Unspecified => None,
        }
    }
}

/// A resolved presence answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub participant: String,
    pub activity: Activity,
    pub at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl Sighting {
    /// e.g. `2 day(s), 3 hour(s)`
    pub fn elapsed_phrase(&self) -> String {
        format_elapsed(self.elapsed)
    }

    /// e.g. `alice was last seen 5 minute(s) ago writing: "hi".`
    pub fn phrase(&self) -> String {
        match self.activity.describe() {
            Some(action) => format!(
                "{} was last seen {} ago {}.",
                self.participant,
                self.elapsed_phrase(),
                action
            ),
            None => format!(
                "{} was last seen {} ago.",
                self.participant,
                self.elapsed_phrase()
            ),
        }
    }
}

/// The three shapes the "latest of event / message" decision can take.
#[derive(Debug, Clone, Copy)]
enum Latest<'a> {
    EventOnly(&'a Event),
    MessageOnly(&'a Message),
    CompareBoth(&'a Event, &'a Message),
}

impl<'a> Latest<'a> {
    fn from_parts(event: Option<&'a Event>, message: Option<&'a Message>) -> Option<Self> {
        match (event, message) {
            (Some(e), None) => Some(Latest::EventOnly(e)),
            (None, Some(m)) => Some(Latest::MessageOnly(m)),
            (Some(e), Some(m)) => Some(Latest::CompareBoth(e, m)),
            (None, None) => None,
        }
    }

    fn resolve(self) -> (Activity, DateTime<Utc>) {
        let from_event = |e: &Event| (Activity::from_event(e), e.timestamp);
        let from_message = |m: &Message| (Activity::Writing(m.text.clone()), m.timestamp);

        match self {
            Latest::EventOnly(e) => from_event(e),
            Latest::MessageOnly(m) => from_message(m),
            Latest::CompareBoth(e, m) => {
                if (e.timestamp, e.seq) > (m.timestamp, m.seq) {
                    from_event(e)
                } else {
                    from_message(m)
                }
            }
        }
    }
}

/// Resolve the presence of `id` as of `now`.
pub fn seen(history: &History, id: &str, now: DateTime<Utc>) -> Seen {
    let (Some(events), Some(messages)) = (
        history.participant_events(id),
        history.participant_messages(id),
    ) else {
        return Seen::NotFound;
    };

    let resolved = match Latest::from_parts(events.last(), messages.last()) {
        Some(latest) => latest.resolve(),
        // Only links on record: report when, not what.
        None => match history.participant_links(id).and_then(|l| l.last()) {
            Some(link) => (Activity::Unspecified, link.timestamp),
            None => return Seen::NotFound,
        },
    };

    let (activity, at) = resolved;
    Seen::Found(Sighting {
        participant: id.to_string(),
        activity,
        at,
        elapsed: now - at,
    })
}

/// Render an elapsed duration, largest unit first.
///
/// Under an hour: minutes and seconds.  From one hour on: days and hours
/// only, the sub-hour remainder is dropped.  Negative durations (clock
/// skew) count as zero.
///
/// The cut is at one hour, not one day: 90 minutes renders `1 hour(s)`,
/// where the older bot said `1 hour(s), 30 minute(s)` until a day passed.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);

    let units: [(i64, &str); 2] = if secs >= 3600 {
        let hours = secs / 3600;
        [(hours / 24, "day"), (hours % 24, "hour")]
    } else {
        [(secs / 60, "minute"), (secs % 60, "second")]
    };

    let parts: Vec<String> = units
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n} {unit}(s)"))
        .collect();

    if parts.is_empty() {
        "0 second(s)".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogRecord;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn msg(who: &str, ts: i64, text: &str) -> LogRecord {
        LogRecord::Message {
            timestamp: at(ts),
            participant: who.into(),
            channel: "#chat".into(),
            text: text.into(),
        }
    }

    fn event(who: &str, ts: i64, kind: EventKind) -> LogRecord {
        LogRecord::Event {
            timestamp: at(ts),
            participant: who.into(),
            channel: "#chat".into(),
            kind,
            data: String::new(),
        }
    }

    fn sighting(seen: Seen) -> Sighting {
        match seen {
            Seen::Found(s) => s,
            Seen::NotFound => panic!("expected a sighting"),
        }
    }

    #[test]
    fn test_unknown_participant_is_not_found() {
        assert_eq!(seen(&History::new(), "carol", at(0)), Seen::NotFound);
    }

    #[test]
    fn test_event_only_participant_uses_the_event() {
        let mut history = History::new();
        history.insert(event("dave", 100, EventKind::Join));

        let s = sighting(seen(&history, "dave", at(100 + 3700)));
        assert_eq!(s.activity, Activity::Joining);
        assert_eq!(s.at, at(100));
        assert!(s.phrase().contains("1 hour(s)"));
        assert!(!s.phrase().contains("minute"));
        assert_eq!(s.phrase(), "dave was last seen 1 hour(s) ago joining.");
    }

    #[test]
    fn test_later_message_beats_earlier_event() {
        let mut history = History::new();
        history.insert(event("erin", 10, EventKind::Join));
        history.insert(msg("erin", 20, "hi"));

        let s = sighting(seen(&history, "erin", at(25)));
        assert_eq!(s.activity, Activity::Writing("hi".into()));
        assert_eq!(s.phrase(), "erin was last seen 5 second(s) ago writing: \"hi\".");
    }

    #[test]
    fn test_later_event_beats_earlier_message() {
        let mut history = History::new();
        history.insert(msg("erin", 10, "bye all"));
        history.insert(event("erin", 11, EventKind::Quit));

        let s = sighting(seen(&history, "erin", at(11)));
        assert_eq!(s.activity, Activity::Quitting);
    }

    #[test]
    fn test_timestamp_ties_go_to_the_later_insert() {
        let mut history = History::new();
        history.insert(msg("finn", 10, "brb"));
        history.insert(event("finn", 10, EventKind::Quit));
        assert_eq!(
            sighting(seen(&history, "finn", at(10))).activity,
            Activity::Quitting
        );

        let mut history = History::new();
        history.insert(event("finn", 10, EventKind::Join));
        history.insert(msg("finn", 10, "hello"));
        assert_eq!(
            sighting(seen(&history, "finn", at(10))).activity,
            Activity::Writing("hello".into())
        );
    }

    #[test]
    fn test_unknown_event_kind_has_no_action_clause() {
        let mut history = History::new();
        history.insert(event("gus", 0, EventKind::Other("nick".into())));
        let s = sighting(seen(&history, "gus", at(90)));
        assert_eq!(s.phrase(), "gus was last seen 1 minute(s), 30 second(s) ago.");
    }

    #[test]
    fn test_link_only_participant_is_found() {
        let mut history = History::new();
        history.insert(LogRecord::Link {
            timestamp: at(0),
            participant: "hal".into(),
            url: "http://x".into(),
        });
        assert!(seen(&history, "hal", at(1)).is_found());
    }

    #[test]
    fn test_elapsed_formatting() {
        let f = |s: i64| format_elapsed(Duration::seconds(s));
        assert_eq!(f(0), "0 second(s)");
        assert_eq!(f(-5), "0 second(s)");
        assert_eq!(f(45), "45 second(s)");
        assert_eq!(f(60), "1 minute(s)");
        assert_eq!(f(3599), "59 minute(s), 59 second(s)");
        assert_eq!(f(3600), "1 hour(s)");
        assert_eq!(f(3700), "1 hour(s)");
        assert_eq!(f(5400), "1 hour(s)");
        assert_eq!(f(86_400), "1 day(s)");
        assert_eq!(f(2 * 86_400 + 3 * 3600 + 1234), "2 day(s), 3 hour(s)");
    }
}
