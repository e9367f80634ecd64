//! The event handler.
//!
//! [`Bot`] owns the [`HistoryStore`] and is driven by one event at a time
//! from the main loop, so history mutation and history queries are never
//! concurrent.  A chat line is answered first and recorded second: a query
//! never sees the line that asked it.

use std::fmt::Display;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};
use zax_history::{
    query, seen, EventKind, Hit, HistoryStore, QueryMode, RecordFamily, Scope, Seen,
};

use crate::admin::AdminRule;
use crate::commands::{self, Command, HistoryRequest};
use crate::config::BotConfig;
use crate::error::BotError;
use crate::events::{ChatEvent, Outbound};
use crate::lookup::{bounded, extract_urls, LookupProvider, Lookups};

pub const QUIT_MESSAGES: &[&str] = &[
    "Uh, never mind.",
    "This system is too advanced for you.",
    "That was an illogical decision.",
    "Weeeeeeeeeeeeeeeeeeeeee[bzzt]",
    "Didn't we have some fun, though?",
    "Your entire life has been a mathematical error.",
];

pub const UNKNOWN_USER: &[&str] = &[
    "Who?",
    "Never heard of that human.",
    "Negative, no record found",
    "Did you spell that correctly?",
    "Are you sober?",
];

pub const INSULTS: &[&str] = &[
    "What do you think you are doing?",
    "You're not a good person. You know that, right?",
    "Typical human.",
    "You don't even care. Do you?",
    "I guess we both know that isn't going to happen.",
    "All right, keep doing whatever it is you think you're doing.",
    "Are you sober?",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of running one command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Reply(String),
    /// The command was well formed but matched nothing.
    NotFound(&'static str),
    Disconnect(String),
    Nothing,
}

pub struct Bot {
    store: HistoryStore,
    config: BotConfig,
    admin: Option<AdminRule>,
    lookups: Lookups,
    rng: StdRng,
    last_url: Option<String>,
}

impl Bot {
    pub fn new(store: HistoryStore, config: BotConfig, lookups: Lookups, rng: StdRng) -> Self {
        let admin = if config.admin.is_empty() {
            None
        } else {
            match AdminRule::parse(&config.admin) {
                Ok(rule) => {
                    info!(field = ?rule.field(), "Admin rule loaded");
                    Some(rule)
                }
                Err(e) => {
                    warn!("{}, admin commands disabled", e);
                    None
                }
            }
        };

        Self {
            store,
            config,
            admin,
            lookups,
            rng,
            last_url: None,
        }
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Handle one inbound event.  Only a failed history append is an error.
    pub async fn handle(&mut self, event: ChatEvent) -> Result<Vec<Outbound>, BotError> {
        match event {
            ChatEvent::Connected => {
                info!(channels = self.config.channels.len(), "Registered, joining channels");
                Ok(self
                    .config
                    .channels
                    .iter()
                    .map(|c| Outbound::Join {
                        channel: c.chan.clone(),
                        password: c.password.clone(),
                    })
                    .collect())
            }
            ChatEvent::Joined { nick, channel } => {
                debug!(participant = %nick, channel = %channel, "Join");
                self.store.record_event(&nick, EventKind::Join, "", &channel)?;
                Ok(Vec::new())
            }
            ChatEvent::Quit { nick, reason } => {
                debug!(participant = %nick, reason = %reason, "Quit");
                self.store.record_event(&nick, EventKind::Quit, &reason, "")?;
                Ok(Vec::new())
            }
            ChatEvent::Text {
                sender,
                host,
                target,
                body,
            } => self.handle_text(&sender, &host, &target, &body).await,
        }
    }

    async fn handle_text(
        &mut self,
        sender: &str,
        host: &str,
        target: &str,
        body: &str,
    ) -> Result<Vec<Outbound>, BotError> {
        let reply_to = if is_channel(target) { target } else { sender };

        let outcome = match commands::parse(body) {
            Some(command) => self.run(command, sender, host).await,
            None => Outcome::Nothing,
        };

        self.store.record_message(sender, target, body)?;

        let mut out = Vec::new();
        match outcome {
            Outcome::Reply(text) => out.push(Outbound::send(reply_to, text)),
            Outcome::Disconnect(reason) => {
                out.push(Outbound::Disconnect { reason });
                return Ok(out);
            }
            Outcome::NotFound(what) => {
                debug!(sender = %sender, "No {} found", what);
                self.report(target, sender, body, &mut out);
            }
            Outcome::Nothing => self.report(target, sender, body, &mut out),
        }

        if self.config.is_ignored(sender) {
            return Ok(out);
        }

        for url in extract_urls(body) {
            self.store.record_link(sender, url)?;
            if self.last_url.as_deref() == Some(url) {
                debug!(url = %url, "Repeated URL, not previewing");
                continue;
            }
            self.last_url = Some(url.to_string());
            if let Some(line) = self.preview(url).await {
                out.push(Outbound::send(reply_to, line));
            }
        }

        Ok(out)
    }

    fn report(&self, target: &str, sender: &str, body: &str, out: &mut Vec<Outbound>) {
        if !self.config.report_chan.is_empty() {
            out.push(Outbound::send(
                self.config.report_chan.as_str(),
                format!("[{target}] {sender}: {body}"),
            ));
        }
    }

    async fn preview(&self, url: &str) -> Option<String> {
        let provider = self.lookups.link_preview.as_deref()?;
        match bounded(provider, url, self.lookups.timeout).await {
            Ok(line) => Some(line),
            Err(e) => {
                warn!(provider = provider.name(), url = %url, "Lookup failed: {}", e);
                None
            }
        }
    }

    async fn run(&mut self, command: Command, sender: &str, host: &str) -> Outcome {
        if command.requires_admin() && !self.is_admin(sender, host) {
            debug!(sender = %sender, host = %host, "Admin command refused");
            return Outcome::Nothing;
        }

        match command {
            Command::Help(topic) => match commands::help(topic.as_deref()) {
                Some(text) => Outcome::Reply(text.to_string()),
                None => Outcome::Nothing,
            },
            Command::Seen(nick) => self.seen(&nick, sender),
            Command::History { family, request } => self.history(family, request),
            Command::RandomNumber { min, max } => {
                if min >= max {
                    debug!(min, max, "Empty random range");
                    return Outcome::Nothing;
                }
                Outcome::Reply(format!("What about... {}", self.rng.gen_range(min..max)))
            }
            Command::Store(query) => {
                consult(self.lookups.storefront.as_deref(), &query, self.lookups.timeout).await
            }
            Command::Games(query) => {
                consult(self.lookups.game_credits.as_deref(), &query, self.lookups.timeout).await
            }
            Command::Quit => {
                info!(sender = %sender, "Quit requested");
                Outcome::Disconnect(self.flavor(QUIT_MESSAGES))
            }
            Command::AdminCheck => Outcome::Reply(format!("{sender}: admin criteria matched.")),
        }
    }

    fn is_admin(&self, nick: &str, host: &str) -> bool {
        self.admin
            .as_ref()
            .is_some_and(|rule| rule.permits(nick, host))
    }

    fn seen(&mut self, nick: &str, sender: &str) -> Outcome {
        if nick == sender {
            return Outcome::Reply(self.flavor(INSULTS));
        }
        match seen(self.store.history(), nick, self.store.now()) {
            Seen::Found(sighting) => Outcome::Reply(sighting.phrase()),
            Seen::NotFound => Outcome::Reply(self.flavor(UNKNOWN_USER)),
        }
    }

    fn history(&mut self, family: RecordFamily, request: HistoryRequest) -> Outcome {
        let (mode, participant) = match request {
            HistoryRequest::Last(who) => (QueryMode::Last, who),
            HistoryRequest::Random(who) => (QueryMode::Random, who),
            HistoryRequest::Find(pattern) => match QueryMode::find(&pattern) {
                Ok(mode) => (mode, None),
                Err(e) => return Outcome::Reply(format!("Invalid expression: {e}")),
            },
        };
        let scope = match participant.as_deref() {
            Some(id) => Scope::Participant(id),
            None => Scope::Global,
        };

        match query(self.store.history(), family, scope, &mode, &mut self.rng) {
            Some(hit) => Outcome::Reply(format_hit(&hit)),
            None => Outcome::NotFound(match family {
                RecordFamily::Messages => "message",
                RecordFamily::Links => "link",
            }),
        }
    }

    fn flavor(&mut self, lines: &[&str]) -> String {
        lines
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_default()
            .to_string()
    }
}

/// `[2024-01-01 12:00:00] alice: hello`
pub fn format_hit(hit: &Hit<'_>) -> String {
    format!(
        "[{}] {}: {}",
        hit.timestamp().format(TIMESTAMP_FORMAT),
        hit.author(),
        hit.text()
    )
}

fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

/// Ask an optional provider; failures are logged and answered with silence.
async fn consult<P>(provider: Option<&P>, query: &P::Query, limit: Duration) -> Outcome
where
    P: LookupProvider + ?Sized,
    P::Query: Display,
{
    let Some(provider) = provider else {
        return Outcome::Nothing;
    };
    match bounded(provider, query, limit).await {
        Ok(line) => Outcome::Reply(line),
        Err(e) => {
            warn!(provider = provider.name(), query = %query, "Lookup failed: {}", e);
            Outcome::Nothing
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;
    use std::marker::PhantomData;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rand::SeedableRng;
    use zax_history::{History, LogRecord};

    use super::*;
    use crate::config::ChannelConfig;
    use crate::error::LookupError;
    use crate::lookup::{CreditQuery, StoreQuery};

    const T0: i64 = 1_700_000_000;

    /// Answers `<prefix> <query>` for any query type.
    struct Canned<Q: ?Sized>(Result<&'static str, ()>, PhantomData<fn(&Q)>);

    fn canned<Q: ?Sized>(result: Result<&'static str, ()>) -> Arc<Canned<Q>> {
        Arc::new(Canned(result, PhantomData))
    }

    #[async_trait]
    impl<Q: ?Sized + Display + Sync> LookupProvider for Canned<Q> {
        type Query = Q;

        fn name(&self) -> &'static str {
            "canned"
        }

        async fn lookup(&self, query: &Q) -> Result<String, LookupError> {
            match self.0 {
                Ok(prefix) => Ok(format!("{prefix} {query}")),
                Err(()) => Err(LookupError::NoResult),
            }
        }
    }

    fn lookups(result: Result<&'static str, ()>) -> Lookups {
        Lookups {
            link_preview: Some(canned::<str>(result)),
            storefront: Some(canned::<StoreQuery>(result)),
            game_credits: Some(canned::<CreditQuery>(result)),
            timeout: Duration::from_secs(1),
        }
    }

    fn bot_with(config: BotConfig, now: Arc<AtomicI64>) -> Bot {
        let clock = move || -> DateTime<Utc> {
            DateTime::from_timestamp(now.load(Ordering::SeqCst), 0).unwrap()
        };
        let store = HistoryStore::new(
            History::new(),
            Box::new(Vec::<LogRecord>::new()),
            Box::new(clock),
        );
        Bot::new(
            store,
            config,
            lookups(Ok("[Link]")),
            StdRng::seed_from_u64(7),
        )
    }

    fn bot() -> Bot {
        bot_with(BotConfig::default(), Arc::new(AtomicI64::new(T0)))
    }

    fn say(sender: &str, body: &str) -> ChatEvent {
        ChatEvent::Text {
            sender: sender.to_string(),
            host: format!("{sender}.example.org"),
            target: "#chat".to_string(),
            body: body.to_string(),
        }
    }

    fn texts(out: &[Outbound]) -> Vec<&str> {
        out.iter()
            .filter_map(|o| match o {
                Outbound::Send { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_connected_joins_configured_channels() {
        let config = BotConfig {
            channels: vec![
                ChannelConfig {
                    chan: "#a".into(),
                    password: String::new(),
                },
                ChannelConfig {
                    chan: "#b".into(),
                    password: "pw".into(),
                },
            ],
            ..Default::default()
        };
        let mut bot = bot_with(config, Arc::new(AtomicI64::new(T0)));
        let out = bot.handle(ChatEvent::Connected).await.unwrap();
        assert_eq!(
            out,
            vec![
                Outbound::Join {
                    channel: "#a".into(),
                    password: String::new()
                },
                Outbound::Join {
                    channel: "#b".into(),
                    password: "pw".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_query_is_answered_before_recording() {
        let mut bot = bot();
        bot.handle(say("alice", "hello")).await.unwrap();
        let out = bot.handle(say("bob", ".m last")).await.unwrap();

        assert_eq!(texts(&out), vec!["[2023-11-14 22:13:20] alice: hello"]);
        assert_eq!(bot.store().history().messages().len(), 2);

        // The command line itself is now the last message.
        let out = bot.handle(say("carol", ".m last bob")).await.unwrap();
        assert_eq!(texts(&out), vec!["[2023-11-14 22:13:20] bob: .m last"]);
    }

    #[tokio::test]
    async fn test_empty_query_is_silent_but_reported() {
        let config = BotConfig {
            report_chan: "#log".into(),
            ..Default::default()
        };
        let mut bot = bot_with(config, Arc::new(AtomicI64::new(T0)));
        let out = bot.handle(say("alice", ".u last")).await.unwrap();
        assert_eq!(
            out,
            vec![Outbound::send("#log", "[#chat] alice: .u last")]
        );

        let out = bot.handle(say("alice", ".m last nobody")).await.unwrap();
        assert_eq!(texts(&out), vec!["[#chat] alice: .m last nobody"]);
    }

    #[tokio::test]
    async fn test_seen() {
        let now = Arc::new(AtomicI64::new(T0));
        let mut bot = bot_with(BotConfig::default(), now.clone());

        bot.handle(ChatEvent::Joined {
            nick: "dave".into(),
            channel: "#chat".into(),
        })
        .await
        .unwrap();
        now.fetch_add(3700, Ordering::SeqCst);

        let out = bot.handle(say("alice", "!dave")).await.unwrap();
        assert_eq!(texts(&out), vec!["dave was last seen 1 hour(s) ago joining."]);

        let out = bot.handle(say("alice", "!alice")).await.unwrap();
        assert!(INSULTS.contains(&texts(&out)[0]));

        let out = bot.handle(say("alice", "!zed")).await.unwrap();
        assert!(UNKNOWN_USER.contains(&texts(&out)[0]));
    }

    #[tokio::test]
    async fn test_quit_event_is_recorded() {
        let mut bot = bot();
        bot.handle(ChatEvent::Quit {
            nick: "erin".into(),
            reason: "Ping timeout".into(),
        })
        .await
        .unwrap();
        let events = bot.store().history().events();
        let last = events.last().unwrap();
        assert_eq!(last.kind, EventKind::Quit);
        assert_eq!(last.data, "Ping timeout");
        assert_eq!(last.channel, "");
    }

    #[tokio::test]
    async fn test_links_are_recorded_and_previewed_once() {
        let mut bot = bot();
        let out = bot
            .handle(say("alice", "look https://example.com/x"))
            .await
            .unwrap();
        assert_eq!(texts(&out), vec!["[Link] https://example.com/x"]);

        let out = bot
            .handle(say("bob", "again https://example.com/x"))
            .await
            .unwrap();
        assert!(out.is_empty());

        let history = bot.store().history();
        assert_eq!(history.links().len(), 2);
        assert_eq!(history.participant_links("bob").unwrap().len(), 1);

        let out = bot.handle(say("carol", ".u last alice")).await.unwrap();
        assert_eq!(
            texts(&out),
            vec!["[2023-11-14 22:13:20] alice: https://example.com/x"]
        );
    }

    #[tokio::test]
    async fn test_ignored_senders_links_are_dropped() {
        let config = BotConfig {
            ignore: vec!["otherbot".into()],
            ..Default::default()
        };
        let mut bot = bot_with(config, Arc::new(AtomicI64::new(T0)));
        let out = bot
            .handle(say("otherbot", "https://example.com/spam"))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(bot.store().history().links().is_empty());
        assert_eq!(bot.store().history().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_private_message_reply_goes_to_sender() {
        let mut bot = bot();
        let out = bot
            .handle(ChatEvent::Text {
                sender: "alice".into(),
                host: "h".into(),
                target: "zax".into(),
                body: "?h".into(),
            })
            .await
            .unwrap();
        assert!(matches!(&out[0], Outbound::Send { target, .. } if target == "alice"));
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_reported_to_user() {
        let mut bot = bot();
        let out = bot.handle(say("alice", ".m find (")).await.unwrap();
        assert!(texts(&out)[0].starts_with("Invalid expression:"));
    }

    #[tokio::test]
    async fn test_find_searches_whole_history() {
        let mut bot = bot();
        for line in ["foo", "bar", "foo then bar", "baz"] {
            bot.handle(say("alice", line)).await.unwrap();
        }
        let out = bot.handle(say("bob", ".m f foo.*bar")).await.unwrap();
        assert_eq!(
            texts(&out),
            vec!["[2023-11-14 22:13:20] alice: foo then bar"]
        );
    }

    #[tokio::test]
    async fn test_quit_requires_admin() {
        let config = BotConfig {
            admin: "nick:^root$".into(),
            ..Default::default()
        };
        let mut bot = bot_with(config, Arc::new(AtomicI64::new(T0)));

        let out = bot.handle(say("mallory", "<<")).await.unwrap();
        assert!(out.is_empty());

        let out = bot.handle(say("root", "<<")).await.unwrap();
        match out.as_slice() {
            [Outbound::Disconnect { reason }] => assert!(QUIT_MESSAGES.contains(&reason.as_str())),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_admin_criteria_disable_admin() {
        let config = BotConfig {
            admin: "root".into(),
            ..Default::default()
        };
        let mut bot = bot_with(config, Arc::new(AtomicI64::new(T0)));
        assert!(bot.handle(say("root", "<<")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_random_number() {
        let mut bot = bot();
        let out = bot.handle(say("alice", ".r 4 5")).await.unwrap();
        assert_eq!(texts(&out), vec!["What about... 4"]);

        let out = bot.handle(say("alice", ".r 5 5")).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_store_lookup() {
        let mut bot = bot();
        let out = bot.handle(say("alice", ".s appid 440")).await.unwrap();
        assert_eq!(texts(&out), vec!["[Link] appid 440"]);

        let out = bot.handle(say("alice", ".s find 1942")).await.unwrap();
        assert_eq!(texts(&out), vec!["[Link] find 1942"]);

        let out = bot.handle(say("alice", ".s trending")).await.unwrap();
        assert_eq!(texts(&out), vec!["[Link] trending"]);

        bot.lookups = lookups(Err(()));
        let out = bot.handle(say("alice", ".s find portal")).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_game_lookup() {
        let mut bot = bot();
        let out = bot
            .handle(say("alice", ".g coded by John Carmack in 1993"))
            .await
            .unwrap();
        assert_eq!(texts(&out), vec!["[Link] programming by john carmack in 1993"]);

        bot.lookups.game_credits = None;
        let out = bot.handle(say("alice", ".g made by sid meier")).await.unwrap();
        assert!(out.is_empty());
    }
}
