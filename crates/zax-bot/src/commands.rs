//! Command-line syntax of chat commands.
//!
//! A command is recognized by its first whitespace-separated token.  Parsing
//! never fails loudly: anything that is not a well-formed command is just
//! chat.

use zax_history::RecordFamily;

use crate::lookup::{CreditQuery, StoreQuery};

/// What a history command asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryRequest {
    /// Most recent record, optionally for one participant.
    Last(Option<String>),
    /// Random record, optionally for one participant.
    Random(Option<String>),
    /// Last record matching a regular expression, over the global sequence.
    Find(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `?h [topic [subtopic]]`
    Help(Option<String>),
    /// `!<nick>`
    Seen(String),
    /// `.m` / `.u` queries.
    History {
        family: RecordFamily,
        request: HistoryRequest,
    },
    /// `.r <min> <max>`
    RandomNumber { min: i64, max: i64 },
    /// `.s find <term>` / `.s appid <id>` / `.s latest|random|trending`
    Store(StoreQuery),
    /// `.g <role> by <person> [in <year>]`
    Games(CreditQuery),
    /// `<<` (admin): leave the network.
    Quit,
    /// `%%` (admin): answers whether the sender matches the admin rule.
    AdminCheck,
}

impl Command {
    pub fn requires_admin(&self) -> bool {
        matches!(self, Command::Quit | Command::AdminCheck)
    }
}

const MSG: [&str; 2] = [".m", ".msg"];
const URL: [&str; 2] = [".u", ".url"];
const RANDOM: [&str; 2] = [".r", ".random"];
const STEAM: [&str; 2] = [".s", ".steam"];
const GAME: [&str; 2] = [".g", ".game"];

/// Parse a chat line into a command.
pub fn parse(text: &str) -> Option<Command> {
    let text = text.trim();
    let (head, rest) = split_word(text);

    match head {
        "?h" => Some(Command::Help((!rest.is_empty()).then(|| rest.to_string()))),
        "<<" if rest.is_empty() => Some(Command::Quit),
        "%%" => Some(Command::AdminCheck),
        h if MSG.contains(&h) => parse_history(RecordFamily::Messages, rest),
        h if URL.contains(&h) => parse_history(RecordFamily::Links, rest),
        h if RANDOM.contains(&h) => parse_random(rest),
        h if STEAM.contains(&h) => parse_store(rest),
        h if GAME.contains(&h) => CreditQuery::parse(rest).map(Command::Games),
        h if h.len() > 1 && h.starts_with('!') => Some(Command::Seen(h[1..].to_string())),
        _ => None,
    }
}

fn parse_history(family: RecordFamily, args: &str) -> Option<Command> {
    let (sub, rest) = split_word(args);
    let request = match sub {
        "last" | "l" => HistoryRequest::Last(first_word(rest).map(str::to_string)),
        "random" | "r" => HistoryRequest::Random(first_word(rest).map(str::to_string)),
        // The pattern keeps its inner spacing.
        "find" | "f" if !rest.is_empty() => HistoryRequest::Find(rest.to_string()),
        _ => return None,
    };
    Some(Command::History { family, request })
}

fn parse_random(args: &str) -> Option<Command> {
    let mut words = args.split_whitespace();
    let min = words.next()?.parse().ok()?;
    let max = words.next()?.parse().ok()?;
    Some(Command::RandomNumber { min, max })
}

fn parse_store(args: &str) -> Option<Command> {
    let (sub, rest) = split_word(args);
    let query = match sub {
        // Digits are a search term here; only `appid` addresses an app.
        "find" | "f" if !rest.is_empty() => StoreQuery::Search(rest.to_string()),
        "appid" | "a" => StoreQuery::AppId(first_word(rest)?.parse().ok()?),
        "latest" | "l" => StoreQuery::Latest,
        "random" | "r" => StoreQuery::Random,
        "trending" | "t" => StoreQuery::Trending,
        _ => return None,
    };
    Some(Command::Store(query))
}

/// Split off the first word; the remainder is trimmed.
fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    }
}

fn first_word(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

/// Help text for `?h`, `?h <topic>` and `?h .s symbols`.
pub fn help(topic: Option<&str>) -> Option<&'static str> {
    let Some(topic) = topic else {
        return Some("Cmds: [[.g(ame) .r(andom) .s(team) .u(rl) .m(sg) !]] -- Type ?h <cmd> for more info.");
    };
    let (topic, sub) = split_word(topic);
    match topic {
        "!" => Some("Checks when user was last seen. Syntax: !<username>"),
        t if RANDOM.contains(&t) => Some("Generate random number. Syntax: .random <min> <max>"),
        t if STEAM.contains(&t) && sub == "symbols" => Some(
            "MP=MultiPlayer, SP=SinglePlayer, CO=Co-op VAC=Valve Anti-Cheat, TC=Trading Card, Ach=Achievments, EA=Early Access, WS=Workshop support",
        ),
        t if STEAM.contains(&t) => Some(
            "Search steam. For result symbols type '?h .s symbols' Syntax: .steam [ find <term> | appid <id> | latest | random | trending ]",
        ),
        t if GAME.contains(&t) => {
            Some("Search for game info. Syntax: .game <role> by <person> [in <year>]")
        }
        t if MSG.contains(&t) => {
            Some("Search message log. Syntax: .msg [ find <expression> | last [user] | random [user] ]")
        }
        t if URL.contains(&t) => {
            Some("Search URL log. Syntax: .url [ find <expression> | last [user] | random [user] ]")
        }
        _ => None,
    }
}
