//! Bot configuration.
//!
//! Loaded from a JSON file (legacy `conf.json` layout, capitalized keys
//! accepted) and then overridden from environment variables.  Every field
//! has a default so the bot can start against a local server with no file
//! at all.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::BotError;
use crate::irc::TlsMode;

/// A channel to join after registration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelConfig {
    #[serde(alias = "Chan")]
    pub chan: String,
    #[serde(alias = "Password")]
    pub password: String,
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Admin criteria, `nick:<regex>` or `host:<regex>`.
    /// Env: `ZAX_ADMIN`
    #[serde(alias = "Admin")]
    pub admin: String,

    #[serde(alias = "Username")]
    pub username: String,

    /// Env: `ZAX_NICKNAME`
    #[serde(alias = "Nickname")]
    pub nickname: String,

    /// `host:port` of the IRC server.
    /// Env: `ZAX_SERVER`
    #[serde(alias = "Server")]
    pub server: String,

    /// Connect over TLS.
    #[serde(alias = "SSL")]
    pub ssl: bool,

    /// Accept any server certificate when `ssl` is set.
    #[serde(alias = "SSLIgnoreInsecure")]
    pub ssl_ignore_insecure: bool,

    /// Channel every message is echoed to; empty disables echoing.
    /// Env: `ZAX_REPORT_CHAN`
    #[serde(alias = "ReportChan")]
    pub report_chan: String,

    /// User agent for lookup requests.
    #[serde(alias = "UserAgent")]
    pub user_agent: String,

    #[serde(alias = "Channels")]
    pub channels: Vec<ChannelConfig>,

    /// Senders whose links are neither logged nor previewed (other bots).
    #[serde(alias = "Ignore")]
    pub ignore: Vec<String>,

    /// Path of the durable history log.
    /// Env: `ZAX_HISTORY_PATH`
    pub history_path: PathBuf,

    /// Upper bound for a single external lookup.
    pub lookup_timeout_secs: u64,

    /// The connection is considered dead after this much silence.
    pub read_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            admin: String::new(),
            username: "zax".to_string(),
            nickname: "zax".to_string(),
            server: "127.0.0.1:6667".to_string(),
            ssl: false,
            ssl_ignore_insecure: false,
            report_chan: String::new(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
                .to_string(),
            channels: Vec::new(),
            ignore: Vec::new(),
            history_path: PathBuf::from("history.log"),
            lookup_timeout_secs: 10,
            read_timeout_secs: 300,
        }
    }
}

impl BotConfig {
    /// Load `path`, falling back to defaults when the file does not exist,
    /// then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, BotError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(BotError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, BotError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(server) = var("ZAX_SERVER") {
            self.server = server;
        }

        if let Some(nick) = var("ZAX_NICKNAME") {
            if nick.trim().is_empty() {
                warn!("Empty ZAX_NICKNAME, keeping {}", self.nickname);
            } else {
                self.nickname = nick;
            }
        }

        if let Some(admin) = var("ZAX_ADMIN") {
            self.admin = admin;
        }

        if let Some(chan) = var("ZAX_REPORT_CHAN") {
            self.report_chan = chan;
        }

        if let Some(path) = var("ZAX_HISTORY_PATH") {
            self.history_path = PathBuf::from(path);
        }

        if let Some(val) = var("ZAX_LOOKUP_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => self.lookup_timeout_secs = secs,
                _ => warn!(value = %val, "Invalid ZAX_LOOKUP_TIMEOUT_SECS, using default"),
            }
        }
    }

    pub fn tls_mode(&self) -> TlsMode {
        match (self.ssl, self.ssl_ignore_insecure) {
            (false, _) => TlsMode::Plain,
            (true, false) => TlsMode::Verified,
            (true, true) => TlsMode::Insecure,
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn is_ignored(&self, nick: &str) -> bool {
        self.ignore.iter().any(|n| n == nick)
    }
}
