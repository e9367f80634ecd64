//! Transport-neutral events flowing into and out of the bot.

/// Something the chat transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Registration finished; channels may be joined now.
    Connected,
    Joined {
        nick: String,
        channel: String,
    },
    Quit {
        nick: String,
        reason: String,
    },
    Text {
        sender: String,
        host: String,
        /// Channel name, or our own nick for a private message.
        target: String,
        body: String,
    },
}

/// Something the bot wants the transport to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Join { channel: String, password: String },
    Send { target: String, text: String },
    Disconnect { reason: String },
}

impl Outbound {
    pub fn send(target: impl Into<String>, text: impl Into<String>) -> Self {
        Outbound::Send {
            target: target.into(),
            text: text.into(),
        }
    }
}
