//! Messages and lifecycle events delivered by a relay.

/// Private message received from the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateMessage {
    /// Nickname (or channel) the message was addressed to
    pub target: String,
    /// Nickname of the sender
    pub sender: String,
    /// Message text, CTCP delimiters included
    pub text: String,
}

impl PrivateMessage {
    /// Create a new message
    pub fn new(
        target: impl Into<String>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// Returns true if the message is addressed to `nick` (case-insensitive)
    #[must_use]
    pub fn is_addressed_to(&self, nick: &str) -> bool {
        self.target.eq_ignore_ascii_case(nick)
    }
}

/// Connection lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Registration accepted under `nick`
    Connected {
        /// Negotiated nickname
        nick: String,
    },
    /// `nick` joined `channel`
    Joined {
        /// Channel joined
        channel: String,
        /// Nickname that joined
        nick: String,
    },
    /// Server reported an error
    Error(String),
    /// Connection is gone
    Disconnected,
}
