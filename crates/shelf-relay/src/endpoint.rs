//! Relay endpoint configuration.

use crate::error::RelayError;
use crate::{CHANNEL_MARKER, DEFAULT_IRC_PORT};
use std::fmt;

/// Relay server and channel to search in.
///
/// Immutable once built; the channel always carries the `#` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    address: String,
    port: u16,
    channel: String,
}

impl Endpoint {
    /// Create an endpoint.
    ///
    /// A missing or zero port falls back to [`DEFAULT_IRC_PORT`] and the
    /// channel is normalized with [`normalize_channel`].
    pub fn new(address: impl Into<String>, port: Option<u16>, channel: &str) -> Self {
        Self {
            address: address.into().trim().to_string(),
            port: port.filter(|&p| p != 0).unwrap_or(DEFAULT_IRC_PORT),
            channel: normalize_channel(channel),
        }
    }

    /// IRCHighway `#ebooks`
    #[must_use]
    pub fn irchighway() -> Self {
        Self::new("irc.irchighway.net", None, "#ebooks")
    }

    /// Undernet `#bookz`
    #[must_use]
    pub fn undernet() -> Self {
        Self::new("irc.undernet.org", None, "#bookz")
    }

    /// Server host name or address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Server port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Channel name, marker included
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Validate the endpoint before any I/O is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidEndpoint`] for an empty address or a
    /// channel that is nothing but the marker.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.address.is_empty() {
            return Err(RelayError::InvalidEndpoint(
                "server address is empty".to_string(),
            ));
        }
        if self.channel.chars().count() <= 1 {
            return Err(RelayError::InvalidEndpoint(format!(
                "invalid channel name: {:?}",
                self.channel
            )));
        }
        if self.channel.contains(char::is_whitespace) || self.channel.contains(',') {
            return Err(RelayError::InvalidEndpoint(format!(
                "channel name contains invalid characters: {:?}",
                self.channel
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.address, self.port, self.channel)
    }
}

/// Prefix `channel` with the marker if it lacks one. Idempotent.
#[must_use]
pub fn normalize_channel(channel: &str) -> String {
    let channel = channel.trim();
    if channel.starts_with(CHANNEL_MARKER) {
        channel.to_string()
    } else {
        format!("{CHANNEL_MARKER}{channel}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_endpoint_defaults() {
        let ep = Endpoint::new("irc.example.net", None, "ebooks");
        assert_eq!(ep.port(), DEFAULT_IRC_PORT);
        assert_eq!(ep.channel(), "#ebooks");
        assert!(ep.validate().is_ok());

        let ep = Endpoint::new("irc.example.net", Some(0), "#ebooks");
        assert_eq!(ep.port(), DEFAULT_IRC_PORT);

        let ep = Endpoint::new("irc.example.net", Some(6697), "#ebooks");
        assert_eq!(ep.port(), 6697);
    }

    #[test]
    fn test_presets() {
        assert_eq!(Endpoint::irchighway().to_string(), "irc.irchighway.net:6667/#ebooks");
        assert_eq!(Endpoint::undernet().channel(), "#bookz");
    }

    #[test]
    fn test_validation() {
        assert!(Endpoint::new("", None, "#ebooks").validate().is_err());
        assert!(Endpoint::new("  ", None, "#ebooks").validate().is_err());
        assert!(Endpoint::new("irc.example.net", None, "").validate().is_err());
        assert!(Endpoint::new("irc.example.net", None, "#").validate().is_err());
        assert!(Endpoint::new("irc.example.net", None, "#a b").validate().is_err());
        assert!(Endpoint::new("irc.example.net", None, "#a").validate().is_ok());
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(channel in "[#a-z0-9_-]{0,16}") {
            let once = normalize_channel(&channel);
            prop_assert!(once.starts_with(CHANNEL_MARKER));
            prop_assert_eq!(normalize_channel(&once), once);
        }
    }
}
