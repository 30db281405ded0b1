//! Error types for the Shelf client.
//!
//! Errors fall into the categories a caller needs to act on:
//!
//! - **Config**: the endpoint or query is unusable; nothing was sent
//! - **Connect**: the relay or a transfer peer could not be reached
//! - **Parse**: a handshake was malformed
//! - **Transfer**: a transfer was cut short or its container was bad
//! - **Timeout**: a join, search or download ran out of time
//!
//! Inside a search, parse and transfer errors only affect the message that
//! produced them. A download has a single expected response, so they
//! become the result of the call.

use shelf_dcc::{HandshakeError, TransferError};
use shelf_relay::RelayError;
use std::borrow::Cow;
use thiserror::Error;

/// Errors returned by [`crate::Session`] operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid endpoint, channel or query
    #[error("invalid configuration: {0}")]
    Config(Cow<'static, str>),

    /// Relay connection could not be established
    #[error("failed to connect: {0}")]
    Connect(#[source] RelayError),

    /// Malformed DCC SEND handshake
    #[error("failed to parse DCC SEND: {0}")]
    Parse(#[from] HandshakeError),

    /// Transfer failed
    #[error("failed to receive DCC SEND: {0}")]
    Transfer(#[from] TransferError),

    /// Operation ran out of time
    #[error("timeout {0}")]
    Timeout(Cow<'static, str>),

    /// Operation requires a connected session
    #[error("client not connected")]
    NotConnected,

    /// Relay failed on an established connection
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),
}

impl Error {
    /// Returns true for timeouts
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Returns true if a relay or transfer peer could not be reached
    #[must_use]
    pub fn is_connect(&self) -> bool {
        match self {
            Error::Connect(_) => true,
            Error::Transfer(e) => e.is_connect_failure(),
            _ => false,
        }
    }

    /// Returns true if retrying the same call may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::Connect(_) | Error::Transfer(_) | Error::Relay(_)
        )
    }
}

/// Result alias for Shelf operations
pub type Result<T> = std::result::Result<T, Error>;
