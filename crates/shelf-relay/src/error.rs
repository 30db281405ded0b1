//! Relay error types.

use thiserror::Error;

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    /// Endpoint failed validation
    #[error("invalid relay endpoint: {0}")]
    InvalidEndpoint(String),

    /// Could not open a connection to the relay server
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// `host:port` that was dialled
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Network I/O error on an established connection
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server refused or aborted registration
    #[error("registration failed: {0}")]
    Registration(String),

    /// Connection already closed
    #[error("relay connection closed")]
    Closed,

    /// Operation timed out
    #[error("relay operation timed out: {0}")]
    Timeout(&'static str),
}
