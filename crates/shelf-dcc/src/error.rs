//! DCC error types.

use std::net::SocketAddrV4;
use thiserror::Error;

/// Errors produced while parsing a `DCC SEND` handshake
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// Payload was empty after trimming
    #[error("empty DCC SEND payload")]
    Empty,

    /// Filename opened a quote that never closes
    #[error("unterminated quote in filename")]
    UnterminatedQuote,

    /// Bare filename with nothing after it
    #[error("missing DCC SEND parameters after filename")]
    MissingParameters,

    /// Parameter tail did not contain exactly `ip port size`
    #[error("invalid DCC SEND parameters: expected IP PORT SIZE, got {found} fields")]
    ParameterCount {
        /// Number of fields actually present
        found: usize,
    },

    /// A numeric field did not fit its expected width
    #[error("invalid {field}: {value:?}")]
    InvalidField {
        /// Field name (`ip`, `port` or `size`)
        field: &'static str,
        /// Offending text
        value: String,
    },
}

/// Errors produced while receiving a transfer
#[derive(Debug, Error)]
pub enum TransferError {
    /// TCP connect to the advertised peer failed
    #[error("failed to connect to DCC sender {addr}: {source}")]
    ConnectFailed {
        /// Advertised peer address
        addr: SocketAddrV4,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// TCP connect did not complete within the connect timeout
    #[error("timed out connecting to DCC sender {addr}")]
    ConnectTimeout {
        /// Advertised peer address
        addr: SocketAddrV4,
    },

    /// Peer closed the stream before the declared size was reached
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead {
        /// Declared size from the handshake
        expected: u64,
        /// Bytes actually received
        received: u64,
    },

    /// Stream failed mid-transfer
    #[error("failed to read data: {0}")]
    Io(#[from] std::io::Error),

    /// Container could not be opened or its first entry read
    #[error("container error: {0}")]
    Container(String),
}

impl TransferError {
    /// Returns true if the transfer never got a connection to the peer
    #[must_use]
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            TransferError::ConnectFailed { .. } | TransferError::ConnectTimeout { .. }
        )
    }
}
