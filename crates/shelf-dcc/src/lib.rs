//! # Shelf DCC
//!
//! Out-of-band transfer layer for Shelf.
//!
//! File bots answer requests by advertising a direct TCP endpoint inside a
//! CTCP `DCC SEND` private message. This crate provides:
//! - Handshake parsing (`DCC SEND "<file>" <ip> <port> <size>`)
//! - A size-bounded transfer receiver
//! - Unwrapping of single-entry ZIP containers
//!
//! ## Example
//!
//! ```rust,no_run
//! use shelf_dcc::{DccSend, Receiver, Unwrap};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let send = DccSend::parse("\"Oliver Twist.epub\" 2130706433 6634 468095")?;
//! assert_eq!(send.addr.to_string(), "127.0.0.1");
//!
//! let bytes = Receiver::default().receive(&send, Unwrap::Raw).await?;
//! assert_eq!(bytes.len() as u64, send.size);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod receive;
pub mod send;

pub use error::{HandshakeError, TransferError};
pub use receive::{Receiver, Unwrap, unzip_first_entry};
pub use send::{DccSend, decode_ipv4, encode_ipv4, parse_ctcp};

/// CTCP delimiter wrapping `DCC` requests
pub const CTCP_DELIM: char = '\x01';

/// Keyword that introduces a send handshake inside a CTCP message
pub const DCC_SEND_PREFIX: &str = "DCC SEND ";

/// Extension (lower-case, without dot) of the container format that
/// the receiver knows how to unwrap
pub const CONTAINER_EXTENSION: &str = "zip";

/// Transfer connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
