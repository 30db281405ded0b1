//! Minimal IRC client.
//!
//! Only the part of the IRC grammar Shelf needs is understood:
//! registration (`NICK`/`USER`, `001`, `433`), keepalive (`PING`),
//! `JOIN`, `NICK`, `PRIVMSG` and `ERROR`. Everything else is ignored.

pub mod client;
pub mod line;

pub use client::{IrcConnector, IrcRelay};
pub use line::IrcLine;

/// Grace period for flushing `QUIT` on close
pub const CLOSE_GRACE: std::time::Duration = std::time::Duration::from_secs(2);

/// Maximum accepted line length; longer lines are truncated
pub const MAX_LINE_LENGTH: usize = 8192;
