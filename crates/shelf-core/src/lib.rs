//! # Shelf Core
//!
//! Search and download negotiation for ebook file bots on IRC.
//!
//! This crate provides:
//! - A single-flight [`Session`] that connects, joins a channel and runs
//!   one query at a time
//! - The search negotiation: send `@search`, collect zipped listings
//!   offered over DCC, stop on a quiet period or a deadline
//! - The download negotiation: replay a listing command, receive one file
//! - Listing parsing and extension filtering ([`results`])
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Session                    │
//! │   (one lock held for every operation)       │
//! ├──────────────────────┬──────────────────────┤
//! │      negotiate       │       results        │
//! │  (select! + worker)  │  (listing parsing)   │
//! ├──────────────────────┴──────────────────────┤
//! │   shelf-relay (IRC)  │  shelf-dcc (DCC)     │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use shelf_core::{Session, default_nick};
//! use shelf_relay::{Endpoint, irc::IrcConnector};
//!
//! # async fn example() -> Result<(), shelf_core::Error> {
//! let session = Session::new(Endpoint::irchighway(), default_nick(), IrcConnector::default());
//! session.connect().await?;
//!
//! let outcome = session.search("charles dickens", &["epub".to_string()]).await?;
//! if let Some(first) = outcome.results.first() {
//!     let bytes = session.download(first).await?;
//!     std::fs::write(&first.filename, bytes).ok();
//! }
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod negotiate;
pub mod results;
pub mod session;

pub use error::{Error, Result};
pub use negotiate::{SearchOutcome, SearchStop, Timeouts};
pub use results::{SearchResult, filter_by_extension, parse_listing};
pub use session::{Session, default_nick};

/// Channel command that asks search bots for a listing
pub const SEARCH_COMMAND: &str = "@search";

/// Bound on connecting and joining the channel (30 seconds)
pub const JOIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
