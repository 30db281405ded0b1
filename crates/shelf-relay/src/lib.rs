//! # Shelf Relay
//!
//! Chat-relay capability consumed by the Shelf negotiation engine.
//!
//! This crate provides:
//! - The [`Relay`] and [`Connector`] traits the core is written against
//! - A listener registry ([`Dispatcher`]) with scoped [`Subscription`]s
//! - A minimal IRC line client ([`irc::IrcConnector`])
//! - An in-process relay for tests and demos ([`loopback::LoopbackNetwork`])
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────┐  PRIVMSG / JOIN / PING   ┌──────────────┐
//!        │  IRC server  │ ◀──────────────────────▶ │  reader task │
//!        └──────────────┘                          └──────┬───────┘
//!                                                         │ dispatch()
//!                                    ┌────────────────────┴────┐
//!                                    ▼                         ▼
//!                             Subscription A            Subscription B
//!                            (search listener)       (download listener)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use shelf_relay::{Connector, Endpoint, Relay, irc::IrcConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Endpoint::irchighway();
//! let relay = IrcConnector::default().connect(&endpoint, "bookseeker_123").await?;
//! relay.join(endpoint.channel()).await?;
//!
//! let nick = relay.nick();
//! let mut sub = relay.subscribe(move |m| m.target == nick);
//! relay.send_message(endpoint.channel(), "@search dickens").await?;
//! let msg = sub.recv().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod irc;
pub mod loopback;

pub use client::{Connector, Relay};
pub use dispatch::{Dispatcher, Subscription};
pub use endpoint::{Endpoint, normalize_channel};
pub use error::RelayError;
pub use event::{PrivateMessage, RelayEvent};

/// Default IRC port (plaintext)
pub const DEFAULT_IRC_PORT: u16 = 6667;

/// Marker character every channel name starts with
pub const CHANNEL_MARKER: char = '#';

/// Relay connection timeout (10 seconds)
pub const RELAY_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Capacity of the lifecycle event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
