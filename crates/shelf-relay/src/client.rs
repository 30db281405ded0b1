//! Relay capability traits.

use crate::dispatch::Subscription;
use crate::endpoint::Endpoint;
use crate::error::RelayError;
use crate::event::{PrivateMessage, RelayEvent};
use std::future::Future;
use tokio::sync::broadcast;

/// A live relay connection
pub trait Relay: Send + Sync + 'static {
    /// Nickname currently held on the relay
    fn nick(&self) -> String;

    /// Request to join `channel`. Confirmation arrives as
    /// [`RelayEvent::Joined`].
    fn join(&self, channel: &str) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Send `text` to a channel or nickname
    fn send_message(
        &self,
        target: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Register a listener for inbound private messages matching `predicate`
    fn subscribe<F>(&self, predicate: F) -> Subscription
    where
        F: Fn(&PrivateMessage) -> bool + Send + Sync + 'static;

    /// Subscribe to lifecycle events
    fn events(&self) -> broadcast::Receiver<RelayEvent>;

    /// Leave the relay. Idempotent.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Factory for relay connections
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced
    type Relay: Relay;

    /// Connect to `endpoint` and register as `nick`.
    ///
    /// Resolves once the relay has accepted the registration; the
    /// negotiated nickname may differ from `nick`.
    fn connect(
        &self,
        endpoint: &Endpoint,
        nick: &str,
    ) -> impl Future<Output = Result<Self::Relay, RelayError>> + Send;
}
