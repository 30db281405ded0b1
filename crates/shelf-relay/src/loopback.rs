//! In-process relay.
//!
//! [`LoopbackNetwork`] stands in for an IRC network inside a single
//! process: clients connect through it as a [`Connector`], and the other
//! side (a scripted file bot in tests) watches channel traffic with
//! [`LoopbackNetwork::channel_messages`] and answers with
//! [`LoopbackNetwork::deliver`].

use crate::EVENT_CHANNEL_CAPACITY;
use crate::client::{Connector, Relay};
use crate::dispatch::{Dispatcher, Subscription, lock};
use crate::endpoint::Endpoint;
use crate::error::RelayError;
use crate::event::{PrivateMessage, RelayEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Message a client sent to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Sending nickname
    pub sender: String,
    /// Channel (or nickname) the text was sent to
    pub target: String,
    /// Message text
    pub text: String,
}

struct Network {
    clients: Mutex<HashMap<String, Dispatcher>>,
    channel_tx: broadcast::Sender<ChannelMessage>,
    refuse_joins: AtomicBool,
    refuse_connections: AtomicBool,
}

/// In-process relay network
#[derive(Clone)]
pub struct LoopbackNetwork {
    inner: Arc<Network>,
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackNetwork {
    /// Create an empty network
    #[must_use]
    pub fn new() -> Self {
        let (channel_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Network {
                clients: Mutex::new(HashMap::new()),
                channel_tx,
                refuse_joins: AtomicBool::new(false),
                refuse_connections: AtomicBool::new(false),
            }),
        }
    }

    /// Observe everything clients send
    #[must_use]
    pub fn channel_messages(&self) -> broadcast::Receiver<ChannelMessage> {
        self.inner.channel_tx.subscribe()
    }

    /// Deliver a private message to the client holding `msg.target`.
    ///
    /// Returns the number of listeners that received it (0 if no such
    /// client is connected).
    pub fn deliver(&self, msg: PrivateMessage) -> usize {
        let dispatcher = lock(&self.inner.clients)
            .get(&msg.target.to_ascii_lowercase())
            .cloned();
        dispatcher.map_or(0, |d| d.dispatch(&msg))
    }

    /// Never confirm joins, to exercise join timeouts
    pub fn refuse_joins(&self, refuse: bool) {
        self.inner.refuse_joins.store(refuse, Ordering::SeqCst);
    }

    /// Reject new registrations
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Nicknames currently connected
    #[must_use]
    pub fn nicks(&self) -> Vec<String> {
        let mut nicks: Vec<String> = lock(&self.inner.clients).keys().cloned().collect();
        nicks.sort();
        nicks
    }

    /// Listeners registered by the client holding `nick`
    #[must_use]
    pub fn listener_count(&self, nick: &str) -> usize {
        lock(&self.inner.clients)
            .get(&nick.to_ascii_lowercase())
            .map_or(0, Dispatcher::listener_count)
    }
}

impl Connector for LoopbackNetwork {
    type Relay = LoopbackRelay;

    async fn connect(&self, endpoint: &Endpoint, nick: &str) -> Result<LoopbackRelay, RelayError> {
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(RelayError::Registration(format!(
                "{} refused the connection",
                endpoint.address()
            )));
        }

        let dispatcher = Dispatcher::new();
        let mut clients = lock(&self.inner.clients);
        let mut nick = nick.to_string();
        while clients.contains_key(&nick.to_ascii_lowercase()) {
            nick.push('_');
        }
        clients.insert(nick.to_ascii_lowercase(), dispatcher.clone());
        drop(clients);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        tracing::debug!("Loopback client {} connected", nick);
        Ok(LoopbackRelay {
            network: self.inner.clone(),
            nick,
            dispatcher,
            events,
            closed: AtomicBool::new(false),
        })
    }
}

/// Client side of a [`LoopbackNetwork`]
pub struct LoopbackRelay {
    network: Arc<Network>,
    nick: String,
    dispatcher: Dispatcher,
    events: broadcast::Sender<RelayEvent>,
    closed: AtomicBool,
}

impl LoopbackRelay {
    fn ensure_open(&self) -> Result<(), RelayError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RelayError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Relay for LoopbackRelay {
    fn nick(&self) -> String {
        self.nick.clone()
    }

    async fn join(&self, channel: &str) -> Result<(), RelayError> {
        self.ensure_open()?;
        if !self.network.refuse_joins.load(Ordering::SeqCst) {
            let _ = self.events.send(RelayEvent::Joined {
                channel: channel.to_string(),
                nick: self.nick.clone(),
            });
        }
        Ok(())
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<(), RelayError> {
        self.ensure_open()?;
        let _ = self.network.channel_tx.send(ChannelMessage {
            sender: self.nick.clone(),
            target: target.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn subscribe<F>(&self, predicate: F) -> Subscription
    where
        F: Fn(&PrivateMessage) -> bool + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(predicate)
    }

    fn events(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.network.clients).remove(&self.nick.to_ascii_lowercase());
        let _ = self.events.send(RelayEvent::Disconnected);
        tracing::debug!("Loopback client {} disconnected", self.nick);
    }
}

impl Drop for LoopbackRelay {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            lock(&self.network.clients).remove(&self.nick.to_ascii_lowercase());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("loopback", None, "#ebooks")
    }

    #[tokio::test]
    async fn test_round_trip() {
        let network = LoopbackNetwork::new();
        let mut channel = network.channel_messages();

        let relay = network.connect(&endpoint(), "seeker").await.unwrap();
        let mut events = relay.events();
        relay.join("#ebooks").await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            RelayEvent::Joined {
                channel: "#ebooks".to_string(),
                nick: "seeker".to_string()
            }
        );

        relay.send_message("#ebooks", "@search x").await.unwrap();
        let sent = channel.recv().await.unwrap();
        assert_eq!(sent.sender, "seeker");
        assert_eq!(sent.text, "@search x");

        let mut sub = relay.subscribe(|_| true);
        assert_eq!(network.deliver(PrivateMessage::new("SEEKER", "Bot", "hi")), 1);
        assert_eq!(sub.recv().await.unwrap().text, "hi");
    }

    #[tokio::test]
    async fn test_nick_collision() {
        let network = LoopbackNetwork::new();
        let a = network.connect(&endpoint(), "seeker").await.unwrap();
        let b = network.connect(&endpoint(), "seeker").await.unwrap();
        assert_eq!(a.nick(), "seeker");
        assert_eq!(b.nick(), "seeker_");
        assert_eq!(network.nicks(), vec!["seeker", "seeker_"]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let network = LoopbackNetwork::new();
        let relay = network.connect(&endpoint(), "seeker").await.unwrap();
        relay.close().await;
        relay.close().await;
        assert!(network.nicks().is_empty());
        assert!(matches!(
            relay.send_message("#ebooks", "x").await,
            Err(RelayError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_refuse_connections() {
        let network = LoopbackNetwork::new();
        network.refuse_connections(true);
        assert!(network.connect(&endpoint(), "seeker").await.is_err());
    }
}
