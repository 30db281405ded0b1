//! Listener registry for inbound private messages.
//!
//! The relay's reader task calls [`Dispatcher::dispatch`] for every
//! private message. Dispatch never blocks: matching messages are pushed
//! onto each listener's unbounded queue and consumers drain them from
//! their own task. A [`Subscription`] deregisters itself when dropped.

use crate::event::PrivateMessage;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

type Predicate = Box<dyn Fn(&PrivateMessage) -> bool + Send + Sync>;

struct Listener {
    predicate: Predicate,
    tx: mpsc::UnboundedSender<PrivateMessage>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared listener registry
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Dispatcher {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for messages matching `predicate`
    pub fn subscribe<F>(&self, predicate: F) -> Subscription
    where
        F: Fn(&PrivateMessage) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(
            id,
            Listener {
                predicate: Box::new(predicate),
                tx,
            },
        );
        tracing::trace!("Listener {} registered", id);

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
            active: true,
        }
    }

    /// Deliver `msg` to every matching listener.
    ///
    /// Returns the number of listeners that received it. Listeners whose
    /// receiving side is gone are pruned.
    pub fn dispatch(&self, msg: &PrivateMessage) -> usize {
        let mut registry = lock(&self.registry);
        let mut delivered = 0;
        registry.listeners.retain(|_, listener| {
            if !(listener.predicate)(msg) {
                return !listener.tx.is_closed();
            }
            match listener.tx.send(msg.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

/// Handle to a registered listener.
///
/// Deregistration is idempotent and happens automatically on drop, so
/// every exit path of the owner releases the listener.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<PrivateMessage>,
    registry: Weak<Mutex<Registry>>,
    active: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl Subscription {
    /// Listener identifier
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true until [`Subscription::unsubscribe`] is called
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Wait for the next matching message.
    ///
    /// Returns `None` once unsubscribed (after draining anything already
    /// queued) or when the relay has gone away.
    pub async fn recv(&mut self) -> Option<PrivateMessage> {
        self.rx.recv().await
    }

    /// Remove the listener from its registry. Safe to call repeatedly.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.rx.close();
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.remove(&self.id);
            tracing::trace!("Listener {} deregistered", self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(target: &str, text: &str) -> PrivateMessage {
        PrivateMessage::new(target, "SearchBot", text)
    }

    #[tokio::test]
    async fn test_dispatch_to_matching_listener() {
        let dispatcher = Dispatcher::new();
        let mut sub = dispatcher.subscribe(|m| m.is_addressed_to("me"));

        assert_eq!(dispatcher.dispatch(&msg("me", "hello")), 1);
        assert_eq!(dispatcher.dispatch(&msg("someone", "hello")), 0);

        assert_eq!(sub.recv().await.unwrap().text, "hello");
    }

    #[tokio::test]
    async fn test_multiple_listeners() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.subscribe(|_| true);
        let mut b = dispatcher.subscribe(|m| m.text.starts_with("DCC"));

        assert_eq!(dispatcher.dispatch(&msg("me", "DCC SEND x 1 2 3")), 2);
        assert_eq!(dispatcher.dispatch(&msg("me", "hi")), 1);

        assert_eq!(a.recv().await.unwrap().text, "DCC SEND x 1 2 3");
        assert_eq!(a.recv().await.unwrap().text, "hi");
        assert_eq!(b.recv().await.unwrap().text, "DCC SEND x 1 2 3");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let mut sub = dispatcher.subscribe(|_| true);
        assert_eq!(dispatcher.listener_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(dispatcher.listener_count(), 0);
        assert_eq!(dispatcher.dispatch(&msg("me", "late")), 0);
    }

    #[test]
    fn test_drop_deregisters() {
        let dispatcher = Dispatcher::new();
        {
            let _sub = dispatcher.subscribe(|_| true);
            assert_eq!(dispatcher.listener_count(), 1);
        }
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_dispatcher() {
        let dispatcher = Dispatcher::new();
        let mut sub = dispatcher.subscribe(|_| true);
        drop(dispatcher);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn test_recv_drains_then_ends_after_unsubscribe() {
        let dispatcher = Dispatcher::new();
        let mut sub = dispatcher.subscribe(|_| true);
        dispatcher.dispatch(&msg("me", "queued"));
        sub.unsubscribe();

        assert_eq!(sub.recv().await.unwrap().text, "queued");
        assert!(sub.recv().await.is_none());
    }
}
