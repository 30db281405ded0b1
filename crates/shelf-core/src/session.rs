//! Single-flight client session.
//!
//! A [`Session`] owns at most one relay connection. Every public operation
//! holds the session lock for its whole duration, so a second search
//! queued behind a running one waits for it to finish.

use crate::JOIN_TIMEOUT;
use crate::error::{Error, Result};
use crate::negotiate::{self, SearchOutcome, Timeouts};
use crate::results::SearchResult;
use rand::Rng;
use shelf_relay::{Connector, Endpoint, Relay, RelayError, RelayEvent};
use tokio::sync::{Mutex, broadcast};
use tokio::time;

/// Nickname prefix used by [`default_nick`]
pub const NICK_PREFIX: &str = "bookseeker_";

/// Pick a nickname of the form `bookseeker_<nnn>`
#[must_use]
pub fn default_nick() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(100..1000);
    format!("{NICK_PREFIX}{suffix}")
}

struct State<R> {
    relay: Option<R>,
    nick: String,
}

/// Client session against one relay endpoint
pub struct Session<C: Connector> {
    endpoint: Endpoint,
    connector: C,
    timeouts: Timeouts,
    state: Mutex<State<C::Relay>>,
}

impl<C: Connector> Session<C> {
    /// Create a disconnected session
    pub fn new(endpoint: Endpoint, nick: impl Into<String>, connector: C) -> Self {
        Self {
            endpoint,
            connector,
            timeouts: Timeouts::default(),
            state: Mutex::new(State {
                relay: None,
                nick: nick.into(),
            }),
        }
    }

    /// Replace the negotiation timers
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Endpoint this session connects to
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Timers in use
    #[must_use]
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Current nickname. After [`Session::connect`] this is the nickname
    /// the relay accepted.
    pub async fn nick(&self) -> String {
        self.state.lock().await.nick.clone()
    }

    /// Returns true while a relay connection is held
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.relay.is_some()
    }

    /// Connect and join the configured channel.
    ///
    /// Does nothing if already connected.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint is invalid; nothing is sent
    /// - [`Error::Connect`] if the relay refuses or cannot be reached
    /// - [`Error::Timeout`] if the join is not confirmed in time
    ///
    /// No connection is kept on failure.
    pub async fn connect(&self) -> Result<()> {
        self.endpoint
            .validate()
            .map_err(|e| Error::Config(e.to_string().into()))?;

        let mut state = self.state.lock().await;
        if state.relay.is_some() {
            return Ok(());
        }

        tracing::info!("Connecting to {} as {}", self.endpoint, state.nick);
        let relay = match time::timeout(JOIN_TIMEOUT, self.establish(&state.nick)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout(
                    format!("waiting to join channel {}", self.endpoint.channel()).into(),
                ));
            }
        };

        state.nick = relay.nick();
        state.relay = Some(relay);
        tracing::info!("Joined {} as {}", self.endpoint.channel(), state.nick);
        Ok(())
    }

    async fn establish(&self, nick: &str) -> Result<C::Relay> {
        let relay = self
            .connector
            .connect(&self.endpoint, nick)
            .await
            .map_err(Error::Connect)?;
        let mut events = relay.events();
        if let Err(e) = relay.join(self.endpoint.channel()).await {
            relay.close().await;
            return Err(Error::Relay(e));
        }

        match wait_for_join(&mut events, self.endpoint.channel(), &relay.nick()).await {
            Ok(()) => Ok(relay),
            Err(e) => {
                relay.close().await;
                Err(e)
            }
        }
    }

    /// Leave the relay. Idempotent.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(relay) = state.relay.take() {
            relay.close().await;
            tracing::info!("Disconnected from {}", self.endpoint);
        }
    }

    /// Search the channel for `query`.
    ///
    /// See [`negotiate::search`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] before [`Session::connect`].
    pub async fn search(&self, query: &str, extensions: &[String]) -> Result<SearchOutcome> {
        self.search_with_progress(query, extensions, |_| {}).await
    }

    /// Search, reporting the running result count as results arrive
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] before [`Session::connect`].
    pub async fn search_with_progress<P>(
        &self,
        query: &str,
        extensions: &[String],
        progress: P,
    ) -> Result<SearchOutcome>
    where
        P: FnMut(usize) + Send,
    {
        let state = self.state.lock().await;
        let relay = state.relay.as_ref().ok_or(Error::NotConnected)?;
        negotiate::search(
            relay,
            self.endpoint.channel(),
            query,
            extensions,
            &self.timeouts,
            progress,
        )
        .await
    }

    /// Download the file behind `result`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] before [`Session::connect`], and
    /// otherwise the errors of [`negotiate::download`].
    pub async fn download(&self, result: &SearchResult) -> Result<Vec<u8>> {
        let state = self.state.lock().await;
        let relay = state.relay.as_ref().ok_or(Error::NotConnected)?;
        negotiate::download(relay, self.endpoint.channel(), result, &self.timeouts).await
    }
}

async fn wait_for_join(
    events: &mut broadcast::Receiver<RelayEvent>,
    channel: &str,
    nick: &str,
) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(RelayEvent::Joined {
                channel: joined,
                nick: who,
            }) if joined.eq_ignore_ascii_case(channel) && who.eq_ignore_ascii_case(nick) => {
                return Ok(());
            }
            Ok(RelayEvent::Error(message)) => {
                return Err(Error::Connect(RelayError::Registration(message)));
            }
            Ok(RelayEvent::Disconnected) | Err(broadcast::error::RecvError::Closed) => {
                return Err(Error::Connect(RelayError::Closed));
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Lagged {} relay events while joining", skipped);
            }
        }
    }
}
