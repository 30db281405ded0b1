//! IRC relay client.
//!
//! The connection is split into a reader task that parses lines, answers
//! `PING`s, tracks the negotiated nickname and dispatches private
//! messages, and a writer task fed by an unbounded channel.

use super::line::{IrcLine, sanitize};
use super::{CLOSE_GRACE, MAX_LINE_LENGTH};
use crate::{EVENT_CHANNEL_CAPACITY, RELAY_CONNECT_TIMEOUT};
use crate::client::{Connector, Relay};
use crate::dispatch::{Dispatcher, Subscription, lock};
use crate::endpoint::Endpoint;
use crate::error::RelayError;
use crate::event::{PrivateMessage, RelayEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;

/// Outbound queue item
#[derive(Debug)]
enum Outbound {
    /// Regular protocol line
    Line(String),
    /// Final line; the writer shuts the socket down after it
    Quit(String),
}

/// State shared between the relay handle and its reader task
struct Shared {
    nick: Mutex<String>,
    registered: Mutex<bool>,
    dispatcher: Dispatcher,
    events: broadcast::Sender<RelayEvent>,
}

/// Connector for plaintext IRC servers
#[derive(Debug, Clone, Copy)]
pub struct IrcConnector {
    connect_timeout: Duration,
}

impl Default for IrcConnector {
    fn default() -> Self {
        Self::new(RELAY_CONNECT_TIMEOUT)
    }
}

impl IrcConnector {
    /// Create a connector with the given TCP connect timeout
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for IrcConnector {
    type Relay = IrcRelay;

    async fn connect(&self, endpoint: &Endpoint, nick: &str) -> Result<IrcRelay, RelayError> {
        let addr = format!("{}:{}", endpoint.address(), endpoint.port());
        tracing::info!("Connecting to relay {}", addr);

        let stream = time::timeout(
            self.connect_timeout,
            TcpStream::connect((endpoint.address(), endpoint.port())),
        )
        .await
        .map_err(|_| RelayError::Timeout("connect"))?
        .map_err(|source| RelayError::Connect {
            addr: addr.clone(),
            source,
        })?;

        let (relay, events) = IrcRelay::start(stream, nick);
        relay.register(nick, events).await?;
        tracing::info!("Registered on {} as {}", addr, relay.nick());
        Ok(relay)
    }
}

/// Live IRC connection
pub struct IrcRelay {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl IrcRelay {
    /// Spawn reader and writer tasks over an established stream.
    ///
    /// The returned receiver is subscribed before the reader starts, so
    /// no registration outcome can be missed.
    fn start(stream: TcpStream, nick: &str) -> (Self, broadcast::Receiver<RelayEvent>) {
        let (events, first_events) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            nick: Mutex::new(nick.to_string()),
            registered: Mutex::new(false),
            dispatcher: Dispatcher::new(),
            events,
        });

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_loop(write_half, rx));
        let reader = tokio::spawn(read_loop(read_half, shared.clone(), tx.clone()));

        let relay = Self {
            shared,
            outbound: tx,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
        };
        (relay, first_events)
    }

    /// Send `NICK`/`USER` and wait for the welcome numeric
    async fn register(
        &self,
        nick: &str,
        mut events: broadcast::Receiver<RelayEvent>,
    ) -> Result<(), RelayError> {
        self.send_line(format!("NICK {nick}"))?;
        self.send_line(format!("USER {nick} 0 * :{nick}"))?;

        loop {
            match events.recv().await {
                Ok(RelayEvent::Connected { .. }) => return Ok(()),
                Ok(RelayEvent::Error(e)) => return Err(RelayError::Registration(e)),
                Ok(RelayEvent::Disconnected) => {
                    return Err(RelayError::Registration(
                        "connection closed during registration".to_string(),
                    ));
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(RelayError::Closed),
            }
        }
    }

    fn send_line(&self, line: String) -> Result<(), RelayError> {
        self.outbound
            .send(Outbound::Line(line))
            .map_err(|_| RelayError::Closed)
    }

    /// Number of registered message listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.shared.dispatcher.listener_count()
    }
}

impl Relay for IrcRelay {
    fn nick(&self) -> String {
        lock(&self.shared.nick).clone()
    }

    async fn join(&self, channel: &str) -> Result<(), RelayError> {
        tracing::debug!("Joining {}", channel);
        self.send_line(format!("JOIN {}", sanitize(channel)))
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<(), RelayError> {
        tracing::debug!("PRIVMSG {} :{}", target, text);
        self.send_line(format!("PRIVMSG {} :{}", sanitize(target), sanitize(text)))
    }

    fn subscribe<F>(&self, predicate: F) -> Subscription
    where
        F: Fn(&PrivateMessage) -> bool + Send + Sync + 'static,
    {
        self.shared.dispatcher.subscribe(predicate)
    }

    fn events(&self) -> broadcast::Receiver<RelayEvent> {
        self.shared.events.subscribe()
    }

    async fn close(&self) {
        let writer = lock(&self.writer).take();
        if let Some(writer) = writer {
            tracing::debug!("Closing relay connection");
            if self
                .outbound
                .send(Outbound::Quit("QUIT :Leaving".to_string()))
                .is_ok()
            {
                let _ = time::timeout(CLOSE_GRACE, writer).await;
            } else {
                writer.abort();
            }
        }
        let reader = lock(&self.reader).take();
        if let Some(reader) = reader {
            reader.abort();
        }
    }
}

impl Drop for IrcRelay {
    fn drop(&mut self) {
        for handle in [&self.reader, &self.writer] {
            if let Some(task) = lock(handle).take() {
                task.abort();
            }
        }
    }
}

async fn write_loop(mut write: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(item) = rx.recv().await {
        let (line, last) = match item {
            Outbound::Line(line) => (line, false),
            Outbound::Quit(line) => (line, true),
        };
        tracing::trace!(">> {}", line);
        if let Err(e) = write.write_all(format!("{line}\r\n").as_bytes()).await {
            tracing::warn!("Relay write error: {}", e);
            break;
        }
        if last {
            let _ = write.shutdown().await;
            break;
        }
    }
}

async fn read_loop(
    read: OwnedReadHalf,
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outbound>,
) {
    let mut reader = BufReader::new(read);
    let mut buf = Vec::with_capacity(512);
    // Set while skipping the tail of an overlong line
    let mut overflow = false;

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_LENGTH as u64);
        match limited.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Relay read error: {}", e);
                let _ = shared.events.send(RelayEvent::Error(e.to_string()));
                break;
            }
        }

        let complete = buf.ends_with(b"\n");
        if overflow {
            overflow = !complete;
            continue;
        }
        if !complete && buf.len() >= MAX_LINE_LENGTH {
            tracing::debug!("Truncating line longer than {} bytes", MAX_LINE_LENGTH);
            overflow = true;
        }

        let raw = String::from_utf8_lossy(&buf);
        tracing::trace!("<< {}", raw.trim_end());
        if let Some(line) = IrcLine::parse(&raw) {
            shared.handle(&line, &outbound);
        }
    }

    tracing::info!("Relay connection closed");
    let _ = shared.events.send(RelayEvent::Disconnected);
}

impl Shared {
    fn handle(&self, line: &IrcLine, outbound: &mpsc::UnboundedSender<Outbound>) {
        match line.command.as_str() {
            "PING" => {
                let token = line.trailing().unwrap_or_default();
                let _ = outbound.send(Outbound::Line(format!("PONG :{token}")));
            }
            "001" => {
                if let Some(nick) = line.param(0) {
                    *lock(&self.nick) = nick.to_string();
                }
                *lock(&self.registered) = true;
                let nick = lock(&self.nick).clone();
                let _ = self.events.send(RelayEvent::Connected { nick });
            }
            "433" => {
                if *lock(&self.registered) {
                    return;
                }
                let next = format!("{}_", lock(&self.nick));
                tracing::debug!("Nickname in use, retrying as {}", next);
                *lock(&self.nick) = next.clone();
                let _ = outbound.send(Outbound::Line(format!("NICK {next}")));
            }
            // Erroneous nick, banned, and the join failures
            "432" | "465" | "403" | "471" | "473" | "474" | "475" => {
                let reason = line.trailing().unwrap_or("request refused").to_string();
                let _ = self.events.send(RelayEvent::Error(reason));
            }
            "NICK" => {
                let mut nick = lock(&self.nick);
                if line.nick().is_some_and(|old| old.eq_ignore_ascii_case(&nick)) {
                    if let Some(new) = line.param(0) {
                        *nick = new.to_string();
                    }
                }
            }
            "JOIN" => {
                if let (Some(nick), Some(channel)) = (line.nick(), line.param(0)) {
                    let _ = self.events.send(RelayEvent::Joined {
                        channel: channel.to_string(),
                        nick: nick.to_string(),
                    });
                }
            }
            "PRIVMSG" => {
                if let (Some(sender), Some(target), Some(text)) =
                    (line.nick(), line.param(0), line.param(1))
                {
                    let msg = PrivateMessage::new(target, sender, text);
                    let delivered = self.dispatcher.dispatch(&msg);
                    tracing::trace!("PRIVMSG from {} delivered to {} listeners", sender, delivered);
                }
            }
            "ERROR" => {
                let reason = line.trailing().unwrap_or("unknown error").to_string();
                tracing::warn!("Relay error: {}", reason);
                let _ = self.events.send(RelayEvent::Error(reason));
            }
            _ => {}
        }
    }
}
