//! Search and download negotiation.
//!
//! Both exchanges follow the same shape: subscribe to DCC offers addressed
//! to our nick, send a command to the channel, then race incoming transfer
//! outcomes against timers.
//!
//! ```text
//!  relay reader ──▶ Subscription ──▶ select! loop ──jobs──▶ worker task
//!                                        ▲                     │
//!                                        └──────outcomes───────┘
//!                                   (DccSend::parse + Receiver::receive)
//! ```
//!
//! Transfers never run on the relay's reader task. The select loop owns
//! the subscription and forwards matching messages to a worker that
//! performs transfers one at a time; dropping the job queue stops the
//! worker after its current transfer, whose outcome is then discarded.

use crate::SEARCH_COMMAND;
use crate::error::{Error, Result};
use crate::results::{SearchResult, filter_by_extension, parse_listing};
use shelf_dcc::{DEFAULT_CONNECT_TIMEOUT, DccSend, Receiver, Unwrap, parse_ctcp};
use shelf_relay::{PrivateMessage, Relay, Subscription};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

/// Default quiet period ending a search once results arrived (5 seconds)
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(5);

/// Default absolute search deadline (30 seconds)
pub const DEFAULT_SEARCH_DEADLINE: Duration = Duration::from_secs(30);

/// Default absolute download deadline (60 seconds)
pub const DEFAULT_DOWNLOAD_DEADLINE: Duration = Duration::from_secs(60);

/// Timer policy for negotiations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Silence after the last accepted result that ends a search early
    pub quiet_period: Duration,
    /// Absolute bound on a search
    pub search_deadline: Duration,
    /// Absolute bound on a download
    pub download_deadline: Duration,
    /// Bound on opening each transfer connection
    pub connect_timeout: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            search_deadline: DEFAULT_SEARCH_DEADLINE,
            download_deadline: DEFAULT_DOWNLOAD_DEADLINE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStop {
    /// Results arrived and then the quiet period elapsed
    EarlyStop,
    /// The absolute deadline fired
    Deadline,
}

/// Results of a finished search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Accepted results in arrival order
    pub results: Vec<SearchResult>,
    /// Which timer ended the search
    pub stop: SearchStop,
    /// Time from sending the query to returning
    pub elapsed: Duration,
}

impl SearchOutcome {
    /// Returns true if no results were found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Take the results
    #[must_use]
    pub fn into_results(self) -> Vec<SearchResult> {
        self.results
    }
}

/// Send `@search <query>` to `channel` and collect listings.
///
/// Every listing offered to us is received with container unwrapping,
/// parsed and filtered by `extensions`. A non-empty batch is appended to
/// the results, reported through `progress` with the running total, and
/// restarts the quiet period. Offers that fail to parse or transfer are
/// logged and dropped; they never restart the quiet period.
///
/// # Errors
///
/// Returns [`Error::Config`] for a blank query and [`Error::Relay`] if the
/// query cannot be sent. Finding nothing is not an error.
pub async fn search<R, P>(
    relay: &R,
    channel: &str,
    query: &str,
    extensions: &[String],
    timeouts: &Timeouts,
    mut progress: P,
) -> Result<SearchOutcome>
where
    R: Relay,
    P: FnMut(usize) + Send,
{
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::Config("search query is empty".into()));
    }

    let mut sub = subscribe_offers(relay);
    let connect_timeout = timeouts.connect_timeout;
    let extensions = extensions.to_vec();
    let (jobs, mut outcomes) = spawn_worker(move |msg: PrivateMessage| {
        let extensions = extensions.clone();
        async move {
            let listing = fetch(&msg, connect_timeout, Unwrap::Container).await?;
            Ok(filter_by_extension(parse_listing(&listing), &extensions))
        }
    });

    relay
        .send_message(channel, &format!("{SEARCH_COMMAND} {query}"))
        .await?;
    tracing::info!("Searching {} for {:?}", channel, query);

    let started = Instant::now();
    let deadline = time::sleep(timeouts.search_deadline);
    let quiet = time::sleep(timeouts.quiet_period);
    tokio::pin!(deadline, quiet);

    let mut results: Vec<SearchResult> = Vec::new();
    let mut listening = true;
    let stop = loop {
        tokio::select! {
            msg = sub.recv(), if listening => match msg {
                Some(msg) => {
                    tracing::debug!("Offer from {}", msg.sender);
                    let _ = jobs.send(msg);
                }
                None => listening = false,
            },
            Some(outcome) = outcomes.recv() => match outcome {
                Ok(batch) if !batch.is_empty() => {
                    tracing::debug!("Accepted {} results", batch.len());
                    results.extend(batch);
                    progress(results.len());
                    quiet.as_mut().reset(Instant::now() + timeouts.quiet_period);
                }
                Ok(_) => tracing::debug!("Listing had no matching entries"),
                Err(e) => tracing::warn!("Dropping search response: {}", e),
            },
            () = &mut quiet, if !results.is_empty() => break SearchStop::EarlyStop,
            () = &mut deadline => break SearchStop::Deadline,
        }
    };
    sub.unsubscribe();

    let elapsed = started.elapsed();
    tracing::info!(
        "Search finished with {} results after {:?} ({:?})",
        results.len(),
        elapsed,
        stop
    );
    Ok(SearchOutcome {
        results,
        stop,
        elapsed,
    })
}

/// Replay `result`'s command to `channel` and receive the file.
///
/// The first offer addressed to us decides the outcome. Bytes are returned
/// as received, containers included.
///
/// # Errors
///
/// - [`Error::Parse`] or [`Error::Transfer`] if the offer is bad
/// - [`Error::Timeout`] if nothing arrives within the download deadline
/// - [`Error::Relay`] if the command cannot be sent
pub async fn download<R: Relay>(
    relay: &R,
    channel: &str,
    result: &SearchResult,
    timeouts: &Timeouts,
) -> Result<Vec<u8>> {
    let mut sub = subscribe_offers(relay);
    let connect_timeout = timeouts.connect_timeout;
    let (jobs, mut outcomes) = spawn_worker(move |msg: PrivateMessage| async move {
        fetch(&msg, connect_timeout, Unwrap::Raw).await
    });

    relay
        .send_message(channel, result.replay_command())
        .await?;
    tracing::info!("Requested {:?} from {}", result.filename, channel);

    let deadline = time::sleep(timeouts.download_deadline);
    tokio::pin!(deadline);

    let mut listening = true;
    let outcome = loop {
        tokio::select! {
            msg = sub.recv(), if listening => match msg {
                Some(msg) => {
                    tracing::debug!("Offer from {}", msg.sender);
                    let _ = jobs.send(msg);
                }
                None => listening = false,
            },
            Some(outcome) = outcomes.recv() => break outcome,
            () = &mut deadline => {
                break Err(Error::Timeout(
                    format!("waiting for {:?}", result.filename).into(),
                ));
            }
        }
    };
    sub.unsubscribe();

    match &outcome {
        Ok(bytes) => tracing::info!("Downloaded {:?} ({} bytes)", result.filename, bytes.len()),
        Err(e) => tracing::warn!("Download of {:?} failed: {}", result.filename, e),
    }
    outcome
}

/// Listen for DCC SEND offers addressed to the relay's current nick
fn subscribe_offers<R: Relay>(relay: &R) -> Subscription {
    let nick = relay.nick();
    relay.subscribe(move |m| m.is_addressed_to(&nick) && parse_ctcp(&m.text).is_some())
}

/// Parse the offer in `msg` and receive its payload
async fn fetch(msg: &PrivateMessage, connect_timeout: Duration, unwrap: Unwrap) -> Result<Vec<u8>> {
    let send = DccSend::parse(parse_ctcp(&msg.text).unwrap_or_default())?;
    tracing::debug!(
        "{} offers {:?} ({} bytes) at {}",
        msg.sender,
        send.filename,
        send.size,
        send.socket_addr()
    );
    Ok(Receiver::new(connect_timeout).receive(&send, unwrap).await?)
}

/// Run `handler` over queued messages, one at a time, on its own task.
///
/// The worker exits when the job sender is dropped or the outcome receiver
/// goes away.
fn spawn_worker<T, F, Fut>(
    mut handler: F,
) -> (
    mpsc::UnboundedSender<PrivateMessage>,
    mpsc::UnboundedReceiver<Result<T>>,
)
where
    T: Send + 'static,
    F: FnMut(PrivateMessage) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let (job_tx, mut job_rx) = mpsc::unbounded_channel::<PrivateMessage>();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(msg) = job_rx.recv().await {
            let outcome = handler(msg).await;
            if outcome_tx.send(outcome).is_err() {
                tracing::debug!("Discarding transfer outcome after negotiation ended");
                break;
            }
        }
    });
    (job_tx, outcome_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_dcc::TransferError;
    use shelf_relay::loopback::{LoopbackNetwork, LoopbackRelay};
    use shelf_relay::{Connector, Endpoint};
    use std::io::{Cursor, Write};
    use std::net::Ipv4Addr;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    const CHANNEL: &str = "#ebooks";

    fn fast() -> Timeouts {
        Timeouts {
            quiet_period: Duration::from_millis(200),
            search_deadline: Duration::from_secs(5),
            download_deadline: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    async fn connect(network: &LoopbackNetwork) -> LoopbackRelay {
        network
            .connect(&Endpoint::new("loopback", None, CHANNEL), "seeker")
            .await
            .unwrap()
    }

    fn zipped(name: &str, body: &[u8]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
        writer.finish().unwrap().into_inner()
    }

    /// Serve `payload` once on localhost and return the CTCP offer for it
    async fn offer(filename: &str, payload: Vec<u8>, declared: u64) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = stream.write_all(&payload).await;
            }
        });
        DccSend {
            filename: filename.to_string(),
            addr: Ipv4Addr::LOCALHOST,
            port,
            size: declared,
        }
        .to_ctcp()
    }

    /// Bot that answers the first channel command with `texts`, in order,
    /// `gap` apart
    fn bot_replies(network: &LoopbackNetwork, texts: Vec<String>, gap: Duration) {
        let mut channel = network.channel_messages();
        let network = network.clone();
        tokio::spawn(async move {
            let Ok(request) = channel.recv().await else {
                return;
            };
            for text in texts {
                network.deliver(PrivateMessage::new(&request.sender, "SearchBot", text));
                time::sleep(gap).await;
            }
        });
    }

    #[tokio::test]
    async fn test_search_stops_after_quiet_period() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let listing = zipped(
            "results.txt",
            b"!send 1 \"A.epub\"\r\n!send 2 \"B.mobi\"\r\n!send 3 \"C.epub\"\r\n",
        );
        let size = listing.len() as u64;
        bot_replies(
            &network,
            vec![offer("SearchBot_results.zip", listing, size).await],
            Duration::ZERO,
        );

        let mut seen = Vec::new();
        let outcome = search(
            &relay,
            CHANNEL,
            "dickens",
            &["epub".to_string()],
            &fast(),
            |n| seen.push(n),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stop, SearchStop::EarlyStop);
        assert!(outcome.elapsed < Duration::from_secs(3));
        let names: Vec<_> = outcome.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["A.epub", "C.epub"]);
        assert_eq!(seen, vec![2]);
        assert_eq!(network.listener_count("seeker"), 0);
    }

    #[tokio::test]
    async fn test_search_sends_query_command() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let mut channel = network.channel_messages();
        let timeouts = Timeouts {
            search_deadline: Duration::from_millis(100),
            ..fast()
        };

        search(&relay, CHANNEL, "  oliver twist ", &[], &timeouts, |_| {})
            .await
            .unwrap();
        let sent = channel.recv().await.unwrap();
        assert_eq!(sent.target, CHANNEL);
        assert_eq!(sent.text, "@search oliver twist");
    }

    #[tokio::test]
    async fn test_search_empty_at_deadline() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let timeouts = Timeouts {
            search_deadline: Duration::from_millis(300),
            ..fast()
        };

        let outcome = search(&relay, CHANNEL, "nothing", &[], &timeouts, |_| {})
            .await
            .unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.stop, SearchStop::Deadline);
        assert!(outcome.elapsed >= Duration::from_millis(300));
        assert_eq!(network.listener_count("seeker"), 0);
    }

    #[tokio::test]
    async fn test_search_junk_does_not_extend() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let listing = zipped("results.txt", b"!send 1 \"A.epub\"\n");
        let size = listing.len() as u64;

        let mut replies = vec![offer("results.zip", listing, size).await];
        replies.extend((0..40).map(|_| "\x01DCC SEND \"broken\x01".to_string()));
        bot_replies(&network, replies, Duration::from_millis(25));

        let timeouts = Timeouts {
            search_deadline: Duration::from_secs(10),
            ..fast()
        };
        let outcome = search(&relay, CHANNEL, "a", &[], &timeouts, |_| {})
            .await
            .unwrap();
        assert_eq!(outcome.stop, SearchStop::EarlyStop);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_search_ignores_failed_transfers() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let good = zipped("results.txt", b"!send 9 \"Z.epub\"\n");
        let good_size = good.len() as u64;
        bot_replies(
            &network,
            vec![
                offer("short.zip", b"PK".to_vec(), 100).await,
                offer("bad.zip", b"not a zip".to_vec(), 9).await,
                "hello there".to_string(),
                offer("good.zip", good, good_size).await,
            ],
            Duration::from_millis(10),
        );

        let outcome = search(&relay, CHANNEL, "z", &[], &fast(), |_| {})
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].filename, "Z.epub");
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let err = search(&relay, CHANNEL, "   ", &[], &fast(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(network.listener_count("seeker"), 0);
    }

    #[tokio::test]
    async fn test_download_returns_raw_bytes() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let container = zipped("Moby Dick.epub", b"call me ishmael");
        let size = container.len() as u64;
        bot_replies(
            &network,
            vec![offer("Moby Dick.zip", container.clone(), size).await],
            Duration::ZERO,
        );
        let mut channel = network.channel_messages();

        let result = SearchResult::from_line("!xdcc send 12 \"Moby Dick.epub\"").unwrap();
        let bytes = download(&relay, CHANNEL, &result, &fast()).await.unwrap();
        assert_eq!(bytes, container);
        assert_eq!(
            channel.recv().await.unwrap().text,
            "!xdcc send 12 \"Moby Dick.epub\""
        );
        assert_eq!(network.listener_count("seeker"), 0);
    }

    #[tokio::test]
    async fn test_download_surfaces_transfer_error() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        bot_replies(
            &network,
            vec![offer("book.epub", b"only part".to_vec(), 1000).await],
            Duration::ZERO,
        );

        let result = SearchResult::from_line("!Bot book.epub").unwrap();
        let err = download(&relay, CHANNEL, &result, &fast())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer(TransferError::ShortRead {
                expected: 1000,
                received: 9
            })
        ));
        assert_eq!(network.listener_count("seeker"), 0);
    }

    #[tokio::test]
    async fn test_download_surfaces_parse_error() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        bot_replies(
            &network,
            vec!["\x01DCC SEND book.epub 1 2\x01".to_string()],
            Duration::ZERO,
        );

        let result = SearchResult::from_line("!Bot book.epub").unwrap();
        let err = download(&relay, CHANNEL, &result, &fast())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_download_timeout() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let timeouts = Timeouts {
            download_deadline: Duration::from_millis(200),
            ..fast()
        };

        let result = SearchResult::from_line("!Bot book.epub").unwrap();
        let err = download(&relay, CHANNEL, &result, &timeouts)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(network.listener_count("seeker"), 0);
    }

    #[tokio::test]
    async fn test_offers_for_other_nicks_ignored() {
        let network = LoopbackNetwork::new();
        let relay = connect(&network).await;
        let _other = network
            .connect(&Endpoint::new("loopback", None, CHANNEL), "other")
            .await
            .unwrap();
        let listing = zipped("results.txt", b"!send 1 \"A.epub\"\n");
        let size = listing.len() as u64;
        let text = offer("results.zip", listing, size).await;

        let mut channel = network.channel_messages();
        let bot = network.clone();
        tokio::spawn(async move {
            if channel.recv().await.is_ok() {
                bot.deliver(PrivateMessage::new("other", "SearchBot", text));
            }
        });

        let timeouts = Timeouts {
            search_deadline: Duration::from_millis(400),
            ..fast()
        };
        let outcome = search(&relay, CHANNEL, "a", &[], &timeouts, |_| {})
            .await
            .unwrap();
        assert!(outcome.is_empty());
    }
}
