//! Bounded DCC transfer receiver.
//!
//! Connects to the peer advertised by a [`DccSend`], reads exactly the
//! declared number of bytes and optionally unwraps a ZIP container.

use crate::error::TransferError;
use crate::send::DccSend;
use crate::{CONTAINER_EXTENSION, DEFAULT_CONNECT_TIMEOUT};
use std::io::{Cursor, Read};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;

/// Upper bound on the buffer reserved before any data arrives
const MAX_PREALLOCATION: u64 = 4 * 1024 * 1024;

/// What to do with a received container file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unwrap {
    /// Replace a `.zip` payload with its first entry
    Container,
    /// Return bytes exactly as received
    Raw,
}

/// DCC transfer receiver
#[derive(Debug, Clone, Copy)]
pub struct Receiver {
    connect_timeout: Duration,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Receiver {
    /// Create a receiver with the given connect timeout
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Connect timeout in use
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Receive the file advertised by `send`.
    ///
    /// Reads at most `send.size` bytes; the connection is dropped once the
    /// read finishes, successfully or not.
    ///
    /// # Errors
    ///
    /// - [`TransferError::ConnectFailed`] / [`TransferError::ConnectTimeout`]
    ///   if the peer cannot be reached
    /// - [`TransferError::ShortRead`] if the peer closes early
    /// - [`TransferError::Container`] if unwrapping was requested and the
    ///   ZIP is unreadable or empty
    pub async fn receive(&self, send: &DccSend, unwrap: Unwrap) -> Result<Vec<u8>, TransferError> {
        let addr = send.socket_addr();
        tracing::debug!(
            "Receiving {:?} ({} bytes) from {}",
            send.filename,
            send.size,
            addr
        );

        let stream = time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransferError::ConnectTimeout { addr })?
            .map_err(|source| TransferError::ConnectFailed { addr, source })?;

        let data = read_exact_size(stream, send.size).await?;

        if unwrap == Unwrap::Container && is_container(&send.filename) {
            tracing::debug!("Unwrapping container {:?}", send.filename);
            return tokio::task::spawn_blocking(move || unzip_first_entry(&data))
                .await
                .map_err(|e| TransferError::Container(format!("extraction task failed: {e}")))?;
        }

        Ok(data)
    }
}

async fn read_exact_size(stream: TcpStream, size: u64) -> Result<Vec<u8>, TransferError> {
    let mut data = Vec::with_capacity(size.min(MAX_PREALLOCATION) as usize);
    let mut limited = stream.take(size);
    limited.read_to_end(&mut data).await?;

    let received = data.len() as u64;
    if received < size {
        return Err(TransferError::ShortRead {
            expected: size,
            received,
        });
    }
    Ok(data)
}

fn is_container(filename: &str) -> bool {
    filename
        .to_ascii_lowercase()
        .ends_with(&format!(".{CONTAINER_EXTENSION}"))
}

/// Decompress the first entry of a ZIP archive.
///
/// # Errors
///
/// Returns [`TransferError::Container`] if the archive cannot be parsed,
/// has no entries, or its first entry cannot be read.
pub fn unzip_first_entry(data: &[u8]) -> Result<Vec<u8>, TransferError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| TransferError::Container(format!("failed to open zip: {e}")))?;
    if archive.is_empty() {
        return Err(TransferError::Container("zip file is empty".to_string()));
    }

    let mut entry = archive
        .by_index(0)
        .map_err(|e| TransferError::Container(format!("failed to open file in zip: {e}")))?;
    let mut content = Vec::with_capacity(entry.size().min(MAX_PREALLOCATION) as usize);
    entry
        .read_to_end(&mut content)
        .map_err(|e| TransferError::Container(format!("failed to read file in zip: {e}")))?;
    Ok(content)
}
