//! `DCC SEND` handshake codec.
//!
//! A bot offering a file sends a CTCP private message of the form
//!
//! ```text
//! \x01DCC SEND "Charles Dickens - Oliver Twist.epub" 2919211093 6634 468095\x01
//! ```
//!
//! where the three trailing fields are the peer IPv4 address as a
//! big-endian 32-bit decimal, the TCP port, and the exact byte size of the
//! file. Filenames without spaces may be sent unquoted.

use crate::error::HandshakeError;
use crate::{CTCP_DELIM, DCC_SEND_PREFIX};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// A parsed `DCC SEND` offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccSend {
    /// Advertised filename, quotes removed
    pub filename: String,
    /// Peer address
    pub addr: Ipv4Addr,
    /// Peer port
    pub port: u16,
    /// Exact number of bytes the peer will send
    pub size: u64,
}

impl DccSend {
    /// Parse the payload that follows `DCC SEND `.
    ///
    /// A trailing CTCP delimiter is tolerated and stripped.
    ///
    /// # Errors
    ///
    /// Returns a [`HandshakeError`] describing the first malformed part.
    /// Never panics, whatever the input.
    pub fn parse(payload: &str) -> Result<Self, HandshakeError> {
        let msg = payload.trim().trim_end_matches(CTCP_DELIM).trim();
        if msg.is_empty() {
            return Err(HandshakeError::Empty);
        }

        let (filename, rest) = if let Some(quoted) = msg.strip_prefix('"') {
            let end = quoted.find('"').ok_or(HandshakeError::UnterminatedQuote)?;
            (&quoted[..end], quoted[end + 1..].trim())
        } else {
            msg.split_once(char::is_whitespace)
                .map(|(name, rest)| (name, rest.trim()))
                .ok_or(HandshakeError::MissingParameters)?
        };

        if rest.is_empty() {
            return Err(HandshakeError::MissingParameters);
        }

        let fields: Vec<&str> = rest.split_whitespace().collect();
        let [ip, port, size] = fields[..] else {
            return Err(HandshakeError::ParameterCount {
                found: fields.len(),
            });
        };

        let ip: u32 = parse_field("ip", ip)?;
        let port: u16 = parse_field("port", port)?;
        let size: u64 = parse_field("size", size)?;

        Ok(Self {
            filename: filename.to_string(),
            addr: decode_ipv4(ip),
            port,
            size,
        })
    }

    /// Peer socket address to connect to
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.addr, self.port)
    }

    /// Render this offer as a complete CTCP message.
    ///
    /// The filename is always quoted; it must not itself contain `"`.
    #[must_use]
    pub fn to_ctcp(&self) -> String {
        format!("{CTCP_DELIM}{DCC_SEND_PREFIX}{self}{CTCP_DELIM}")
    }
}

impl fmt::Display for DccSend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" {} {} {}",
            self.filename,
            encode_ipv4(self.addr),
            self.port,
            self.size
        )
    }
}

/// Extract the handshake payload from a CTCP message.
///
/// Returns `None` when `text` is not a `DCC SEND` request. The leading CTCP
/// delimiter is optional.
#[must_use]
pub fn parse_ctcp(text: &str) -> Option<&str> {
    let text = text.strip_prefix(CTCP_DELIM).unwrap_or(text);
    text.strip_prefix(DCC_SEND_PREFIX)
}

/// Decode a DCC address field (network byte order)
#[must_use]
pub fn decode_ipv4(raw: u32) -> Ipv4Addr {
    Ipv4Addr::from(raw.to_be_bytes())
}

/// Encode an address as a DCC address field (network byte order)
#[must_use]
pub fn encode_ipv4(addr: Ipv4Addr) -> u32 {
    u32::from_be_bytes(addr.octets())
}

fn parse_field<T: std::str::FromStr>(
    field: &'static str,
    value: &str,
) -> Result<T, HandshakeError> {
    value.parse().map_err(|_| HandshakeError::InvalidField {
        field,
        value: value.to_string(),
    })
}
