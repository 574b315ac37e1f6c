//! Error types for Socksrelay
//!
//! This module defines the SOCKS5 error taxonomy and the reply codes that
//! failures are reported with on the wire.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// SOCKS5 specific errors
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// Version byte was not 0x05
    #[error("Invalid SOCKS version: {0}")]
    InvalidVersion(u8),

    /// Client did not offer any method the server accepts
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Command byte outside CONNECT/BIND/UDP ASSOCIATE
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(u8),

    /// Reserved byte was not zero
    #[error("Invalid reserved field: {0}")]
    InvalidReservedField(u8),

    /// Address type byte outside IPv4/domain/IPv6
    #[error("Invalid address type: {0}")]
    InvalidAddressType(u8),

    /// Domain name bytes were not valid UTF-8
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// UDP datagram carried a non-zero FRAG field
    #[error("UDP fragmentation not supported (frag={0})")]
    UdpFragUnsupported(u8),

    /// Truncated or otherwise malformed UDP relay header
    #[error("Bad UDP datagram: {0}")]
    BadDatagram(String),

    /// UDP datagram from a source with no live association
    #[error("Unauthorized UDP client: {0}")]
    UnauthorizedClient(SocketAddr),

    /// Outbound connection attempt failed
    #[error("Failed to connect to {target}: {source}")]
    Dial {
        /// Target as requested by the client
        target: String,
        /// Reply code sent to the client
        reply: ReplyCode,
        /// Underlying transport error
        #[source]
        source: io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    ServerFailure = 0x01,
    /// Connection not allowed by ruleset
    RuleFailure = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddrTypeNotSupported = 0x08,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for ReplyCode {
    type Error = Socks5Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ReplyCode::Succeeded),
            0x01 => Ok(ReplyCode::ServerFailure),
            0x02 => Ok(ReplyCode::RuleFailure),
            0x03 => Ok(ReplyCode::NetworkUnreachable),
            0x04 => Ok(ReplyCode::HostUnreachable),
            0x05 => Ok(ReplyCode::ConnectionRefused),
            0x06 => Ok(ReplyCode::TtlExpired),
            0x07 => Ok(ReplyCode::CommandNotSupported),
            0x08 => Ok(ReplyCode::AddrTypeNotSupported),
            _ => Err(Socks5Error::BadDatagram(format!("unknown reply code {}", value))),
        }
    }
}

impl From<&io::Error> for ReplyCode {
    /// Classify a failed dial.
    ///
    /// Structured error kinds are checked first. Platforms that only surface
    /// an uncategorized error are matched on the message text, and anything
    /// left over is reported as host unreachable.
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ReplyCode::ConnectionRefused,
            io::ErrorKind::NetworkUnreachable => ReplyCode::NetworkUnreachable,
            io::ErrorKind::HostUnreachable => ReplyCode::HostUnreachable,
            _ => {
                let msg = err.to_string().to_ascii_lowercase();
                if msg.contains("refused") {
                    ReplyCode::ConnectionRefused
                } else if msg.contains("network is unreachable") {
                    ReplyCode::NetworkUnreachable
                } else {
                    ReplyCode::HostUnreachable
                }
            }
        }
    }
}
