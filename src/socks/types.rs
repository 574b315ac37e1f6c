//! SOCKS5 type definitions
//!
//! Defines the core types used in SOCKS5 protocol handling: commands,
//! address types and the type-tagged target address shared by requests,
//! replies and UDP relay headers.

use super::consts::*;
use crate::error::Socks5Error;
use bytes::BufMut;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use tokio::io::{AsyncRead, AsyncReadExt};

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - recognized but not supported
    Bind,
    /// UDP ASSOCIATE - establish UDP relay
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// ATYP values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    /// 4-byte IPv4 address
    Ipv4,
    /// Length-prefixed domain name
    Domain,
    /// 16-byte IPv6 address
    Ipv6,
}

impl AddressType {
    /// Parse an ATYP byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_ADDR_TYPE_IPV4 => Some(AddressType::Ipv4),
            SOCKS5_ADDR_TYPE_DOMAIN => Some(AddressType::Domain),
            SOCKS5_ADDR_TYPE_IPV6 => Some(AddressType::Ipv6),
            _ => None,
        }
    }

    /// Convert to the ATYP byte
    pub fn to_byte(self) -> u8 {
        match self {
            AddressType::Ipv4 => SOCKS5_ADDR_TYPE_IPV4,
            AddressType::Domain => SOCKS5_ADDR_TYPE_DOMAIN,
            AddressType::Ipv6 => SOCKS5_ADDR_TYPE_IPV6,
        }
    }
}

impl TryFrom<u8> for AddressType {
    type Error = Socks5Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        AddressType::from_byte(byte).ok_or(Socks5Error::InvalidAddressType(byte))
    }
}

/// Target address for SOCKS5 requests and UDP relay headers
///
/// Represents the destination address as it appears on the wire.
/// Can be an IPv4 address, an IPv6 address or a domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetAddr {
    /// IPv4 address with port
    V4(SocketAddrV4),
    /// IPv6 address with port
    V6(SocketAddrV6),
    /// Domain name with port
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a new TargetAddr from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::V4(SocketAddrV4::new(ip, port))
    }

    /// Create a new TargetAddr from an IPv6 address and port
    pub fn ipv6(ip: Ipv6Addr, port: u16) -> Self {
        TargetAddr::V6(SocketAddrV6::new(ip, port, 0, 0))
    }

    /// Create a new TargetAddr from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        TargetAddr::Domain(domain.into(), port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::V4(addr) => addr.port(),
            TargetAddr::V6(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Get the address type
    pub fn addr_type(&self) -> AddressType {
        match self {
            TargetAddr::V4(_) => AddressType::Ipv4,
            TargetAddr::V6(_) => AddressType::Ipv6,
            TargetAddr::Domain(_, _) => AddressType::Domain,
        }
    }

    /// Number of bytes `write_to` produces, ATYP included
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            TargetAddr::V4(_) => IPV4_LEN,
            TargetAddr::V6(_) => IPV6_LEN,
            TargetAddr::Domain(domain, _) => 1 + domain.len().min(MAX_DOMAIN_LEN),
        } + PORT_LEN
    }

    /// Resolve the address to a SocketAddr
    ///
    /// For IP addresses, this returns immediately.
    /// For domain names, this performs DNS resolution and picks the first
    /// address returned.
    pub async fn resolve(&self) -> io::Result<SocketAddr> {
        match self {
            TargetAddr::V4(addr) => Ok(SocketAddr::V4(*addr)),
            TargetAddr::V6(addr) => Ok(SocketAddr::V6(*addr)),
            TargetAddr::Domain(domain, port) => tokio::net::lookup_host((domain.as_str(), *port))
                .await?
                .next()
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("No addresses found for domain: {}", domain),
                    )
                }),
        }
    }

    /// Append `ATYP | ADDR | PORT` to `buf`
    ///
    /// Domain names longer than 255 bytes are cut at 255; the length prefix
    /// is a single byte.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        match self {
            TargetAddr::V4(addr) => {
                buf.put_u8(SOCKS5_ADDR_TYPE_IPV4);
                buf.put_slice(&addr.ip().octets());
                buf.put_u16(addr.port());
            }
            TargetAddr::V6(addr) => {
                buf.put_u8(SOCKS5_ADDR_TYPE_IPV6);
                buf.put_slice(&addr.ip().octets());
                buf.put_u16(addr.port());
            }
            TargetAddr::Domain(domain, port) => {
                let name = &domain.as_bytes()[..domain.len().min(MAX_DOMAIN_LEN)];
                buf.put_u8(SOCKS5_ADDR_TYPE_DOMAIN);
                buf.put_u8(name.len() as u8);
                buf.put_slice(name);
                buf.put_u16(*port);
            }
        }
    }

    /// Serialize the address to bytes for SOCKS5 protocol
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut bytes);
        bytes
    }

    /// Decode `ADDR | PORT` for an already-read ATYP from a byte slice
    ///
    /// Returns the address and the number of bytes consumed. The slice length
    /// is checked against what the address type requires before any slicing.
    pub fn decode(addr_type: AddressType, buf: &[u8]) -> Result<(Self, usize), Socks5Error> {
        match addr_type {
            AddressType::Ipv4 => {
                let needed = IPV4_LEN + PORT_LEN;
                if buf.len() < needed {
                    return Err(truncated("IPv4 address", needed, buf.len()));
                }
                let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
                let port = u16::from_be_bytes([buf[4], buf[5]]);
                Ok((TargetAddr::ipv4(ip, port), needed))
            }
            AddressType::Domain => {
                if buf.is_empty() {
                    return Err(truncated("domain length", 1, 0));
                }
                let len = buf[0] as usize;
                let needed = 1 + len + PORT_LEN;
                if buf.len() < needed {
                    return Err(truncated("domain name", needed, buf.len()));
                }
                let domain = domain_from_bytes(buf[1..1 + len].to_vec())?;
                let port = u16::from_be_bytes([buf[1 + len], buf[2 + len]]);
                Ok((TargetAddr::Domain(domain, port), needed))
            }
            AddressType::Ipv6 => {
                let needed = IPV6_LEN + PORT_LEN;
                if buf.len() < needed {
                    return Err(truncated("IPv6 address", needed, buf.len()));
                }
                let mut octets = [0u8; IPV6_LEN];
                octets.copy_from_slice(&buf[..IPV6_LEN]);
                let port = u16::from_be_bytes([buf[IPV6_LEN], buf[IPV6_LEN + 1]]);
                Ok((TargetAddr::ipv6(Ipv6Addr::from(octets), port), needed))
            }
        }
    }

    /// Read `ADDR | PORT` for an already-read ATYP from a stream
    pub async fn read_from<S>(stream: &mut S, addr_type: AddressType) -> Result<Self, Socks5Error>
    where
        S: AsyncRead + Unpin,
    {
        let addr = match addr_type {
            AddressType::Ipv4 => {
                let mut octets = [0u8; IPV4_LEN];
                stream.read_exact(&mut octets).await?;
                let port = stream.read_u16().await?;
                TargetAddr::ipv4(Ipv4Addr::from(octets), port)
            }
            AddressType::Domain => {
                let len = stream.read_u8().await? as usize;
                let mut name = vec![0u8; len];
                stream.read_exact(&mut name).await?;
                let port = stream.read_u16().await?;
                TargetAddr::Domain(domain_from_bytes(name)?, port)
            }
            AddressType::Ipv6 => {
                let mut octets = [0u8; IPV6_LEN];
                stream.read_exact(&mut octets).await?;
                let port = stream.read_u16().await?;
                TargetAddr::ipv6(Ipv6Addr::from(octets), port)
            }
        };
        Ok(addr)
    }
}

fn domain_from_bytes(bytes: Vec<u8>) -> Result<String, Socks5Error> {
    String::from_utf8(bytes)
        .map_err(|e| Socks5Error::InvalidDomain(String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

fn truncated(what: &str, needed: usize, got: usize) -> Socks5Error {
    Socks5Error::BadDatagram(format!("{} needs {} bytes, got {}", what, needed, got))
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::V4(addr) => write!(f, "{}", addr),
            TargetAddr::V6(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for TargetAddr {
    /// IPv4-mapped IPv6 addresses are folded back to IPv4.
    fn from(addr: SocketAddr) -> Self {
        match addr.ip().to_canonical() {
            IpAddr::V4(ip) => TargetAddr::ipv4(ip, addr.port()),
            IpAddr::V6(ip) => TargetAddr::ipv6(ip, addr.port()),
        }
    }
}

impl Default for TargetAddr {
    fn default() -> Self {
        TargetAddr::ipv4(Ipv4Addr::UNSPECIFIED, 0)
    }
}
