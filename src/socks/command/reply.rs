//! SOCKS5 reply builder
//!
//! Constructs SOCKS5 reply messages.

use crate::error::{ReplyCode, Socks5Error};
use crate::socks::consts::*;
use bytes::{BufMut, BytesMut};
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Bound address carried in a reply
///
/// Either field may be set; `encode_reply` decides which one goes on the
/// wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddrSpec {
    /// IPv4 or IPv6 address
    pub ip: Option<IpAddr>,
    /// Fully qualified domain name, empty when unused
    pub fqdn: String,
    /// Port
    pub port: u16,
}

impl AddrSpec {
    /// Address spec carrying a domain name
    pub fn domain(fqdn: impl Into<String>, port: u16) -> Self {
        AddrSpec {
            ip: None,
            fqdn: fqdn.into(),
            port,
        }
    }
}

impl From<SocketAddr> for AddrSpec {
    fn from(addr: SocketAddr) -> Self {
        AddrSpec {
            ip: Some(addr.ip()),
            fqdn: String::new(),
            port: addr.port(),
        }
    }
}

/// Encode a SOCKS5 reply
///
/// # SOCKS5 Reply Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// Address order: IPv4 (IPv4-mapped IPv6 included), then a non-empty
/// domain, then IPv6, then 0.0.0.0 when nothing is supplied.
pub fn encode_reply(reply_code: ReplyCode, bind_addr: Option<&AddrSpec>) -> BytesMut {
    let default_spec = AddrSpec::default();
    let spec = bind_addr.unwrap_or(&default_spec);

    let mut reply = BytesMut::with_capacity(6 + 1 + MAX_DOMAIN_LEN);
    reply.put_u8(SOCKS5_VERSION);
    reply.put_u8(reply_code.into());
    reply.put_u8(SOCKS5_RESERVED);

    let ipv4 = spec.ip.and_then(|ip| match ip.to_canonical() {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    });

    match (ipv4, spec.ip) {
        (Some(v4), _) => {
            reply.put_u8(SOCKS5_ADDR_TYPE_IPV4);
            reply.put_slice(&v4.octets());
        }
        _ if !spec.fqdn.is_empty() => {
            let name = &spec.fqdn.as_bytes()[..spec.fqdn.len().min(MAX_DOMAIN_LEN)];
            reply.put_u8(SOCKS5_ADDR_TYPE_DOMAIN);
            reply.put_u8(name.len() as u8);
            reply.put_slice(name);
        }
        (None, Some(IpAddr::V6(v6))) => {
            reply.put_u8(SOCKS5_ADDR_TYPE_IPV6);
            reply.put_slice(&v6.octets());
        }
        _ => {
            reply.put_u8(SOCKS5_ADDR_TYPE_IPV4);
            reply.put_slice(&[0, 0, 0, 0]);
        }
    }

    reply.put_u16(spec.port);
    reply
}

/// Build and send a SOCKS5 reply in a single write
pub async fn send_reply<S>(
    stream: &mut S,
    reply_code: ReplyCode,
    bind_addr: Option<&AddrSpec>,
) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    let reply = encode_reply(reply_code, bind_addr);
    stream.write_all(&reply).await?;
    stream.flush().await?;
    Ok(())
}

/// Send a success reply carrying the bound address
pub async fn send_success<S>(stream: &mut S, bind_addr: &AddrSpec) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    send_reply(stream, ReplyCode::Succeeded, Some(bind_addr)).await
}

/// Send a failure reply with a zero address
pub async fn send_failure<S>(stream: &mut S, reply_code: ReplyCode) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    send_reply(stream, reply_code, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_reply_ipv4() {
        let addr = AddrSpec::from(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 8080));
        let reply = encode_reply(ReplyCode::Succeeded, Some(&addr));

        assert_eq!(&reply[..], &[5, 0, 0, 1, 192, 168, 1, 1, 0x1F, 0x90]);
    }

    #[test]
    fn test_encode_reply_ipv6() {
        let addr = AddrSpec::from(SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 443));
        let reply = encode_reply(ReplyCode::Succeeded, Some(&addr));

        assert_eq!(reply[3], SOCKS5_ADDR_TYPE_IPV6);
        assert_eq!(reply.len(), 3 + 1 + 16 + 2);
        assert_eq!(&reply[20..22], &443u16.to_be_bytes());
    }

    #[test]
    fn test_encode_reply_mapped_ipv6_as_ipv4() {
        let ip: Ipv6Addr = "::ffff:10.1.2.3".parse().unwrap();
        let addr = AddrSpec::from(SocketAddr::new(IpAddr::V6(ip), 1080));
        let reply = encode_reply(ReplyCode::Succeeded, Some(&addr));

        assert_eq!(&reply[..], &[5, 0, 0, 1, 10, 1, 2, 3, 0x04, 0x38]);
    }

    #[test]
    fn test_encode_reply_domain() {
        let addr = AddrSpec::domain("proxy.local", 1080);
        let reply = encode_reply(ReplyCode::Succeeded, Some(&addr));

        assert_eq!(reply[3], SOCKS5_ADDR_TYPE_DOMAIN);
        assert_eq!(reply[4], 11);
        assert_eq!(&reply[5..16], b"proxy.local");
        assert_eq!(&reply[16..18], &1080u16.to_be_bytes());
    }

    #[test]
    fn test_encode_reply_prefers_ipv4_over_domain() {
        let addr = AddrSpec {
            ip: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            fqdn: "ignored".to_string(),
            port: 1,
        };
        let reply = encode_reply(ReplyCode::Succeeded, Some(&addr));
        assert_eq!(reply[3], SOCKS5_ADDR_TYPE_IPV4);
    }

    #[test]
    fn test_encode_reply_prefers_domain_over_ipv6() {
        let addr = AddrSpec {
            ip: Some(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            fqdn: "named".to_string(),
            port: 1,
        };
        let reply = encode_reply(ReplyCode::Succeeded, Some(&addr));
        assert_eq!(reply[3], SOCKS5_ADDR_TYPE_DOMAIN);
    }

    #[test]
    fn test_encode_reply_port_only_spec() {
        let addr = AddrSpec {
            port: 1080,
            ..Default::default()
        };
        let reply = encode_reply(ReplyCode::Succeeded, Some(&addr));
        assert_eq!(&reply[..], &[5, 0, 0, 1, 0, 0, 0, 0, 0x04, 0x38]);
    }

    #[test]
    fn test_encode_reply_default_addr() {
        let reply = encode_reply(ReplyCode::CommandNotSupported, None);
        assert_eq!(&reply[..], &[5, 7, 0, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_send_reply_single_write() {
        let mut stream = Builder::new()
            .write(&[5, 0, 0, 1, 10, 0, 0, 1, 0x23, 0x82])
            .build();
        let addr = AddrSpec::from("10.0.0.1:9090".parse::<SocketAddr>().unwrap());

        send_success(&mut stream, &addr).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure() {
        let mut buffer = Vec::new();

        send_failure(&mut buffer, ReplyCode::ConnectionRefused)
            .await
            .unwrap();

        assert_eq!(buffer, vec![5, 5, 0, 1, 0, 0, 0, 0, 0, 0]);
    }
}
