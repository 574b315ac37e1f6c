//! UDP session table
//!
//! Maps each client UDP source address to the outbound socket that relays
//! its traffic. Sessions are created on the first datagram from a client
//! and removed by their own relay task.

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tracing::debug;

/// Client source address to outbound socket
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<SocketAddr, Arc<UdpSocket>>>,
}

impl SessionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the session socket for `client`
    pub async fn get(&self, client: &SocketAddr) -> Option<Arc<UdpSocket>> {
        self.sessions.read().await.get(client).cloned()
    }

    /// Return the session socket for `client`, creating it if needed
    ///
    /// The check and the insert happen under one write lock, so concurrent
    /// first datagrams from one client end up sharing a single socket. The
    /// boolean is true only for the caller that created the session.
    pub async fn get_or_create(&self, client: SocketAddr) -> io::Result<(Arc<UdpSocket>, bool)> {
        if let Some(socket) = self.get(&client).await {
            return Ok((socket, false));
        }

        let mut sessions = self.sessions.write().await;
        if let Some(socket) = sessions.get(&client) {
            return Ok((socket.clone(), false));
        }

        let socket = Arc::new(bind_outbound_socket()?);
        debug!(
            "Created UDP session for {} on {:?}",
            client,
            socket.local_addr().ok()
        );
        sessions.insert(client, socket.clone());
        Ok((socket, true))
    }

    /// Remove the session for `client` if it still maps to `socket`
    pub async fn remove(&self, client: &SocketAddr, socket: &Arc<UdpSocket>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(client) {
            Some(current) if Arc::ptr_eq(current, socket) => {
                sessions.remove(client);
                true
            }
            _ => false,
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the table is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Bind an ephemeral outbound socket
///
/// Prefers a dual-stack IPv6 socket so one session can reach both address
/// families; hosts without IPv6 get a plain IPv4 socket.
pub(crate) fn bind_outbound_socket() -> io::Result<UdpSocket> {
    bind_udp_socket(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0))
}

/// Bind a UDP socket at `addr`
///
/// The IPv6 wildcard is bound dual-stack, falling back to the IPv4 wildcard
/// on the same port when IPv6 is unavailable. Other addresses bind as given.
pub(crate) fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = if addr.ip() == IpAddr::V6(Ipv6Addr::UNSPECIFIED) {
        bind_dual_stack(addr.port()).or_else(|_| {
            bind_plain(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), addr.port()))
        })?
    } else {
        bind_plain(addr)?
    };
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

/// Whether `socket` receives both IPv4 and IPv6 datagrams
pub(crate) fn is_dual_stack(socket: &UdpSocket) -> bool {
    let is_v6 = socket.local_addr().is_ok_and(|addr| addr.is_ipv6());
    is_v6 && !SockRef::from(socket).only_v6().unwrap_or(true)
}

fn bind_dual_stack(port: u16) -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_only_v6(false)?;
    socket.bind(&SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port).into())?;
    Ok(socket)
}

fn bind_plain(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.bind(&addr.into())?;
    Ok(socket)
}

/// Adapt `target` to the address family of an outbound socket
///
/// IPv4 targets are sent to their IPv4-mapped form from a dual-stack
/// socket.
pub(crate) fn outbound_target(local: &SocketAddr, target: SocketAddr) -> SocketAddr {
    match (local, target.ip()) {
        (SocketAddr::V6(_), IpAddr::V4(v4)) => {
            SocketAddr::new(IpAddr::V6(v4.to_ipv6_mapped()), target.port())
        }
        _ => target,
    }
}
