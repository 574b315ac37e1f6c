//! Shared UDP relay for SOCKS5 UDP ASSOCIATE
//!
//! One relay socket serves every associated client. Datagrams from a client
//! are unwrapped and sent to their destination through a per-client
//! outbound socket; replies arriving on that socket are wrapped in a SOCKS5
//! UDP header and sent back to the client through the relay socket.

use super::packet::UdpDatagram;
use super::registry::{AssociationId, AuthorizedClient, ClientRegistry};
use super::session::{bind_udp_socket, is_dual_stack, outbound_target, SessionTable};
use crate::config::UdpConfig;
use crate::error::Socks5Error;
use crate::socks::consts::MAX_DATAGRAM_SIZE;
use crate::socks::types::TargetAddr;
use anyhow::Result;
use bytes::{Bytes, BytesMut};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Relay socket, session table and authorized clients
#[derive(Debug)]
pub struct UdpRelay {
    /// Address the relay socket binds to on first use
    bind_addr: SocketAddr,
    /// Receive buffer size for both directions
    max_datagram_size: usize,
    /// Relay socket, bound once
    socket: OnceCell<Arc<UdpSocket>>,
    /// Client source address to outbound socket
    sessions: SessionTable,
    /// Clients with a live control connection
    clients: ClientRegistry,
}

impl UdpRelay {
    /// Create a relay that will bind `bind_addr` on first association
    pub fn new(bind_addr: SocketAddr) -> Self {
        UdpRelay {
            bind_addr,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            socket: OnceCell::new(),
            sessions: SessionTable::new(),
            clients: ClientRegistry::new(),
        }
    }

    /// Create a relay from configuration
    pub fn from_config(config: &UdpConfig) -> Result<Self> {
        let bind_addr = config.bind_socket_addr()?;
        Ok(Self::new(bind_addr).with_max_datagram_size(config.max_datagram_size))
    }

    /// Set the receive buffer size
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size.clamp(1, MAX_DATAGRAM_SIZE);
        self
    }

    /// Address of the relay socket, if it has been bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.get().and_then(|s| s.local_addr().ok())
    }

    /// Whether the bound relay socket accepts both IPv4 and IPv6 clients
    pub fn is_dual_stack(&self) -> bool {
        self.socket.get().is_some_and(|s| is_dual_stack(s))
    }

    /// Bind the relay socket and start the inbound loop, once
    ///
    /// Later calls return the address bound by the first one.
    pub async fn ensure_started(self: &Arc<Self>) -> io::Result<SocketAddr> {
        let socket = self
            .socket
            .get_or_try_init(|| async {
                let socket = Arc::new(bind_udp_socket(self.bind_addr)?);
                info!("UDP relay listening on {}", socket.local_addr()?);

                let relay = self.clone();
                let loop_socket = socket.clone();
                tokio::spawn(async move {
                    relay.run_inbound(loop_socket).await;
                });

                Ok::<_, io::Error>(socket)
            })
            .await?;

        socket.local_addr()
    }

    /// Authorize datagrams from a client's IP
    pub async fn authorize(&self, client: AuthorizedClient) -> AssociationId {
        let id = self.clients.authorize(client).await;
        debug!("UDP association {} authorized for {}", id, client.ip());
        id
    }

    /// End an association
    pub async fn revoke(&self, id: AssociationId) {
        if let Some(client) = self.clients.revoke(id).await {
            debug!("UDP association {} for {} revoked", id, client.ip());
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    /// Number of live associations
    pub async fn association_count(&self) -> usize {
        self.clients.len().await
    }

    /// Inbound loop: one per relay, runs for the life of the process
    async fn run_inbound(self: Arc<Self>, socket: Arc<UdpSocket>) {
        let mut buf = vec![0u8; self.max_datagram_size];

        loop {
            let (len, source) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("UDP relay receive error: {}", e);
                    continue;
                }
            };

            match self.handle_inbound(&socket, &buf[..len], source).await {
                Ok(_) => {}
                Err(Socks5Error::UnauthorizedClient(addr)) => {
                    debug!("Dropping datagram from unauthorized source {}", addr)
                }
                Err(e) => debug!("Dropping datagram from {}: {}", source, e),
            }
        }
    }

    /// Process one datagram received on the relay socket
    ///
    /// Returns whether a new session was created. Every error drops only
    /// this datagram.
    pub(crate) async fn handle_inbound(
        self: &Arc<Self>,
        relay_socket: &Arc<UdpSocket>,
        datagram: &[u8],
        source: SocketAddr,
    ) -> Result<bool, Socks5Error> {
        if !self.clients.is_authorized(&source).await {
            return Err(Socks5Error::UnauthorizedClient(source));
        }

        let packet = UdpDatagram::decode(datagram)?;
        if packet.is_fragmented() {
            return Err(Socks5Error::UdpFragUnsupported(packet.frag));
        }

        let (outbound, created) = self.sessions.get_or_create(source).await?;
        if created {
            info!("UDP session started for {}", source);
            let relay = self.clone();
            let relay_socket = relay_socket.clone();
            let session_socket = outbound.clone();
            tokio::spawn(async move {
                relay
                    .relay_to_client(source, session_socket, relay_socket)
                    .await;
            });
        }

        debug!(
            "UDP relay: {} -> {} ({} bytes)",
            source,
            packet.addr,
            packet.data.len()
        );

        if matches!(packet.addr, TargetAddr::Domain(..)) {
            // Resolved off the inbound loop
            tokio::spawn(async move {
                if let Err(e) = forward(&outbound, &packet).await {
                    debug!("Dropping datagram from {} to {}: {}", source, packet.addr, e);
                }
            });
        } else {
            forward(&outbound, &packet).await?;
        }

        Ok(created)
    }

    /// Remote-to-client loop for one session
    ///
    /// Ends when the outbound socket fails to read; that is the only way a
    /// session is torn down.
    async fn relay_to_client(
        self: Arc<Self>,
        client: SocketAddr,
        outbound: Arc<UdpSocket>,
        relay_socket: Arc<UdpSocket>,
    ) {
        let mut buf = vec![0u8; self.max_datagram_size];

        let reason = loop {
            let (len, from) = match outbound.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => break e,
            };

            let reply = encapsulate(from, &buf[..len]);
            match relay_socket.send_to(&reply, client).await {
                Ok(_) => debug!("UDP relay: {} -> {} ({} bytes)", from, client, len),
                Err(e) => warn!("UDP send to client {} failed: {}", client, e),
            }
        };

        if self.sessions.remove(&client, &outbound).await {
            info!("UDP session for {} closed: {}", client, reason);
        }
    }
}

/// Send a datagram's payload to its destination through a session socket
async fn forward(outbound: &UdpSocket, packet: &UdpDatagram) -> io::Result<()> {
    let target = packet.addr.resolve().await?;
    let target = outbound_target(&outbound.local_addr()?, target);
    outbound.send_to(&packet.data, target).await?;
    Ok(())
}

/// Wrap a datagram from a remote peer for delivery to the client
pub(crate) fn encapsulate(from: SocketAddr, payload: &[u8]) -> BytesMut {
    UdpDatagram::new(TargetAddr::from(from), Bytes::copy_from_slice(payload)).encode()
}
