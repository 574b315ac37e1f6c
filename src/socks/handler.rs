//! Main SOCKS5 handler
//!
//! This module drives one client connection through authentication
//! negotiation, request parsing and command dispatch.
//!
//! # Connection states
//!
//! ```text
//! Negotiating -> RequestPending -> Rejected      -> Closed
//!                               -> TcpRelay      -> Closed
//!                               -> UdpAssociated -> Closed
//! ```
//!
//! Auth and parse failures close the connection without a reply, except a
//! domain name that is not UTF-8, which is answered with host unreachable.
//! Every dispatch outcome, failures included, is reported with a reply first.

use crate::error::{ReplyCode, Socks5Error};
use crate::socks::auth::negotiate;
use crate::socks::command::{parse_request, send_failure, send_success, AddrSpec};
use crate::socks::tcp_relay::handle_tcp_connect;
use crate::socks::types::{SocksCommand, TargetAddr};
use crate::socks::udp::{AuthorizedClient, UdpRelay};
use crate::transport::Connector;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reading the method-selection message
    Negotiating,
    /// Reading the request
    RequestPending,
    /// Request answered with a failure reply
    Rejected,
    /// Forwarding a TCP stream
    TcpRelay,
    /// Holding a UDP association open
    UdpAssociated,
    /// Connection finished
    Closed,
}

/// Addresses of an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Client address
    pub peer: SocketAddr,
    /// Server address the client connected to
    pub local: SocketAddr,
}

/// Everything a connection needs besides its stream
#[derive(Debug)]
pub struct HandlerContext<C> {
    /// Dialer for CONNECT targets
    pub connector: C,
    /// Shared UDP relay
    pub relay: Arc<UdpRelay>,
    /// Accept UDP ASSOCIATE
    pub allow_udp: bool,
}

/// Handle SOCKS5 protocol on a stream
///
/// Returns the last state the connection reached before closing.
pub async fn handle_connection<S, C>(
    stream: S,
    info: ConnectionInfo,
    ctx: &HandlerContext<C>,
) -> Result<ConnectionState, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: Connector,
{
    let mut state = ConnectionState::Negotiating;
    trace!("{}: {:?}", info.peer, state);

    let result = dispatch(stream, &info, ctx, &mut state).await;

    match &result {
        Ok(last) => debug!("{}: {:?} -> {:?}", info.peer, last, ConnectionState::Closed),
        Err(e) => debug!(
            "{}: {:?} -> {:?} ({})",
            info.peer,
            state,
            ConnectionState::Closed,
            e
        ),
    }

    result
}

async fn dispatch<S, C>(
    mut stream: S,
    info: &ConnectionInfo,
    ctx: &HandlerContext<C>,
    state: &mut ConnectionState,
) -> Result<ConnectionState, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: Connector,
{
    let method = negotiate(&mut stream).await?;
    debug!("Authentication completed with method: {:?}", method);

    *state = ConnectionState::RequestPending;
    trace!("{}: {:?}", info.peer, state);

    let request = match parse_request(&mut stream).await {
        Ok(request) => request,
        Err(e @ Socks5Error::InvalidDomain(_)) => {
            warn!("Rejecting request from {}: {}", info.peer, e);
            send_failure(&mut stream, ReplyCode::HostUnreachable).await?;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    info!(
        "SOCKS5 {} request to {} from {}",
        request.command, request.target, info.peer
    );

    match request.command {
        SocksCommand::Bind => {
            warn!("BIND command not supported");
            send_failure(&mut stream, ReplyCode::CommandNotSupported).await?;
            Ok(ConnectionState::Rejected)
        }
        SocksCommand::Connect => {
            if let TargetAddr::V6(_) = request.target {
                warn!("CONNECT to IPv6 target {} not supported", request.target);
                send_failure(&mut stream, ReplyCode::AddrTypeNotSupported).await?;
                return Ok(ConnectionState::Rejected);
            }
            handle_tcp_connect(stream, &request.target, &ctx.connector).await
        }
        SocksCommand::UdpAssociate => handle_udp_associate(stream, info, ctx).await,
    }
}

/// Handle UDP ASSOCIATE on the control connection
///
/// The peer is authorized before the reply goes out so that a datagram sent
/// right after the reply is not dropped. The association lasts until the
/// control connection reaches EOF or fails.
async fn handle_udp_associate<S, C>(
    mut stream: S,
    info: &ConnectionInfo,
    ctx: &HandlerContext<C>,
) -> Result<ConnectionState, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if !ctx.allow_udp {
        warn!("UDP ASSOCIATE not allowed by configuration");
        send_failure(&mut stream, ReplyCode::CommandNotSupported).await?;
        return Ok(ConnectionState::Rejected);
    }

    let relay_addr = match ctx.relay.ensure_started().await {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to start UDP relay: {}", e);
            send_failure(&mut stream, ReplyCode::ServerFailure).await?;
            return Err(e.into());
        }
    };

    let announced = match announce_addr(relay_addr, ctx.relay.is_dual_stack(), info.local) {
        Some(addr) => addr,
        None => {
            warn!(
                "UDP relay on {} is not reachable from {} clients",
                relay_addr,
                if info.local.is_ipv6() { "IPv6" } else { "IPv4" }
            );
            send_failure(&mut stream, ReplyCode::ServerFailure).await?;
            return Ok(ConnectionState::Rejected);
        }
    };

    let id = ctx.relay.authorize(AuthorizedClient::from(info.peer)).await;

    if let Err(e) = send_success(&mut stream, &AddrSpec::from(announced)).await {
        ctx.relay.revoke(id).await;
        return Err(e);
    }

    info!("UDP association for {} via {}", info.peer, announced);

    let closed = wait_for_close(&mut stream).await;
    ctx.relay.revoke(id).await;

    match closed {
        Ok(()) => debug!("UDP control connection from {} closed", info.peer),
        Err(e) => debug!("UDP control connection from {} failed: {}", info.peer, e),
    }

    Ok(ConnectionState::UdpAssociated)
}

/// Address to put in the UDP ASSOCIATE reply
///
/// A relay bound to a wildcard address is announced with the IP the client
/// reached us on, as long as the relay socket can receive from that address
/// family. `None` means it cannot.
fn announce_addr(relay: SocketAddr, dual_stack: bool, local: SocketAddr) -> Option<SocketAddr> {
    if !relay.ip().is_unspecified() {
        return Some(relay);
    }

    let ip = local.ip().to_canonical();
    let reachable = match (relay.ip(), ip) {
        (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => true,
        (IpAddr::V6(_), IpAddr::V4(_)) => dual_stack,
        (IpAddr::V4(_), IpAddr::V6(_)) => false,
    };
    reachable.then(|| SocketAddr::new(ip, relay.port()))
}

/// Drain the control connection until EOF
async fn wait_for_close<S>(stream: &mut S) -> std::io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 512];
    loop {
        if stream.read(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}
