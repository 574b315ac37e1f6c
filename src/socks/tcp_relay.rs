//! TCP relay for SOCKS5 CONNECT command
//!
//! Handles TCP CONNECT requests by establishing a connection to the target
//! and relaying data bidirectionally.

use crate::error::{ReplyCode, Socks5Error};
use crate::socks::command::{send_failure, send_success, AddrSpec};
use crate::socks::handler::ConnectionState;
use crate::socks::types::TargetAddr;
use crate::transport::Connector;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Handle TCP CONNECT command
///
/// This function:
/// 1. Dials the target through `connector`
/// 2. Replies with the classified failure, or success with the outbound
///    socket's local address
/// 3. Relays data bidirectionally between client and target
///
/// A failed dial is reported to the client before the error is returned.
pub async fn handle_tcp_connect<S, C>(
    mut client: S,
    target: &TargetAddr,
    connector: &C,
) -> Result<ConnectionState, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: Connector,
{
    debug!("Connecting to target: {}", target);

    let connected = match connector.connect(target).await {
        Ok(connected) => connected,
        Err(e) => {
            let reply = ReplyCode::from(&e);
            warn!("Failed to connect to {}: {} (reply {:?})", target, e, reply);
            send_failure(&mut client, reply).await?;
            return Err(Socks5Error::Dial {
                target: target.to_string(),
                reply,
                source: e,
            });
        }
    };

    send_success(&mut client, &AddrSpec::from(connected.local_addr)).await?;

    info!("SOCKS5 tunnel established to {}", target);

    let (sent, received) = relay_tcp(client, connected.stream).await;
    debug!(
        "SOCKS5 tunnel to {} closed: {} bytes sent, {} bytes received",
        target, sent, received
    );

    Ok(ConnectionState::TcpRelay)
}

/// Relay data bidirectionally between two streams
///
/// The client-to-target direction runs on its own task while the caller
/// copies target-to-client. Each direction shuts down the write side of
/// its destination when its source ends, and the relay returns only after
/// both directions have finished. Returns the bytes copied client-to-target
/// and target-to-client; a direction that ended in an error reports zero.
pub async fn relay_tcp<A, B>(client: A, target: B) -> (u64, u64)
where
    A: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    B: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut target_read, mut target_write) = tokio::io::split(target);

    let upstream = tokio::spawn(async move {
        let result = tokio::io::copy(&mut client_read, &mut target_write).await;
        let _ = target_write.shutdown().await;
        result
    });

    let downstream = tokio::io::copy(&mut target_read, &mut client_write).await;
    let _ = client_write.shutdown().await;

    let upstream = upstream
        .await
        .unwrap_or_else(|e| Err(io::Error::new(io::ErrorKind::Other, e)));

    (
        direction_bytes("client->target", upstream),
        direction_bytes("target->client", downstream),
    )
}

fn direction_bytes(direction: &str, result: io::Result<u64>) -> u64 {
    match result {
        Ok(bytes) => {
            debug!("{} finished: {} bytes", direction, bytes);
            bytes
        }
        Err(e) => {
            debug!("{} error: {}", direction, e);
            0
        }
    }
}
