//! SOCKS5 server
//!
//! Owns the TCP listener and runs one task per accepted connection until
//! shutdown.

use crate::config::ServerConfig;
use crate::error::Socks5Error;
use crate::socks::{handle_connection, ConnectionInfo, HandlerContext, UdpRelay};
use crate::transport::{Connector, TcpConnector};
use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Main Socksrelay server
pub struct Server<C = TcpConnector> {
    /// Bound TCP listener
    listener: TcpListener,
    /// State shared by all connections
    context: Arc<HandlerContext<C>>,
}

impl Server<TcpConnector> {
    /// Bind the listener described by `config`
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let connector = TcpConnector::from_config(&config.tcp);
        Self::with_connector(config, connector).await
    }
}

impl<C: Connector> Server<C> {
    /// Bind the listener, dialing CONNECT targets through `connector`
    pub async fn with_connector(config: &ServerConfig, connector: C) -> Result<Self> {
        let listen_addr = config.listen_socket_addr()?;
        let listener = TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", listen_addr))?;

        let relay = Arc::new(UdpRelay::from_config(&config.udp)?);

        Ok(Server {
            listener,
            context: Arc::new(HandlerContext {
                connector,
                relay,
                allow_udp: config.allow_udp,
            }),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .with_context(|| "Failed to get listener address")
    }

    /// Shared connection context
    pub fn context(&self) -> &Arc<HandlerContext<C>> {
        &self.context
    }

    /// Run the accept loop until shutdown
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("SOCKS5 server listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_connection(stream, peer),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let local = match stream.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Dropping connection from {}: {}", peer, e);
                return;
            }
        };
        debug!("Accepted connection from {}", peer);

        let context = self.context.clone();
        tokio::spawn(async move {
            let info = ConnectionInfo { peer, local };
            match handle_connection(stream, info, context.as_ref()).await {
                Ok(state) => debug!("Connection from {} finished in {:?}", peer, state),
                Err(e) => log_connection_error(peer, &e),
            }
        });
    }
}

fn log_connection_error(peer: SocketAddr, err: &Socks5Error) {
    match err {
        Socks5Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            debug!("Connection from {} closed early", peer)
        }
        Socks5Error::Dial { .. } => info!("Connection from {}: {}", peer, err),
        _ => warn!("Connection from {} failed: {}", peer, err),
    }
}
