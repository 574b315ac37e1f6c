//! TCP connector implementation
//!
//! Dials CONNECT targets over plain TCP.

use super::{Connected, Connector, SocketOpts};
use crate::config::TcpConfig;
use crate::socks::types::TargetAddr;
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// TCP connector for outbound connections
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Connection timeout, none waits for the OS
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    /// Create a new TCP connector with default options
    pub fn with_defaults() -> Self {
        Self::from_config(&TcpConfig::default())
    }

    /// Create a TCP connector from configuration
    pub fn from_config(config: &TcpConfig) -> Self {
        TcpConnector {
            socket_opts: SocketOpts::from_tcp_config(config),
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn dial(target: &TargetAddr) -> io::Result<TcpStream> {
        match target {
            TargetAddr::V4(addr) => TcpStream::connect(*addr).await,
            TargetAddr::V6(addr) => TcpStream::connect(*addr).await,
            TargetAddr::Domain(host, port) => TcpStream::connect((host.as_str(), *port)).await,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, target: &TargetAddr) -> io::Result<Connected<TcpStream>> {
        let stream = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, Self::dial(target))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("Connection timeout to {}", target),
                    )
                })??,
            None => Self::dial(target).await?,
        };

        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Failed to apply socket options: {}", e);
        }

        let local_addr = stream.local_addr()?;
        debug!("TCP connection established to {} from {}", target, local_addr);

        Ok(Connected { stream, local_addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplyCode;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[test]
    fn test_tcp_connector_with_defaults() {
        let connector = TcpConnector::with_defaults();
        assert!(connector.socket_opts.nodelay);
        assert_eq!(connector.connect_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_tcp_connector_builders() {
        let opts = SocketOpts {
            nodelay: false,
            keepalive_secs: Some(60),
            keepalive_interval: Some(20),
        };
        let connector = TcpConnector::with_defaults()
            .with_socket_opts(opts.clone())
            .with_connect_timeout(None);
        assert_eq!(connector.socket_opts, opts);
        assert_eq!(connector.connect_timeout, None);
    }

    #[tokio::test]
    async fn test_tcp_connector_connect_ipv4() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connector = TcpConnector::with_defaults();
        let connected = connector.connect(&TargetAddr::from(addr)).await.unwrap();

        let (_, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, connected.local_addr);
        assert_eq!(connected.local_addr.ip(), Ipv4Addr::LOCALHOST);
    }

    #[tokio::test]
    async fn test_tcp_connector_connect_domain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let connector = TcpConnector::with_defaults();
        let result = connector.connect(&TargetAddr::domain("localhost", port)).await;

        // localhost may resolve to ::1 first on some hosts
        if let Ok(connected) = result {
            assert!(connected.local_addr.ip().is_loopback());
        }
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = TcpConnector::with_defaults();
        let err = connector
            .connect(&TargetAddr::from(addr))
            .await
            .unwrap_err();

        assert_eq!(ReplyCode::from(&err), ReplyCode::ConnectionRefused);
    }
}
