//! Test utilities for Socksrelay
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use socksrelay::config::ServerConfig;
use socksrelay::server::Server;
use socksrelay::socks::HandlerContext;
use socksrelay::transport::TcpConnector;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Address of a port nothing listens on
pub async fn closed_port() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr
}

/// Start a TCP echo server
pub async fn start_tcp_echo() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start a UDP echo server
pub async fn start_udp_echo() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 65535];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..len], from).await;
        }
    });
    addr
}

/// Test configuration builder
pub struct TestConfigBuilder {
    listen_addr: String,
    udp_bind_addr: String,
    allow_udp: bool,
    connect_timeout: u64,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            listen_addr: "127.0.0.1:0".to_string(),
            udp_bind_addr: "127.0.0.1:0".to_string(),
            allow_udp: true,
            connect_timeout: 2,
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set UDP allowed
    pub fn allow_udp(mut self, allow: bool) -> Self {
        self.allow_udp = allow;
        self
    }

    /// Set the listener address
    pub fn listen_addr(mut self, addr: &str) -> Self {
        self.listen_addr = addr.to_string();
        self
    }

    /// Set the UDP relay bind address
    pub fn udp_bind_addr(mut self, addr: &str) -> Self {
        self.udp_bind_addr = addr.to_string();
        self
    }

    /// Build the server configuration, bound to loopback ephemeral ports
    /// unless overridden
    pub fn build(self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.listen_addr = self.listen_addr;
        config.allow_udp = self.allow_udp;
        config.udp.bind_addr = self.udp_bind_addr;
        config.tcp.connect_timeout = self.connect_timeout;
        config
    }
}

/// A server running in the background
pub struct TestServer {
    /// Listener address
    pub addr: SocketAddr,
    /// Shared connection state
    pub context: Arc<HandlerContext<TcpConnector>>,
    shutdown_tx: broadcast::Sender<bool>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Start a server with the given configuration
pub async fn start_server(config: ServerConfig) -> TestServer {
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let context = server.context().clone();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(server.run(shutdown_rx));

    TestServer {
        addr,
        context,
        shutdown_tx,
    }
}

/// Connect and complete the no-auth method negotiation
pub async fn connect_and_negotiate(server: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(server).await.unwrap();
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x00]);

    stream
}

/// Build a request for an IPv4 target
pub fn ipv4_request(command: u8, target: SocketAddr) -> Vec<u8> {
    let mut request = vec![0x05, command, 0x00, 0x01];
    match target {
        SocketAddr::V4(v4) => request.extend_from_slice(&v4.ip().octets()),
        SocketAddr::V6(_) => panic!("IPv4 target expected"),
    }
    request.extend_from_slice(&target.port().to_be_bytes());
    request
}

/// Read a reply with an IPv4 bound address
pub async fn read_ipv4_reply(stream: &mut TcpStream) -> (u8, SocketAddr) {
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[0], 0x05);
    assert_eq!(reply[2], 0x00);
    assert_eq!(reply[3], 0x01);

    let ip = std::net::Ipv4Addr::new(reply[4], reply[5], reply[6], reply[7]);
    let port = u16::from_be_bytes([reply[8], reply[9]]);
    (reply[1], SocketAddr::from((ip, port)))
}
