//! Server configuration types
//!
//! Defines the listener, UDP relay and outbound TCP settings.

use super::TcpConfig;
use crate::socks::consts::MAX_DATAGRAM_SIZE;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

fn default_listen_addr() -> String {
    "127.0.0.1:1080".to_string()
}

fn default_allow_udp() -> bool {
    true
}

fn default_udp_bind_addr() -> String {
    "[::]:0".to_string()
}

fn default_max_datagram_size() -> usize {
    MAX_DATAGRAM_SIZE
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.server.validate()
    }
}

/// SOCKS5 server configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP listen address (e.g., "127.0.0.1:1080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Allow UDP associate command
    #[serde(default = "default_allow_udp")]
    pub allow_udp: bool,

    /// UDP relay configuration
    #[serde(default)]
    pub udp: UdpConfig,

    /// Outbound TCP configuration
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl ServerConfig {
    /// Parsed listen address
    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.listen_addr))
    }

    fn validate(&self) -> Result<()> {
        self.listen_socket_addr()?;
        self.udp.validate()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            allow_udp: default_allow_udp(),
            udp: UdpConfig::default(),
            tcp: TcpConfig::default(),
        }
    }
}

/// UDP relay configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Relay socket address; port 0 picks an ephemeral port
    #[serde(default = "default_udp_bind_addr")]
    pub bind_addr: String,

    /// Largest datagram accepted in either direction
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,
}

impl UdpConfig {
    /// Parsed relay bind address
    pub fn bind_socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("Invalid UDP bind address: {}", self.bind_addr))
    }

    fn validate(&self) -> Result<()> {
        self.bind_socket_addr()?;
        if self.max_datagram_size == 0 || self.max_datagram_size > MAX_DATAGRAM_SIZE {
            bail!(
                "max_datagram_size must be between 1 and {}, got {}",
                MAX_DATAGRAM_SIZE,
                self.max_datagram_size
            );
        }
        Ok(())
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        UdpConfig {
            bind_addr: default_udp_bind_addr(),
            max_datagram_size: default_max_datagram_size(),
        }
    }
}
