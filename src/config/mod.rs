//! Configuration module for Socksrelay
//!
//! This module provides configuration types and parsing for the server.

mod server;
mod transport;

pub use server::{Config, ServerConfig, UdpConfig};
pub use transport::TcpConfig;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[server]
listen_addr = "0.0.0.0:1081"
allow_udp = false

[server.udp]
bind_addr = "0.0.0.0:1081"
max_datagram_size = 1500

[server.tcp]
nodelay = false
keepalive_secs = 30
keepalive_interval = 10
connect_timeout = 0
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:1081");
        assert!(!config.server.allow_udp);
        assert_eq!(config.server.udp.bind_addr, "0.0.0.0:1081");
        assert_eq!(config.server.udp.max_datagram_size, 1500);
        assert!(!config.server.tcp.nodelay);
        assert_eq!(config.server.tcp.keepalive_secs, 30);
        assert_eq!(config.server.tcp.connect_timeout(), None);
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(parse_config("[server]\nlisten_addr = 1080").is_err());
        assert!(parse_config("[server.udp]\nmax_datagram_size = 0").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nlisten_addr = \"127.0.0.1:9050\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9050");
        assert!(config.server.allow_udp);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/socksrelay.toml");
        assert!(result.is_err());
    }
}
