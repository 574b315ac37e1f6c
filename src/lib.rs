//! # Socksrelay - SOCKS5 Proxy Server
//!
//! Socksrelay is a SOCKS5 proxy server supporting the CONNECT and
//! UDP ASSOCIATE commands without authentication.
//!
//! ## Features
//!
//! - **TCP CONNECT**: IPv4 and domain targets, with dial failures mapped to
//!   SOCKS5 reply codes
//! - **UDP ASSOCIATE**: One shared relay socket with a dedicated outbound
//!   socket per client
//! - **Client authorization**: Only peers holding an open control
//!   connection may use the UDP relay
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksrelay::config::load_config;
//! use socksrelay::server::Server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     Server::bind(&config.server).await?.run(shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> Socksrelay -> Target
//!      |  UDP          ^
//!      +-> relay ------+ (per-client outbound socket)
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{ReplyCode, Socks5Error};
pub use server::Server;

/// Version of the Socksrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
