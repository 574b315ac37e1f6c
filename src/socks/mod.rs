//! SOCKS5 protocol
//!
//! Authentication negotiation, request parsing, reply encoding and the
//! per-connection state machine that dispatches CONNECT and UDP ASSOCIATE.

pub mod auth;
pub mod command;
pub mod consts;
mod handler;
mod tcp_relay;
pub mod types;
pub mod udp;

pub use auth::{negotiate, AuthMethod, ClientAuthMessage};
pub use command::{encode_reply, parse_request, AddrSpec, ClientRequest};
pub use handler::{handle_connection, ConnectionInfo, ConnectionState, HandlerContext};
pub use tcp_relay::{handle_tcp_connect, relay_tcp};
pub use types::{AddressType, SocksCommand, TargetAddr};
pub use udp::{UdpDatagram, UdpRelay};
