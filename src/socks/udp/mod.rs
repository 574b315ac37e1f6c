//! UDP ASSOCIATE support
//!
//! The relay owns one shared socket, a table of per-client outbound
//! sessions and the set of clients allowed to use it.

mod packet;
mod registry;
mod relay;
mod session;

pub use packet::UdpDatagram;
pub use registry::{AssociationId, AuthorizedClient, ClientRegistry};
pub use relay::UdpRelay;
pub use session::SessionTable;
