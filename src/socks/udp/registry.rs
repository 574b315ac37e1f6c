//! Authorized UDP clients
//!
//! Every UDP ASSOCIATE registers the control connection's peer here. The
//! relay only accepts datagrams whose source matches a live entry.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Identifier handed out for each association
pub type AssociationId = u64;

/// Expected UDP source of an associated client
///
/// Matched on IP only: the client picks its UDP source port independently
/// of the TCP control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedClient {
    ip: IpAddr,
}

impl AuthorizedClient {
    /// Authorize datagrams from `ip`
    pub fn new(ip: IpAddr) -> Self {
        AuthorizedClient {
            ip: ip.to_canonical(),
        }
    }

    /// Authorized IP
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Whether a datagram from `source` belongs to this client
    pub fn matches(&self, source: &SocketAddr) -> bool {
        source.ip().to_canonical() == self.ip
    }
}

impl From<SocketAddr> for AuthorizedClient {
    fn from(addr: SocketAddr) -> Self {
        AuthorizedClient::new(addr.ip())
    }
}

/// Control-connection id to authorized client
#[derive(Debug, Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    entries: RwLock<HashMap<AssociationId, AuthorizedClient>>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, returning the id to revoke it with
    pub async fn authorize(&self, client: AuthorizedClient) -> AssociationId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().await.insert(id, client);
        id
    }

    /// Remove an association
    pub async fn revoke(&self, id: AssociationId) -> Option<AuthorizedClient> {
        self.entries.write().await.remove(&id)
    }

    /// Whether any live association covers `source`
    pub async fn is_authorized(&self, source: &SocketAddr) -> bool {
        self.entries
            .read()
            .await
            .values()
            .any(|client| client.matches(source))
    }

    /// Number of live associations
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether there are no live associations
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
