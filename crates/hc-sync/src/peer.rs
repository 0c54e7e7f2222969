use serde::{Deserialize, Serialize};

use crate::SyncError;

/// A remote node, identified only by its network address (`host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub address: String,
}

impl Peer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Known peers in registration order.  Entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Vec<Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address`.  Registering an address twice returns the
    /// existing entry and keeps its original position.
    pub fn register(&mut self, address: &str) -> Result<Peer, SyncError> {
        let address = address.trim();
        if address.is_empty() || address.chars().any(char::is_whitespace) {
            return Err(SyncError::InvalidPeerAddress(address.to_string()));
        }

        if let Some(existing) = self.peers.iter().find(|p| p.address == address) {
            return Ok(existing.clone());
        }

        let peer = Peer::new(address);
        self.peers.push(peer.clone());
        Ok(peer)
    }

    pub fn all(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_registration_order() {
        let mut registry = PeerRegistry::new();
        registry.register("b:3000").unwrap();
        registry.register("a:3000").unwrap();
        let addrs: Vec<_> = registry.all().iter().map(|p| p.address.as_str()).collect();
        assert_eq!(addrs, ["b:3000", "a:3000"]);
    }

    #[test]
    fn duplicate_registration_returns_existing_entry() {
        let mut registry = PeerRegistry::new();
        let first = registry.register("a:3000").unwrap();
        let again = registry.register(" a:3000 ").unwrap();
        assert_eq!(first, again);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_blank_addresses() {
        let mut registry = PeerRegistry::new();
        assert!(matches!(
            registry.register("   "),
            Err(SyncError::InvalidPeerAddress(_))
        ));
        assert!(registry.register("a b").is_err());
        assert!(registry.is_empty());
    }
}
