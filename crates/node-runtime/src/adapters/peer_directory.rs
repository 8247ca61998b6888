//! Peer directory backed by configured entries.

use parking_lot::RwLock;
use shared_types::{AppPeer, PeerDirectory};
use std::collections::HashMap;

/// In-memory [`PeerDirectory`] seeded from configuration.
#[derive(Debug, Default)]
pub struct StaticPeerDirectory {
    peers: RwLock<HashMap<String, AppPeer>>,
}

impl StaticPeerDirectory {
    pub fn new(peers: HashMap<String, AppPeer>) -> Self {
        Self {
            peers: RwLock::new(peers),
        }
    }

    /// Insert or replace a node's entry.
    pub fn upsert(&self, node_id: impl Into<String>, peer: AppPeer) {
        self.peers.write().insert(node_id.into(), peer);
    }

    pub fn remove(&self, node_id: &str) -> Option<AppPeer> {
        self.peers.write().remove(node_id)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

impl PeerDirectory for StaticPeerDirectory {
    fn app_peer(&self, node_id: &str) -> Option<AppPeer> {
        self.peers.read().get(node_id).cloned()
    }
}
