//! Node ID → dialable peer route.

use crate::errors::ResolveError;
use crate::p2p::{AddressBook, PeerDirectory, RECENTLY_CONNECTED_ADDR_TTL};
use libp2p_identity::PeerId;
use multiaddr::{Multiaddr, Protocol};
use tracing::debug;

/// Whether the route goes through a relay circuit or straight to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Relay,
    Direct,
}

/// A resolved, registered route to a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRoute {
    pub peer_id: PeerId,
    /// Transport address with the trailing `/p2p/<id>` removed.
    pub addr: Multiaddr,
    pub kind: RouteKind,
}

/// Look up `node_id`, build its multiaddress, and register it in the
/// address book so a subsequent dial can succeed.
///
/// A relay entry takes precedence over a direct address:
/// - relay: `{relay}/p2p-circuit/p2p/{node_id}`
/// - direct: `{addr}/p2p/{node_id}`
pub fn register_peer_route(
    directory: &dyn PeerDirectory,
    address_book: &dyn AddressBook,
    node_id: &str,
) -> Result<PeerRoute, ResolveError> {
    let peer = directory
        .app_peer(node_id)
        .ok_or_else(|| ResolveError::NodeNotFound(node_id.to_string()))?;

    let (full, kind) = if let Some(relay) = peer.relay() {
        (
            format!("{}/p2p-circuit/p2p/{}", relay, node_id),
            RouteKind::Relay,
        )
    } else if let Some(addr) = peer.addr() {
        (format!("{}/p2p/{}", addr, node_id), RouteKind::Direct)
    } else {
        return Err(ResolveError::NoAddress(node_id.to_string()));
    };

    let invalid = |reason: String| ResolveError::InvalidAddress {
        addr: full.clone(),
        reason,
    };

    let mut addr: Multiaddr = full.parse().map_err(|e: multiaddr::Error| invalid(e.to_string()))?;
    let peer_id = match addr.pop() {
        Some(Protocol::P2p(peer_id)) => peer_id,
        _ => return Err(invalid("missing trailing /p2p component".to_string())),
    };

    address_book.add_addrs(peer_id, vec![addr.clone()], RECENTLY_CONNECTED_ADDR_TTL);
    debug!(node = %node_id, addr = %addr, ?kind, "registered peer route");

    Ok(PeerRoute {
        peer_id,
        addr,
        kind,
    })
}
