//! # Error Types
//!
//! Errors raised while resolving and calling remote peers.

use thiserror::Error;

/// Errors that can occur while resolving a node to a dialable route.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The peer directory has no entry for the node.
    #[error("failed to find node {0}")]
    NodeNotFound(String),

    /// The node is known but exposes neither a relay nor a direct address.
    #[error("failed to find addr of node {0}")]
    NoAddress(String),

    /// The composed multiaddress could not be parsed.
    #[error("invalid peer address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },
}

/// Errors reported by the P2P transport collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The outbound request could not be built.
    #[error("invalid p2p request: {0}")]
    InvalidRequest(String),

    /// Dialing or connecting to the peer failed.
    #[error("failed to dial peer {peer}: {reason}")]
    Dial { peer: String, reason: String },

    /// The stream was established but the exchange failed.
    #[error("p2p request failed: {0}")]
    Request(String),

    /// The transport gave up waiting for the peer.
    #[error("p2p request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl TransportError {
    /// True for failures that happened before a request was sent.
    pub fn is_construction_failure(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}
