//! Adapters for the telegram pool's outbound ports.

pub mod edge_signer;

pub use edge_signer::EdgeSigner;
