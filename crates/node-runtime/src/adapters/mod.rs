//! # Adapters
//!
//! Implementations of the shared P2P ports for this binary.
//!
//! - `StaticPeerDirectory`: node ID lookup from configuration
//! - `GatewayTransport`: P2P round trips through a local HTTP gateway

pub mod gateway_transport;
pub mod peer_directory;

pub use gateway_transport::GatewayTransport;
pub use peer_directory::StaticPeerDirectory;
