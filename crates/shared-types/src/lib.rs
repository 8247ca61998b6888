//! # Shared Types Crate
//!
//! This crate contains the entities and collaborator ports shared by the
//! transparent proxy (eo-01) and the telegram pool (eo-02).
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the P2P collaborator interfaces
//!   (`PeerDirectory`, `AddressBook`, `P2pTransport`) are defined once here.
//! - **One Resolution Routine**: both the bridge and the pool reach a remote
//!   node through [`register_peer_route`], so relay/direct precedence and the
//!   address-book TTL cannot drift apart.

pub mod address_book;
pub mod entities;
pub mod errors;
pub mod p2p;
pub mod routing;

pub use address_book::TtlAddressBook;
pub use entities::*;
pub use errors::*;
pub use p2p::*;
pub use routing::{register_peer_route, PeerRoute, RouteKind};

pub use libp2p_identity::PeerId;
pub use multiaddr::Multiaddr;
