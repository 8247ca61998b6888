//! # Core Domain Entities
//!
//! Primitive types and the peer reachability record.

use serde::{Deserialize, Serialize};

/// A 32-byte Keccak-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte Ethereum-style address.
pub type Address = [u8; 20];

/// The all-zero address, used as "unset".
pub const ZERO_ADDRESS: Address = [0u8; 20];

/// Returns true if the address is the all-zero (unset) address.
pub fn is_zero_address(address: &Address) -> bool {
    address == &ZERO_ADDRESS
}

/// Format an address as `0x`-prefixed lowercase hex.
pub fn address_to_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

/// Build an address from its last bytes, left-padding with zeros.
///
/// `address_from_low_bytes(&[0x30, 0x01])` is `0x…3001`.
pub fn address_from_low_bytes(bytes: &[u8]) -> Address {
    let mut address = ZERO_ADDRESS;
    let len = bytes.len().min(20);
    address[20 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    address
}

/// How a remote application node can be reached.
///
/// At most one of `relay` or `addr` is expected to be populated. When both
/// are present the relay wins; when neither is, the node is unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPeer {
    /// Direct multiaddress, e.g. `/ip4/10.0.0.7/tcp/50001`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    /// Relay circuit prefix, e.g. `/ip4/1.2.3.4/tcp/50001/p2p/<relay-id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<String>,
}

impl AppPeer {
    /// A peer reachable only through a relay.
    pub fn via_relay(relay: impl Into<String>) -> Self {
        Self {
            addr: None,
            relay: Some(relay.into()),
        }
    }

    /// A peer reachable at a direct address.
    pub fn direct(addr: impl Into<String>) -> Self {
        Self {
            addr: Some(addr.into()),
            relay: None,
        }
    }

    /// The relay prefix, ignoring empty strings.
    pub fn relay(&self) -> Option<&str> {
        self.relay.as_deref().filter(|r| !r.is_empty())
    }

    /// The direct address, ignoring empty strings.
    pub fn addr(&self) -> Option<&str> {
        self.addr.as_deref().filter(|a| !a.is_empty())
    }
}
