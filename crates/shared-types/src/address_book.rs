//! In-memory address book with per-entry expiry.

use crate::p2p::AddressBook;
use libp2p_identity::PeerId;
use multiaddr::Multiaddr;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Address book backed by a map of `PeerId → [(addr, expires_at)]`.
///
/// Re-adding a known address extends its expiry. Reads filter expired
/// entries; every write sweeps them out and forgets peers left with none.
#[derive(Debug, Default)]
pub struct TtlAddressBook {
    entries: RwLock<HashMap<PeerId, Vec<(Multiaddr, Instant)>>>,
}

impl TtlAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of peers with at least one live address.
    pub fn peer_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|addrs| addrs.iter().any(|(_, exp)| *exp > now))
            .count()
    }

    /// Number of peers held in the map, live or not yet swept.
    pub fn tracked_peers(&self) -> usize {
        self.entries.read().len()
    }
}

impl AddressBook for TtlAddressBook {
    fn add_addrs(&self, peer: PeerId, addrs: Vec<Multiaddr>, ttl: Duration) {
        let now = Instant::now();
        let expires = now + ttl;
        let mut entries = self.entries.write();
        entries.retain(|_, known| {
            known.retain(|(_, exp)| *exp > now);
            !known.is_empty()
        });

        if addrs.is_empty() || expires <= now {
            return;
        }
        let known = entries.entry(peer).or_default();
        for addr in addrs {
            match known.iter_mut().find(|(a, _)| *a == addr) {
                Some((_, exp)) => *exp = (*exp).max(expires),
                None => known.push((addr, expires)),
            }
        }
    }

    fn addrs(&self, peer: &PeerId) -> Vec<Multiaddr> {
        let now = Instant::now();
        self.entries
            .read()
            .get(peer)
            .map(|addrs| {
                addrs
                    .iter()
                    .filter(|(_, exp)| *exp > now)
                    .map(|(a, _)| a.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}
