//! Storage for announced peers, keyed by info-hash (BEP-5).

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tracing::debug;

use crate::constants::{MAX_INFO_HASHES, MAX_PEERS_PER_INFO_HASH};
use crate::endpoint::Endpoint;

/// Renders a raw info-hash as the lowercase hex key the store uses.
pub fn info_hash_hex(hash: &[u8]) -> String {
    hash.iter().fold(String::with_capacity(40), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
        s
    })
}

struct HashEntry {
    peers: HashSet<Endpoint>,
    token: Bytes,
}

/// Peers announcing each info-hash, plus the announce token pinned to it.
///
/// The first write for an info-hash fixes its token for the entry's
/// lifetime; later writes carrying a different token are rejected. Both
/// the info-hash count and the per-hash peer set are bounded, and writes
/// past either bound are logged and dropped.
#[derive(Default)]
pub struct InfoHashStore {
    entries: HashMap<String, HashEntry>,
}

impl InfoHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one announcing peer. Reports `true` iff the peer was newly
    /// inserted.
    pub fn add(&mut self, hash_hex: &str, peer: Endpoint, token: &Bytes) -> bool {
        match self.entries.get_mut(hash_hex) {
            Some(entry) => {
                if &entry.token != token {
                    debug!("rejecting write for {}: token mismatch", hash_hex);
                    return false;
                }
                if entry.peers.len() >= MAX_PEERS_PER_INFO_HASH
                    && !entry.peers.contains(&peer)
                {
                    debug!("peer set for {} is full, dropping {}", hash_hex, peer);
                    return false;
                }
                entry.peers.insert(peer)
            }
            None => {
                if self.entries.len() >= MAX_INFO_HASHES {
                    debug!("info-hash store is full, dropping {}", hash_hex);
                    return false;
                }

                let mut peers = HashSet::new();
                peers.insert(peer);
                self.entries.insert(
                    hash_hex.to_string(),
                    HashEntry {
                        peers,
                        token: token.clone(),
                    },
                );
                true
            }
        }
    }

    /// Records a batch of peers under one token; how many were newly
    /// inserted.
    pub fn add_list(&mut self, hash_hex: &str, peers: Vec<Endpoint>, token: &Bytes) -> usize {
        peers
            .into_iter()
            .filter(|peer| self.add(hash_hex, peer.clone(), token))
            .count()
    }

    /// The peers announcing `hash_hex`, in no particular order.
    pub fn find(&self, hash_hex: &str) -> Option<Vec<Endpoint>> {
        self.entries
            .get(hash_hex)
            .map(|entry| entry.peers.iter().cloned().collect())
    }

    pub fn find_token(&self, hash_hex: &str) -> Option<Bytes> {
        self.entries.get(hash_hex).map(|entry| entry.token.clone())
    }

    /// Forgets an info-hash: both its peer set and its token.
    pub fn remove(&mut self, hash_hex: &str) {
        self.entries.remove(hash_hex);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
