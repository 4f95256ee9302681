use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::seq::SliceRandom;

use crate::constants::{TID_ALPHABET, TID_POOL_SIZE, TRANSACTION_TTL};

use super::message::TransactionId;

/// Which query a transaction id was lent to, and where it went.
///
/// A response carries no type tag, so this context is the only way to
/// interpret one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Ping,
    FindNode,
    GetPeers,
    AnnouncePeer,
}

#[derive(Debug, Clone)]
pub struct QueryContext {
    pub kind: QueryKind,
    pub addr: SocketAddr,
    pub info_hash: Option<[u8; 20]>,
}

#[derive(Debug)]
struct Borrowed {
    expires_at: Instant,
    ctx: QueryContext,
}

/// The fixed pool of two-character transaction ids.
///
/// Ids are drawn from `[0-9A-Za-z]` squared, 3844 in all, shuffled once at
/// start-up. Each id is either in the free pool or lent out with a
/// context, never both. Lending caps in-flight requests at the pool size:
/// under pressure expired loans are collected first, and a fully saturated
/// pool forcibly reclaims its oldest-expiring half, accepting that a late
/// response to a reclaimed id becomes uninterpretable.
pub struct TransactionRegistry {
    free: Vec<TransactionId>,
    borrowed: HashMap<TransactionId, Borrowed>,
    ttl: Duration,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::with_ttl(TRANSACTION_TTL)
    }

    /// A registry whose loans expire after `ttl` instead of the default.
    pub fn with_ttl(ttl: Duration) -> Self {
        let mut free = Vec::with_capacity(TID_POOL_SIZE);
        for &a in TID_ALPHABET {
            for &b in TID_ALPHABET {
                free.push(Bytes::copy_from_slice(&[a, b]));
            }
        }
        free.shuffle(&mut rand::rng());

        Self {
            free,
            borrowed: HashMap::new(),
            ttl,
        }
    }

    /// Borrows a free transaction id and attaches the request context.
    pub fn create(&mut self, ctx: QueryContext) -> TransactionId {
        if self.borrowed.len() * 2 >= TID_POOL_SIZE {
            self.collect_expired();
        }

        if self.free.is_empty() {
            self.reclaim_oldest_half();
        }

        // The universe is fixed, so a saturated map always reclaims slots.
        let tid = self.free.pop().unwrap();
        self.borrowed.insert(
            tid.clone(),
            Borrowed {
                expires_at: Instant::now() + self.ttl,
                ctx,
            },
        );
        tid
    }

    /// The context attached to `tid`, when it is lent out and unexpired.
    pub fn get(&self, tid: &TransactionId) -> Option<QueryContext> {
        let entry = self.borrowed.get(tid)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.ctx.clone())
    }

    /// Returns `tid` to the free pool. A no-op for ids not lent out;
    /// expired-but-present loans are reclaimed like any other.
    pub fn finish(&mut self, tid: &TransactionId) {
        if self.borrowed.remove(tid).is_some() {
            self.free.push(tid.clone());
        }
    }

    pub fn is_valid(&self, tid: &TransactionId) -> bool {
        self.borrowed
            .get(tid)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn borrowed_count(&self) -> usize {
        self.borrowed.len()
    }

    /// Moves every expired loan back to the free pool.
    fn collect_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<TransactionId> = self
            .borrowed
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(tid, _)| tid.clone())
            .collect();

        for tid in expired {
            self.borrowed.remove(&tid);
            self.free.push(tid);
        }
    }

    /// Forcibly reclaims the oldest-expiring half of the loans.
    fn reclaim_oldest_half(&mut self) {
        let mut by_expiry: Vec<(Instant, TransactionId)> = self
            .borrowed
            .iter()
            .map(|(tid, entry)| (entry.expires_at, tid.clone()))
            .collect();
        by_expiry.sort_by_key(|(expires_at, _)| *expires_at);

        let count = (by_expiry.len() / 2).max(1);
        for (_, tid) in by_expiry.into_iter().take(count) {
            self.borrowed.remove(&tid);
            self.free.push(tid);
        }
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
