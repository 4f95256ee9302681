//! Protocol constants and tuning parameters.
//!
//! Values follow BEP-5 and the defaults used by mainline clients; the
//! storage bounds cap what a node will hold for the rest of the swarm.

use std::time::Duration;

// ============================================================================
// Ports and bootstrap
// ============================================================================

/// Default DHT listen port
pub const DEFAULT_PORT: u16 = 6881;

/// Well-known DHT entry points, resolved at send time
pub const BOOTSTRAP_NODES: &[(&str, u16)] = &[
    ("router.bittorrent.com", 6881),
    ("dht.transmissionbt.com", 6881),
    ("router.utorrent.com", 6881),
    ("dht.aelitis.com", 6881),
];

// ============================================================================
// Routing table
// ============================================================================

/// Nodes per bucket (k value in Kademlia)
pub const BUCKET_CAPACITY: usize = 8;

/// Nodes returned by closest-node queries
pub const CLOSEST_NODES: usize = 8;

/// A node touched within this window counts as active
pub const NODE_ACTIVE_WINDOW: Duration = Duration::from_secs(5 * 60);

// ============================================================================
// Transactions
// ============================================================================

/// Characters a transaction id is drawn from
pub const TID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Transaction id length in bytes
pub const TID_LEN: usize = 2;

/// Size of the transaction id universe (62^2)
pub const TID_POOL_SIZE: usize = TID_ALPHABET.len() * TID_ALPHABET.len();

/// How long a borrowed transaction id stays correlatable
pub const TRANSACTION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// Peer storage
// ============================================================================

/// Info-hashes the store will track
pub const MAX_INFO_HASHES: usize = 1_048_576;

/// Announced peers kept per info-hash
pub const MAX_PEERS_PER_INFO_HASH: usize = 100;

// ============================================================================
// KRPC error codes
// ============================================================================

/// Generic error
pub const KRPC_ERROR_GENERIC: i64 = 201;

/// Server error
pub const KRPC_ERROR_SERVER: i64 = 202;

/// Protocol error (malformed packet, invalid argument, bad token)
pub const KRPC_ERROR_PROTOCOL: i64 = 203;

/// Method unknown
pub const KRPC_ERROR_METHOD_UNKNOWN: i64 = 204;

// ============================================================================
// Wire
// ============================================================================

/// Bytes per compact node record (20 id + 4 address + 2 port)
pub const COMPACT_NODE_LEN: usize = 26;

/// Bytes per compact peer record (4 address + 2 port)
pub const COMPACT_PEER_LEN: usize = 6;

/// Receive buffer for one UDP datagram
pub const RECV_BUFFER_SIZE: usize = 65535;
