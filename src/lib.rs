//! rdht - A Mainline BitTorrent DHT node
//!
//! This library implements a participating node in the Kademlia-based DHT
//! used by BitTorrent for trackerless peer discovery ([BEP-5]).
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 bencode encoding/decoding, the KRPC carrier format
//! - [`id`] - 160-bit node identifiers and the XOR distance metric
//! - [`endpoint`] - host/port pairs and the compact peer codec
//! - [`node`] - remote contacts and the local node identity
//! - [`routing`] - the prefix-tree-partitioned Kademlia routing table
//! - [`krpc`] - typed KRPC messages and the transaction id registry
//! - [`store`] - announced peers and tokens, indexed by info-hash
//! - [`server`] - the UDP dispatcher, handlers, and request primitives
//!
//! [BEP-5]: http://bittorrent.org/beps/bep_0005.html

pub mod bencode;
pub mod constants;
pub mod endpoint;
pub mod id;
pub mod krpc;
pub mod node;
pub mod routing;
pub mod server;
pub mod store;

pub use bencode::{decode, encode, BencodeError, Value};
pub use endpoint::{Endpoint, Host};
pub use id::NodeId;
pub use krpc::{
    Body, KrpcError, KrpcMessage, Query, QueryContext, QueryKind, Response, TransactionId,
    TransactionRegistry,
};
pub use node::{LocalNode, Node, NodeError};
pub use routing::{Bucket, RoutingTable};
pub use server::{DhtError, DhtServer};
pub use store::{info_hash_hex, InfoHashStore};
