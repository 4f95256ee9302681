//! Kademlia routing table (BEP-5).
//!
//! The id space `[0, 2^160 - 1]` is carved into 160 buckets by walking the
//! prefix tree around the local id: at every level the half that does not
//! contain the local id becomes one bucket, and the other half is split
//! again. Ranges get geometrically finer near the local id, which is what
//! gives Kademlia its dense view of the neighbourhood and sparse view of
//! the rest of the network.

mod bucket;
mod table;

pub use bucket::Bucket;
pub use table::RoutingTable;

#[cfg(test)]
mod tests;
