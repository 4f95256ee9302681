use crate::endpoint::Host;
use crate::id::NodeId;
use crate::node::Node;

use super::bucket::Bucket;

/// The routing table: one bucket per prefix-tree level around the local id.
///
/// Bucket ranges are disjoint and together cover the whole id space except
/// the local id itself, so every other node is storable in exactly one
/// bucket. All operations are linear in the bucket count (160).
pub struct RoutingTable {
    local_id: NodeId,
    buckets: Vec<Bucket>,
}

impl RoutingTable {
    /// Builds the partition by walking from the full range `[0, 2^160 - 1]`
    /// toward the local id.
    ///
    /// Each step splits the current range at `mid = (start + end - 1) / 2`
    /// and emits the half that does not contain the local id as a bucket;
    /// the walk continues into the other half and stops when the range has
    /// shrunk to the local id alone, which gets no bucket.
    pub fn new(local_id: NodeId) -> Self {
        let mut lo = [0u8; 20];
        let mut hi = [0xFFu8; 20];
        let mut buckets = Vec::with_capacity(160);

        while lo != hi {
            let mid = midpoint(&lo, &hi);

            if local_id.0 <= mid {
                let mut right = mid;
                add_one(&mut right);
                buckets.push(Bucket::new(NodeId(right), NodeId(hi)));
                hi = mid;
            } else {
                buckets.push(Bucket::new(NodeId(lo), NodeId(mid)));
                lo = mid;
                add_one(&mut lo);
            }
        }

        Self { local_id, buckets }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    /// Admits a node into the one bucket covering its id.
    ///
    /// The local id has no bucket, so the local node is never stored.
    /// Reports `true` iff the node was newly inserted.
    pub fn add(&mut self, node: Node) -> bool {
        if node.id == self.local_id {
            return false;
        }

        let id = node.id;
        match self.buckets.iter_mut().find(|b| b.covers(&id)) {
            Some(bucket) => bucket.add(node),
            None => false,
        }
    }

    pub fn remove(&mut self, node: &Node) -> Option<Node> {
        self.remove_by_id(&node.id)
    }

    pub fn remove_by_id(&mut self, id: &NodeId) -> Option<Node> {
        self.buckets
            .iter_mut()
            .find_map(|bucket| bucket.remove_by_id(id))
    }

    /// Drops every node contacted at `host`, across all buckets.
    pub fn remove_by_ip(&mut self, host: &Host) -> usize {
        self.buckets
            .iter_mut()
            .map(|bucket| bucket.remove_by_host(host))
            .sum()
    }

    pub fn find(&self, id: &NodeId) -> Option<&Node> {
        self.buckets.iter().find_map(|bucket| bucket.get(id))
    }

    /// The `min(k, total)` nodes closest to `target` by XOR distance,
    /// ascending, ties broken by id byte order.
    pub fn find_closest_nodes(&self, target: &NodeId, k: usize) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .buckets
            .iter()
            .flat_map(|bucket| bucket.nodes().cloned())
            .collect();

        nodes.sort_by(|a, b| NodeId::cmp_by_distance(&a.id, &b.id, target));
        nodes.truncate(k);
        nodes
    }

    /// The first node of the first non-empty bucket, if any.
    pub fn random_node(&self) -> Option<&Node> {
        self.buckets
            .iter()
            .find(|bucket| !bucket.is_empty())
            .and_then(|bucket| bucket.nodes().next())
    }

    pub fn node_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }
}

/// `(lo + hi - 1) / 2` over 160-bit big-endian integers.
///
/// The sum is tracked through a 161st bit so the halving cannot lose the
/// carry. Callers guarantee `lo < hi`, which keeps the subtraction from
/// underflowing.
fn midpoint(lo: &[u8; 20], hi: &[u8; 20]) -> [u8; 20] {
    let mut sum = [0u8; 20];
    let mut carry: u16 = 0;
    for i in (0..20).rev() {
        let s = lo[i] as u16 + hi[i] as u16 + carry;
        sum[i] = (s & 0xFF) as u8;
        carry = s >> 8;
    }
    let mut top = carry as u8;

    let mut i = 19;
    loop {
        if sum[i] > 0 {
            sum[i] -= 1;
            break;
        }
        sum[i] = 0xFF;
        if i == 0 {
            top -= 1;
            break;
        }
        i -= 1;
    }

    let mut half = [0u8; 20];
    let mut bit = top;
    for i in 0..20 {
        half[i] = (bit << 7) | (sum[i] >> 1);
        bit = sum[i] & 1;
    }
    half
}

/// Increments a 160-bit big-endian integer in place.
fn add_one(bytes: &mut [u8; 20]) {
    for b in bytes.iter_mut().rev() {
        let (v, overflow) = b.overflowing_add(1);
        *b = v;
        if !overflow {
            break;
        }
    }
}

#[cfg(test)]
pub(super) fn test_midpoint(lo: &[u8; 20], hi: &[u8; 20]) -> [u8; 20] {
    midpoint(lo, hi)
}

#[cfg(test)]
pub(super) fn test_add_one(bytes: &mut [u8; 20]) {
    add_one(bytes)
}
