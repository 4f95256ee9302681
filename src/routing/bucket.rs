use std::collections::VecDeque;
use std::time::Instant;

use crate::constants::BUCKET_CAPACITY;
use crate::endpoint::Host;
use crate::id::NodeId;
use crate::node::Node;

/// A capacity-bounded slice of the id space.
///
/// Members are kept in most-recently-touched order: the head is the
/// freshest node and the tail is the eviction candidate. Every member's id
/// lies within `[start, end]`.
#[derive(Debug)]
pub struct Bucket {
    start: NodeId,
    end: NodeId,
    nodes: VecDeque<Node>,
    updated_at: Instant,
}

impl Bucket {
    pub fn new(start: NodeId, end: NodeId) -> Self {
        Self {
            start,
            end,
            nodes: VecDeque::with_capacity(BUCKET_CAPACITY),
            updated_at: Instant::now(),
        }
    }

    pub fn start(&self) -> &NodeId {
        &self.start
    }

    pub fn end(&self) -> &NodeId {
        &self.end
    }

    pub fn updated_at(&self) -> Instant {
        self.updated_at
    }

    /// Whether `id` falls inside this bucket's range.
    pub fn covers(&self, id: &NodeId) -> bool {
        self.start <= *id && *id <= self.end
    }

    /// Admits a node.
    ///
    /// A node whose id is already present refreshes the member's contact
    /// address and freshness in place, keeping its list position, and the
    /// call reports `false`. Otherwise the node lands at the head; when the
    /// bucket is full the tail is evicted first, without probing it.
    /// Reports `true` for a fresh insertion.
    pub fn add(&mut self, mut node: Node) -> bool {
        self.updated_at = Instant::now();

        if let Some(existing) = self.nodes.iter_mut().find(|n| n.id == node.id) {
            existing.endpoint = node.endpoint;
            existing.touch();
            return false;
        }

        if self.nodes.len() >= BUCKET_CAPACITY {
            self.nodes.pop_back();
        }

        node.touch();
        self.nodes.push_front(node);
        true
    }

    pub fn remove_by_id(&mut self, id: &NodeId) -> Option<Node> {
        let pos = self.nodes.iter().position(|n| &n.id == id)?;
        self.updated_at = Instant::now();
        self.nodes.remove(pos)
    }

    /// Drops every member whose host matches, returning how many went.
    pub fn remove_by_host(&mut self, host: &Host) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|n| &n.endpoint.host != host);

        let removed = before - self.nodes.len();
        if removed > 0 {
            self.updated_at = Instant::now();
        }
        removed
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Members sorted by XOR distance to `target`, at most `k` of them.
    pub fn closest_nodes(&self, target: &NodeId, k: usize) -> Vec<Node> {
        let mut members: Vec<Node> = self.nodes.iter().cloned().collect();
        members.sort_by(|a, b| NodeId::cmp_by_distance(&a.id, &b.id, target));
        members.truncate(k);
        members
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
