//! DHT contacts: a remote node is an [`Endpoint`] plus a [`NodeId`] and a
//! freshness timestamp; the local node wraps one by composition.

use std::time::Instant;

use thiserror::Error;

use crate::constants::NODE_ACTIVE_WINDOW;
use crate::endpoint::Endpoint;
use crate::id::NodeId;

/// Errors from constructing identifiers, endpoints, and nodes.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Node id is not exactly 20 bytes.
    #[error("invalid node id length")]
    InvalidNodeId,

    /// Host is neither an IPv4 dotted quad nor a well-formed domain.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// A known remote node.
#[derive(Debug, Clone)]
pub struct Node {
    pub endpoint: Endpoint,
    pub id: NodeId,
    active_at: Instant,
}

impl Node {
    pub fn new(id: NodeId, endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            id,
            active_at: Instant::now(),
        }
    }

    /// Replaces the contact address and refreshes the freshness stamp.
    pub fn update(&mut self, addr: &str, port: u16) -> Result<(), NodeError> {
        self.endpoint = Endpoint::new(addr, port)?;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.active_at = Instant::now();
    }

    /// When the node was last constructed, re-added, or updated.
    pub fn active_at(&self) -> Instant {
        self.active_at
    }

    /// Whether the node was touched within the activity window.
    ///
    /// A derived view only; nothing expires a node except bucket eviction.
    pub fn is_active(&self) -> bool {
        self.active_at.elapsed() < NODE_ACTIVE_WINDOW
    }

    /// Packs into 26-byte compact node info: 20 id bytes then the 6-byte
    /// compact endpoint. Domain-hosted nodes have no compact form.
    pub fn to_compact(&self) -> Option<[u8; 26]> {
        let endpoint = self.endpoint.to_compact()?;

        let mut compact = [0u8; 26];
        compact[..20].copy_from_slice(&self.id.0);
        compact[20..].copy_from_slice(&endpoint);
        Some(compact)
    }

    /// Unpacks one 26-byte compact node record.
    pub fn from_compact(data: &[u8]) -> Option<Self> {
        if data.len() != 26 {
            return None;
        }

        let id = NodeId::from_bytes(&data[..20]).ok()?;
        let endpoint = Endpoint::from_compact(&data[20..])?;
        Some(Self::new(id, endpoint))
    }
}

/// This process's own identity on the network.
///
/// The address comes from an external IP-lookup collaborator; the id is
/// derived from a stable seed via [`NodeId::from_seed`]. The local node is
/// never stored in the routing table.
#[derive(Debug, Clone)]
pub struct LocalNode {
    pub node: Node,
}

impl LocalNode {
    pub fn new(addr: &str, port: u16, id: NodeId) -> Result<Self, NodeError> {
        Ok(Self {
            node: Node::new(id, Endpoint::new(addr, port)?),
        })
    }

    pub fn id(&self) -> &NodeId {
        &self.node.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id_byte: u8) -> Node {
        Node::new(
            NodeId([id_byte; 20]),
            Endpoint::new("10.1.2.3", 6881).unwrap(),
        )
    }

    #[test]
    fn test_new_node_is_active() {
        assert!(node(1).is_active());
    }

    #[test]
    fn test_update_refreshes_and_replaces() {
        let mut n = node(1);
        let before = n.active_at();

        n.update("10.9.9.9", 7000).unwrap();
        assert_eq!(n.endpoint, Endpoint::new("10.9.9.9", 7000).unwrap());
        assert!(n.active_at() >= before);

        assert!(n.update("not a host", 7000).is_err());
    }

    #[test]
    fn test_compact_round_trip() {
        let n = node(0x42);
        let compact = n.to_compact().unwrap();
        assert_eq!(compact.len(), 26);

        let parsed = Node::from_compact(&compact).unwrap();
        assert_eq!(parsed.id, n.id);
        assert_eq!(parsed.endpoint, n.endpoint);
    }

    #[test]
    fn test_compact_rejects_wrong_length() {
        assert!(Node::from_compact(&[0u8; 25]).is_none());
        assert!(Node::from_compact(&[0u8; 27]).is_none());
    }

    #[test]
    fn test_domain_node_has_no_compact_form() {
        let n = Node::new(
            NodeId::random(),
            Endpoint::new("router.bittorrent.com", 6881).unwrap(),
        );
        assert!(n.to_compact().is_none());
    }

    #[test]
    fn test_local_node() {
        let id = NodeId::from_seed(b"aa:bb:cc:dd:ee:ff");
        let local = LocalNode::new("198.51.100.7", 6881, id).unwrap();
        assert_eq!(*local.id(), id);
        assert!(LocalNode::new("???", 6881, id).is_err());
    }
}
