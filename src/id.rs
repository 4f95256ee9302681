//! 160-bit node identifiers and the XOR metric (BEP-5).

use std::cmp::Ordering;
use std::fmt;

use rand::Rng as _;
use sha1::{Digest, Sha1};

use crate::node::NodeError;

/// A 160-bit DHT node identifier.
///
/// Ids live in the same space as torrent info-hashes. The byte array is
/// big-endian, so the derived `Ord` is the numeric order of the id as an
/// unsigned 160-bit integer.
///
/// # Examples
///
/// ```
/// use rdht::id::NodeId;
///
/// let a = NodeId::from_bytes(&[0u8; 20]).unwrap();
/// let b = NodeId::from_bytes(&[0xFF; 20]).unwrap();
/// assert_eq!(a.distance(&b), [0xFF; 20]);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    /// Generates a random id: the SHA-1 of 20 random bytes.
    pub fn random() -> Self {
        let mut seed = [0u8; 20];
        rand::rng().fill(&mut seed);
        Self::from_seed(&seed)
    }

    /// Derives an id from a stable seed, such as a MAC address.
    ///
    /// The id is the SHA-1 of the seed bytes, so the same machine gets the
    /// same id across restarts.
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(seed);
        Self(hasher.finalize().into())
    }

    /// Builds an id from exactly 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NodeError> {
        if bytes.len() != 20 {
            return Err(NodeError::InvalidNodeId);
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// XOR distance to `other`, as a big-endian 160-bit integer.
    pub fn distance(&self, other: &NodeId) -> [u8; 20] {
        let mut dist = [0u8; 20];
        for (i, d) in dist.iter_mut().enumerate() {
            *d = self.0[i] ^ other.0[i];
        }
        dist
    }

    /// Orders `a` and `b` by XOR distance to `target`, closest first.
    ///
    /// Equal distances fall back to byte order of the ids themselves, so a
    /// sort using this comparator is total.
    pub fn cmp_by_distance(a: &NodeId, b: &NodeId, target: &NodeId) -> Ordering {
        a.distance(target)
            .cmp(&b.distance(target))
            .then_with(|| a.0.cmp(&b.0))
    }

    /// Lowercase hex form, 40 characters.
    pub fn to_hex(&self) -> String {
        self.0
            .iter()
            .fold(String::with_capacity(40), |mut s, b| {
                use std::fmt::Write;
                let _ = write!(s, "{:02x}", b);
                s
            })
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
