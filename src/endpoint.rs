//! Network endpoints and the 6-byte compact peer codec (BEP-5).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::node::NodeError;

/// The host part of an [`Endpoint`].
///
/// The DHT wire frame only ever carries IPv4 addresses, but bootstrap
/// entry points are configured by domain name and resolved at send time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    V4(Ipv4Addr),
    Domain(String),
}

/// A remote `(host, port)` pair.
///
/// Construction validates the host: it must parse as an IPv4 dotted quad
/// or be a well-formed domain name.
///
/// # Examples
///
/// ```
/// use rdht::endpoint::Endpoint;
///
/// let peer = Endpoint::new("203.0.113.9", 6881).unwrap();
/// assert!(peer.is_v4());
///
/// let bootstrap = Endpoint::new("router.bittorrent.com", 6881).unwrap();
/// assert!(!bootstrap.is_v4());
///
/// assert!(Endpoint::new("not..a..host", 6881).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: Host,
    pub port: u16,
}

impl Endpoint {
    /// Builds an endpoint, classifying `addr` as IPv4 or domain.
    pub fn new(addr: &str, port: u16) -> Result<Self, NodeError> {
        let host = if let Ok(ip) = Ipv4Addr::from_str(addr) {
            Host::V4(ip)
        } else if is_valid_domain(addr) {
            Host::Domain(addr.to_string())
        } else {
            return Err(NodeError::InvalidAddress(addr.to_string()));
        };

        Ok(Self { host, port })
    }

    pub fn from_v4(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            host: Host::V4(ip),
            port,
        }
    }

    pub fn is_v4(&self) -> bool {
        matches!(self.host, Host::V4(_))
    }

    /// The host rendered as text, for log lines and store keys.
    pub fn host_str(&self) -> String {
        match &self.host {
            Host::V4(ip) => ip.to_string(),
            Host::Domain(d) => d.clone(),
        }
    }

    /// The endpoint as a socket address; `None` for unresolved domains.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        match self.host {
            Host::V4(ip) => Some(SocketAddr::new(IpAddr::V4(ip), self.port)),
            Host::Domain(_) => None,
        }
    }

    /// Packs into the 6-byte compact form: 4 address bytes then the port
    /// big-endian. Domains have no compact form.
    pub fn to_compact(&self) -> Option<[u8; 6]> {
        match self.host {
            Host::V4(ip) => {
                let mut compact = [0u8; 6];
                compact[..4].copy_from_slice(&ip.octets());
                compact[4..].copy_from_slice(&self.port.to_be_bytes());
                Some(compact)
            }
            Host::Domain(_) => None,
        }
    }

    /// Unpacks a 6-byte compact peer record.
    pub fn from_compact(data: &[u8]) -> Option<Self> {
        if data.len() != 6 {
            return None;
        }

        let ip = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
        let port = u16::from_be_bytes([data[4], data[5]]);
        Some(Self::from_v4(ip, port))
    }
}

impl From<SocketAddr> for Endpoint {
    /// Converts a socket address, mapping IPv6 through its textual form.
    ///
    /// The DHT frame is IPv4-only; a v6 source only appears on a
    /// dual-stack bind and such peers are never encodable compactly.
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::from_v4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => Self {
                host: Host::Domain(v6.ip().to_string()),
                port: v6.port(),
            },
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_str(), self.port)
    }
}

/// RFC-1035 shape check: dot-separated labels of letters, digits, and
/// hyphens, no label empty or over 63 bytes, 253 bytes overall.
fn is_valid_domain(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_classification() {
        let e = Endpoint::new("192.168.1.10", 6881).unwrap();
        assert_eq!(e.host, Host::V4(Ipv4Addr::new(192, 168, 1, 10)));
        assert!(e.is_v4());
    }

    #[test]
    fn test_domain_classification() {
        let e = Endpoint::new("dht.transmissionbt.com", 6881).unwrap();
        assert_eq!(e.host, Host::Domain("dht.transmissionbt.com".into()));
        assert_eq!(e.to_socket_addr(), None);
        assert_eq!(e.to_compact(), None);
    }

    #[test]
    fn test_rejects_malformed_hosts() {
        assert!(Endpoint::new("", 6881).is_err());
        assert!(Endpoint::new("bad..dots", 6881).is_err());
        assert!(Endpoint::new("-leading.hyphen", 6881).is_err());
        assert!(Endpoint::new("has space", 6881).is_err());
        assert!(Endpoint::new(&"x".repeat(300), 6881).is_err());
    }

    #[test]
    fn test_compact_round_trip() {
        let e = Endpoint::new("10.0.0.2", 51413).unwrap();
        let compact = e.to_compact().unwrap();
        assert_eq!(compact, [10, 0, 0, 2, 0xC8, 0xD5]);
        assert_eq!(Endpoint::from_compact(&compact).unwrap(), e);
    }

    #[test]
    fn test_from_compact_wrong_length() {
        assert!(Endpoint::from_compact(&[1, 2, 3]).is_none());
        assert!(Endpoint::from_compact(&[0u8; 26]).is_none());
    }

    #[test]
    fn test_display() {
        let e = Endpoint::new("127.0.0.1", 6881).unwrap();
        assert_eq!(e.to_string(), "127.0.0.1:6881");
    }
}
