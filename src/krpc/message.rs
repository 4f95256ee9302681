use std::collections::BTreeMap;

use bytes::Bytes;

use crate::bencode::{decode, encode, Value};
use crate::id::NodeId;

use super::error::KrpcError;

/// A two-character transaction id, carried verbatim on the wire.
pub type TransactionId = Bytes;

/// An incoming or outgoing query, arguments kept as raw wire bytes.
///
/// Argument validation belongs to the request handler, which answers a bad
/// `id` or `target` with a protocol error instead of dropping the
/// datagram, so the decoder deliberately does not reject them here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Ping {
        id: Bytes,
    },
    FindNode {
        id: Bytes,
        target: Bytes,
    },
    GetPeers {
        id: Bytes,
        info_hash: Bytes,
    },
    AnnouncePeer {
        id: Bytes,
        info_hash: Bytes,
        port: Option<i64>,
        implied_port: bool,
        token: Option<Bytes>,
    },
    /// A method this node does not implement; kept for logging.
    Unknown {
        name: String,
    },
}

impl Query {
    pub fn name(&self) -> &str {
        match self {
            Query::Ping { .. } => "ping",
            Query::FindNode { .. } => "find_node",
            Query::GetPeers { .. } => "get_peers",
            Query::AnnouncePeer { .. } => "announce_peer",
            Query::Unknown { name } => name,
        }
    }
}

/// The `r` dictionary of a response.
///
/// Responses carry no type tag; which fields mean what is decided by the
/// query context stored under the transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub id: Bytes,
    /// Concatenated 26-byte compact node records.
    pub nodes: Option<Bytes>,
    /// 6-byte compact peer records.
    pub values: Option<Vec<Bytes>>,
    pub token: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Query(Query),
    Response(Response),
    Error { code: i64, message: String },
}

/// One KRPC message: a transaction id plus a query, response, or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrpcMessage {
    pub transaction_id: TransactionId,
    pub body: Body,
}

impl KrpcMessage {
    pub fn ping_query(t: TransactionId, our_id: &NodeId) -> Self {
        Self {
            transaction_id: t,
            body: Body::Query(Query::Ping {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
            }),
        }
    }

    pub fn find_node_query(t: TransactionId, our_id: &NodeId, target: &NodeId) -> Self {
        Self {
            transaction_id: t,
            body: Body::Query(Query::FindNode {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
                target: Bytes::copy_from_slice(target.as_bytes()),
            }),
        }
    }

    pub fn get_peers_query(t: TransactionId, our_id: &NodeId, info_hash: &[u8; 20]) -> Self {
        Self {
            transaction_id: t,
            body: Body::Query(Query::GetPeers {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
                info_hash: Bytes::copy_from_slice(info_hash),
            }),
        }
    }

    pub fn announce_peer_query(
        t: TransactionId,
        our_id: &NodeId,
        info_hash: &[u8; 20],
        port: u16,
        implied_port: bool,
        token: Bytes,
    ) -> Self {
        Self {
            transaction_id: t,
            body: Body::Query(Query::AnnouncePeer {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
                info_hash: Bytes::copy_from_slice(info_hash),
                port: Some(port as i64),
                implied_port,
                token: Some(token),
            }),
        }
    }

    pub fn ping_response(t: TransactionId, our_id: &NodeId) -> Self {
        Self {
            transaction_id: t,
            body: Body::Response(Response {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
                ..Response::default()
            }),
        }
    }

    pub fn find_node_response(t: TransactionId, our_id: &NodeId, nodes: Bytes) -> Self {
        Self {
            transaction_id: t,
            body: Body::Response(Response {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
                nodes: Some(nodes),
                ..Response::default()
            }),
        }
    }

    pub fn get_peers_response_values(
        t: TransactionId,
        our_id: &NodeId,
        token: Bytes,
        values: Vec<Bytes>,
    ) -> Self {
        Self {
            transaction_id: t,
            body: Body::Response(Response {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
                values: Some(values),
                token: Some(token),
                ..Response::default()
            }),
        }
    }

    /// The nodes branch of a get_peers reply carries no token.
    pub fn get_peers_response_nodes(t: TransactionId, our_id: &NodeId, nodes: Bytes) -> Self {
        Self {
            transaction_id: t,
            body: Body::Response(Response {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
                nodes: Some(nodes),
                ..Response::default()
            }),
        }
    }

    pub fn announce_peer_response(t: TransactionId, our_id: &NodeId) -> Self {
        Self {
            transaction_id: t,
            body: Body::Response(Response {
                id: Bytes::copy_from_slice(our_id.as_bytes()),
                ..Response::default()
            }),
        }
    }

    pub fn error(t: TransactionId, code: i64, message: &str) -> Self {
        Self {
            transaction_id: t,
            body: Body::Error {
                code,
                message: message.to_string(),
            },
        }
    }

    /// Decodes a datagram into a message.
    ///
    /// Fails when the bytes are not a bencoded dictionary or when `t` or
    /// `y` is absent; the dispatcher treats any failure as a malformed
    /// datagram and penalises the sender. Query arguments are carried raw
    /// and validated later by the handlers.
    pub fn parse(data: &[u8]) -> Result<Self, KrpcError> {
        let value = decode(data)?;
        let dict = value.as_dict().ok_or(KrpcError::NotADict)?;

        let transaction_id = dict
            .get(b"t".as_slice())
            .and_then(|v| v.as_bytes())
            .cloned()
            .ok_or(KrpcError::MissingField("t"))?;

        let msg_type = dict
            .get(b"y".as_slice())
            .and_then(|v| v.as_str())
            .ok_or(KrpcError::MissingField("y"))?;

        let body = match msg_type {
            "q" => Body::Query(parse_query(dict)?),
            "r" => Body::Response(parse_response(dict)),
            "e" => parse_error(dict),
            other => return Err(KrpcError::UnknownType(other.to_string())),
        };

        Ok(Self {
            transaction_id,
            body,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, KrpcError> {
        let mut dict = BTreeMap::new();
        dict.insert(
            Bytes::from_static(b"t"),
            Value::Bytes(self.transaction_id.clone()),
        );

        match &self.body {
            Body::Query(query) => {
                dict.insert(Bytes::from_static(b"y"), Value::string("q"));
                dict.insert(Bytes::from_static(b"q"), Value::string(query.name()));
                dict.insert(Bytes::from_static(b"a"), Value::Dict(encode_args(query)));
            }
            Body::Response(resp) => {
                dict.insert(Bytes::from_static(b"y"), Value::string("r"));

                let mut r = BTreeMap::new();
                r.insert(Bytes::from_static(b"id"), Value::Bytes(resp.id.clone()));
                if let Some(nodes) = &resp.nodes {
                    r.insert(Bytes::from_static(b"nodes"), Value::Bytes(nodes.clone()));
                }
                if let Some(token) = &resp.token {
                    r.insert(Bytes::from_static(b"token"), Value::Bytes(token.clone()));
                }
                if let Some(values) = &resp.values {
                    let list = values.iter().cloned().map(Value::Bytes).collect();
                    r.insert(Bytes::from_static(b"values"), Value::List(list));
                }
                dict.insert(Bytes::from_static(b"r"), Value::Dict(r));
            }
            Body::Error { code, message } => {
                dict.insert(Bytes::from_static(b"y"), Value::string("e"));
                dict.insert(
                    Bytes::from_static(b"e"),
                    Value::List(vec![Value::Integer(*code), Value::string(message)]),
                );
            }
        }

        Ok(encode(&Value::Dict(dict))?)
    }
}

fn encode_args(query: &Query) -> BTreeMap<Bytes, Value> {
    let mut args = BTreeMap::new();

    match query {
        Query::Ping { id } => {
            args.insert(Bytes::from_static(b"id"), Value::Bytes(id.clone()));
        }
        Query::FindNode { id, target } => {
            args.insert(Bytes::from_static(b"id"), Value::Bytes(id.clone()));
            args.insert(Bytes::from_static(b"target"), Value::Bytes(target.clone()));
        }
        Query::GetPeers { id, info_hash } => {
            args.insert(Bytes::from_static(b"id"), Value::Bytes(id.clone()));
            args.insert(
                Bytes::from_static(b"info_hash"),
                Value::Bytes(info_hash.clone()),
            );
        }
        Query::AnnouncePeer {
            id,
            info_hash,
            port,
            implied_port,
            token,
        } => {
            args.insert(Bytes::from_static(b"id"), Value::Bytes(id.clone()));
            args.insert(
                Bytes::from_static(b"info_hash"),
                Value::Bytes(info_hash.clone()),
            );
            args.insert(
                Bytes::from_static(b"implied_port"),
                Value::Integer(i64::from(*implied_port)),
            );
            if let Some(port) = port {
                args.insert(Bytes::from_static(b"port"), Value::Integer(*port));
            }
            if let Some(token) = token {
                args.insert(Bytes::from_static(b"token"), Value::Bytes(token.clone()));
            }
        }
        Query::Unknown { .. } => {}
    }

    args
}

fn parse_query(dict: &BTreeMap<Bytes, Value>) -> Result<Query, KrpcError> {
    let name = dict
        .get(b"q".as_slice())
        .and_then(|v| v.as_str())
        .ok_or(KrpcError::MissingField("q"))?;

    let empty = BTreeMap::new();
    let args = dict
        .get(b"a".as_slice())
        .and_then(|v| v.as_dict())
        .unwrap_or(&empty);

    let field = |key: &[u8]| -> Bytes {
        args.get(key)
            .and_then(|v| v.as_bytes())
            .cloned()
            .unwrap_or_default()
    };

    let query = match name {
        "ping" => Query::Ping { id: field(b"id") },
        "find_node" => Query::FindNode {
            id: field(b"id"),
            target: field(b"target"),
        },
        "get_peers" => Query::GetPeers {
            id: field(b"id"),
            info_hash: field(b"info_hash"),
        },
        "announce_peer" => Query::AnnouncePeer {
            id: field(b"id"),
            info_hash: field(b"info_hash"),
            port: args.get(b"port".as_slice()).and_then(|v| v.as_int()),
            implied_port: args
                .get(b"implied_port".as_slice())
                .and_then(|v| v.as_int())
                == Some(1),
            token: args.get(b"token".as_slice()).and_then(|v| v.as_bytes()).cloned(),
        },
        other => Query::Unknown {
            name: other.to_string(),
        },
    };

    Ok(query)
}

fn parse_response(dict: &BTreeMap<Bytes, Value>) -> Response {
    let empty = BTreeMap::new();
    let r = dict
        .get(b"r".as_slice())
        .and_then(|v| v.as_dict())
        .unwrap_or(&empty);

    Response {
        id: r
            .get(b"id".as_slice())
            .and_then(|v| v.as_bytes())
            .cloned()
            .unwrap_or_default(),
        nodes: r.get(b"nodes".as_slice()).and_then(|v| v.as_bytes()).cloned(),
        values: r.get(b"values".as_slice()).and_then(|v| v.as_list()).map(|list| {
            list.iter()
                .filter_map(|v| v.as_bytes())
                .cloned()
                .collect()
        }),
        token: r.get(b"token".as_slice()).and_then(|v| v.as_bytes()).cloned(),
    }
}

fn parse_error(dict: &BTreeMap<Bytes, Value>) -> Body {
    let list = dict.get(b"e".as_slice()).and_then(|v| v.as_list());

    let code = list
        .and_then(|l| l.first())
        .and_then(|v| v.as_int())
        .unwrap_or(0);
    let message = list
        .and_then(|l| l.get(1))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string();

    Body::Error { code, message }
}
