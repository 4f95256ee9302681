//! The DHT server: UDP dispatcher, query/response/error handlers, and the
//! outbound request primitives (BEP-5).
//!
//! One task owns the socket and iterates the receive loop; every routing,
//! transaction, and store mutation happens from that task or behind the
//! short-lived locks below, so handlers never observe each other half-way
//! through a state change.
//!
//! Outbound requests are fire-and-forget: the transaction id borrowed from
//! the [`TransactionRegistry`] carries the request context, and the
//! response handler picks it back up whenever (and whether) the reply
//! arrives. There are no per-request timeouts or retries; an id that never
//! comes back is collected once it expires.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::constants::{
    BOOTSTRAP_NODES, CLOSEST_NODES, COMPACT_NODE_LEN, KRPC_ERROR_GENERIC, KRPC_ERROR_PROTOCOL,
    RECV_BUFFER_SIZE,
};
use crate::endpoint::Endpoint;
use crate::id::NodeId;
use crate::krpc::{
    Body, KrpcError, KrpcMessage, Query, QueryContext, QueryKind, Response, TransactionId,
    TransactionRegistry,
};
use crate::node::{LocalNode, Node};
use crate::routing::RoutingTable;
use crate::store::{info_hash_hex, InfoHashStore};

/// Errors that can escape the server's public surface.
///
/// Per-datagram problems never do; they are logged and the loop moves on.
#[derive(Debug, Error)]
pub enum DhtError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("krpc error: {0}")]
    Krpc(#[from] KrpcError),
}

/// A participating Mainline DHT node.
///
/// # Examples
///
/// ```no_run
/// use rdht::id::NodeId;
/// use rdht::node::LocalNode;
/// use rdht::server::DhtServer;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // The address comes from an external IP lookup, the id from a stable
/// // seed such as the machine's MAC address.
/// let id = NodeId::from_seed(b"00:1a:2b:3c:4d:5e");
/// let local = LocalNode::new("203.0.113.5", 6881, id)?;
///
/// let server = Arc::new(DhtServer::bind(6881, local).await?);
/// server.bootstrap().await;
///
/// let runner = server.clone();
/// tokio::spawn(async move { runner.run().await });
///
/// // Ask the network who has a torrent.
/// let info_hash = [0u8; 20];
/// server.lookup(&info_hash).await;
/// # Ok(())
/// # }
/// ```
pub struct DhtServer {
    socket: Arc<UdpSocket>,
    local: LocalNode,
    routing: RwLock<RoutingTable>,
    registry: Mutex<TransactionRegistry>,
    store: RwLock<InfoHashStore>,
    port: u16,
}

impl DhtServer {
    /// Binds the UDP socket on `0.0.0.0:<port>` and sets up empty state.
    pub async fn bind(port: u16, local: LocalNode) -> Result<Self, DhtError> {
        let socket = UdpSocket::bind(format!("0.0.0.0:{}", port)).await?;
        let port = socket.local_addr()?.port();
        let local_id = *local.id();

        info!("dht node {} bound on port {}", local_id, port);

        Ok(Self {
            socket: Arc::new(socket),
            local,
            routing: RwLock::new(RoutingTable::new(local_id)),
            registry: Mutex::new(TransactionRegistry::new()),
            store: RwLock::new(InfoHashStore::new()),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_id(&self) -> &NodeId {
        self.local.id()
    }

    pub fn node_count(&self) -> usize {
        self.routing.read().node_count()
    }

    /// Peers discovered (or announced to us) for an info-hash.
    pub fn peers_for(&self, info_hash: &[u8; 20]) -> Option<Vec<Endpoint>> {
        self.store.read().find(&info_hash_hex(info_hash))
    }

    /// Pings the well-known entry nodes to seed the routing table.
    pub async fn bootstrap(&self) {
        info!("bootstrapping from {} entry nodes", BOOTSTRAP_NODES.len());

        for (host, port) in BOOTSTRAP_NODES {
            match Endpoint::new(host, *port) {
                Ok(endpoint) => self.send_ping_bootstrap(&endpoint).await,
                Err(e) => warn!("skipping bootstrap endpoint {}: {}", host, e),
            }
        }
    }

    /// The receive loop. Runs until the socket fails.
    pub async fn run(&self) -> Result<(), DhtError> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let (n, src) = self.socket.recv_from(&mut buf).await?;
            self.handle_datagram(&buf[..n], src).await;
        }
    }

    /// Decodes one datagram and routes it to the matching handler.
    ///
    /// A datagram that does not decode gets its sender evicted from the
    /// routing table wholesale. Handler failures are logged; nothing
    /// stops the loop.
    async fn handle_datagram(&self, data: &[u8], src: SocketAddr) {
        let msg = match KrpcMessage::parse(data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("malformed datagram from {}: {}", src, e);
                let removed = self.routing.write().remove_by_ip(&Endpoint::from(src).host);
                if removed > 0 {
                    debug!("evicted {} routing entries at {}", removed, src.ip());
                }
                return;
            }
        };

        let result = match msg.body {
            Body::Query(query) => self.handle_query(msg.transaction_id, query, src).await,
            Body::Response(resp) => self.handle_response(msg.transaction_id, resp, src).await,
            Body::Error { code, message } => self.handle_error(msg.transaction_id, code, &message),
        };

        if let Err(e) = result {
            warn!("handler failed for datagram from {}: {}", src, e);
        }
    }

    /// Answers an incoming query.
    async fn handle_query(
        &self,
        t: TransactionId,
        query: Query,
        src: SocketAddr,
    ) -> Result<(), DhtError> {
        if let Query::Unknown { name } = &query {
            error!("unknown query kind {:?} from {}", name, src);
            return Ok(());
        }

        let sender_id = match query {
            Query::Ping { ref id }
            | Query::FindNode { ref id, .. }
            | Query::GetPeers { ref id, .. }
            | Query::AnnouncePeer { ref id, .. } => NodeId::from_bytes(id),
            Query::Unknown { .. } => unreachable!(),
        };
        if sender_id.is_err() {
            return self
                .reply(KrpcMessage::error(t, KRPC_ERROR_PROTOCOL, "invalid id"), src)
                .await;
        }

        match query {
            Query::Ping { .. } => {
                self.reply(KrpcMessage::ping_response(t, self.local.id()), src)
                    .await
            }

            Query::FindNode { target, .. } => {
                let Ok(target) = NodeId::from_bytes(&target) else {
                    return self
                        .reply(
                            KrpcMessage::error(t, KRPC_ERROR_PROTOCOL, "invalid target"),
                            src,
                        )
                        .await;
                };

                let closest = self.routing.read().find_closest_nodes(&target, CLOSEST_NODES);
                if closest.is_empty() {
                    return self
                        .reply(
                            KrpcMessage::error(t, KRPC_ERROR_GENERIC, "no known nodes"),
                            src,
                        )
                        .await;
                }

                self.reply(
                    KrpcMessage::find_node_response(t, self.local.id(), compact_nodes(&closest)),
                    src,
                )
                .await
            }

            Query::GetPeers { info_hash, .. } => {
                let Ok(target) = NodeId::from_bytes(&info_hash) else {
                    return self
                        .reply(
                            KrpcMessage::error(t, KRPC_ERROR_PROTOCOL, "invalid info_hash"),
                            src,
                        )
                        .await;
                };

                let hex = info_hash_hex(&info_hash);
                let stored = {
                    let store = self.store.read();
                    store.find(&hex).map(|peers| (peers, store.find_token(&hex)))
                };

                if let Some((peers, token)) = stored {
                    let values = peers
                        .iter()
                        .filter_map(|p| p.to_compact())
                        .map(|c| Bytes::copy_from_slice(&c))
                        .collect();
                    return self
                        .reply(
                            KrpcMessage::get_peers_response_values(
                                t,
                                self.local.id(),
                                token.unwrap_or_default(),
                                values,
                            ),
                            src,
                        )
                        .await;
                }

                let closest = self.routing.read().find_closest_nodes(&target, CLOSEST_NODES);
                if closest.is_empty() {
                    return self
                        .reply(
                            KrpcMessage::error(t, KRPC_ERROR_GENERIC, "no known nodes"),
                            src,
                        )
                        .await;
                }

                self.reply(
                    KrpcMessage::get_peers_response_nodes(
                        t,
                        self.local.id(),
                        compact_nodes(&closest),
                    ),
                    src,
                )
                .await
            }

            Query::AnnouncePeer {
                info_hash,
                port,
                implied_port,
                token,
                ..
            } => {
                if info_hash.len() != 20 {
                    return self
                        .reply(
                            KrpcMessage::error(t, KRPC_ERROR_PROTOCOL, "invalid info_hash"),
                            src,
                        )
                        .await;
                }
                let Some(port) = port.filter(|p| (1..=65535).contains(p)) else {
                    return self
                        .reply(KrpcMessage::error(t, KRPC_ERROR_PROTOCOL, "invalid port"), src)
                        .await;
                };
                let Some(token) = token else {
                    return self
                        .reply(KrpcMessage::error(t, KRPC_ERROR_PROTOCOL, "missing token"), src)
                        .await;
                };

                let hex = info_hash_hex(&info_hash);
                let stored_token = self.store.read().find_token(&hex);
                if stored_token.is_some_and(|stored| stored != token) {
                    debug!("rejecting announce from {}: token mismatch", src);
                    return self
                        .reply(KrpcMessage::error(t, KRPC_ERROR_PROTOCOL, "invalid token"), src)
                        .await;
                }

                let download_port = if implied_port { src.port() } else { port as u16 };
                let peer = Endpoint::from(SocketAddr::new(src.ip(), download_port));
                if self.store.write().add(&hex, peer, &token) {
                    debug!("stored announced peer {}:{} for {}", src.ip(), download_port, hex);
                }

                self.reply(KrpcMessage::announce_peer_response(t, self.local.id()), src)
                    .await
            }

            Query::Unknown { .. } => unreachable!(),
        }
    }

    /// Consumes a response to one of our own requests.
    ///
    /// The stored query context decides how the response fields are read;
    /// the response itself carries no type tag. Anything that does not
    /// line up is dropped without a reply.
    async fn handle_response(
        &self,
        t: TransactionId,
        resp: Response,
        src: SocketAddr,
    ) -> Result<(), DhtError> {
        if !self.registry.lock().is_valid(&t) {
            debug!("dropping response from {} with stale transaction", src);
            return Ok(());
        }

        let Ok(responder_id) = NodeId::from_bytes(&resp.id) else {
            debug!("dropping response from {} with invalid id", src);
            return Ok(());
        };

        let ctx = {
            let mut registry = self.registry.lock();
            let ctx = registry.get(&t);
            registry.finish(&t);
            ctx
        };
        let Some(ctx) = ctx else {
            return Ok(());
        };

        let responder = Node::new(responder_id, Endpoint::from(src));

        match ctx.kind {
            QueryKind::Ping | QueryKind::AnnouncePeer => {
                self.routing.write().add(responder);
            }

            QueryKind::FindNode => {
                let Some(nodes) = &resp.nodes else {
                    return Ok(());
                };
                if nodes.len() % COMPACT_NODE_LEN != 0 {
                    debug!("dropping find_node response from {}: ragged nodes", src);
                    return Ok(());
                }

                let mut routing = self.routing.write();
                for chunk in nodes.chunks_exact(COMPACT_NODE_LEN) {
                    if let Some(node) = Node::from_compact(chunk) {
                        routing.add(node);
                    }
                }
                routing.add(responder);
            }

            QueryKind::GetPeers => {
                let Some(info_hash) = ctx.info_hash else {
                    return Ok(());
                };
                let hex = info_hash_hex(&info_hash);
                // The token travels back as the transaction id itself.
                let token = t.clone();

                if let Some(values) = &resp.values {
                    // Entries that are not exactly 6 bytes decode to None
                    // and fall out here.
                    let peers: Vec<Endpoint> = values
                        .iter()
                        .filter_map(|v| Endpoint::from_compact(v))
                        .collect();

                    let added = self.store.write().add_list(&hex, peers, &token);
                    if added > 0 {
                        info!("learned {} peers for {}", added, hex);
                    }
                } else if let Some(nodes) = &resp.nodes {
                    if nodes.len() % COMPACT_NODE_LEN == 0 {
                        // Walk the returned nodes toward the target.
                        for chunk in nodes.chunks_exact(COMPACT_NODE_LEN) {
                            if let Some(node) = Node::from_compact(chunk) {
                                self.send_get_peers(&node, &info_hash).await;
                            }
                        }
                    }
                }

                self.routing.write().add(responder);
            }
        }

        Ok(())
    }

    /// Logs an incoming KRPC error and retires its transaction.
    fn handle_error(&self, t: TransactionId, code: i64, message: &str) -> Result<(), DhtError> {
        let mut registry = self.registry.lock();
        if !registry.is_valid(&t) {
            return Ok(());
        }

        warn!("received krpc error {}: {}", code, message);
        registry.finish(&t);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Outbound request primitives
    // ------------------------------------------------------------------

    pub async fn send_ping(&self, addr: SocketAddr) {
        let t = self.borrow_tid(QueryKind::Ping, addr, None);
        let msg = KrpcMessage::ping_query(t, self.local.id());
        self.transmit(&msg, addr).await;
    }

    pub async fn send_find_node(&self, addr: SocketAddr, target: &NodeId) {
        let t = self.borrow_tid(QueryKind::FindNode, addr, None);
        let msg = KrpcMessage::find_node_query(t, self.local.id(), target);
        self.transmit(&msg, addr).await;
    }

    pub async fn send_get_peers(&self, node: &Node, info_hash: &[u8; 20]) {
        let Some(addr) = node.endpoint.to_socket_addr() else {
            debug!("cannot query unresolved endpoint {}", node.endpoint);
            return;
        };

        let t = self.borrow_tid(QueryKind::GetPeers, addr, Some(*info_hash));
        let msg = KrpcMessage::get_peers_query(t, self.local.id(), info_hash);
        self.transmit(&msg, addr).await;
    }

    /// Announces our own listen port, using the token pinned for the
    /// info-hash. Without a known token there is nothing to present and
    /// the announce is skipped.
    pub async fn send_announce_peer(&self, node: &Node, info_hash: &[u8; 20]) {
        let Some(addr) = node.endpoint.to_socket_addr() else {
            debug!("cannot announce to unresolved endpoint {}", node.endpoint);
            return;
        };

        let hex = info_hash_hex(info_hash);
        let Some(token) = self.store.read().find_token(&hex) else {
            debug!("no token known for {}, skipping announce", hex);
            return;
        };

        let t = self.borrow_tid(QueryKind::AnnouncePeer, addr, Some(*info_hash));
        let msg = KrpcMessage::announce_peer_query(
            t,
            self.local.id(),
            info_hash,
            self.port,
            false,
            token,
        );
        self.transmit(&msg, addr).await;
    }

    /// Pings a bootstrap endpoint, resolving its domain name first.
    pub async fn send_ping_bootstrap(&self, endpoint: &Endpoint) {
        let addr = match endpoint.to_socket_addr() {
            Some(addr) => Some(addr),
            None => {
                match tokio::net::lookup_host((endpoint.host_str().as_str(), endpoint.port)).await
                {
                    Ok(mut addrs) => addrs.find(|a| a.is_ipv4()),
                    Err(e) => {
                        warn!("failed to resolve bootstrap node {}: {}", endpoint, e);
                        return;
                    }
                }
            }
        };

        match addr {
            Some(addr) => {
                debug!("pinging bootstrap node {} at {}", endpoint, addr);
                self.send_ping(addr).await;
            }
            None => warn!("bootstrap node {} has no ipv4 address", endpoint),
        }
    }

    /// Issues `get_peers` for an info-hash to the closest nodes we know.
    ///
    /// Recursion happens in the response handler as closer nodes come
    /// back; discovered peers accumulate in the store.
    pub async fn lookup(&self, info_hash: &[u8; 20]) {
        let target = NodeId(*info_hash);
        let closest = self.routing.read().find_closest_nodes(&target, CLOSEST_NODES);

        if closest.is_empty() {
            warn!("no nodes to query for {}", info_hash_hex(info_hash));
            return;
        }

        for node in &closest {
            self.send_get_peers(node, info_hash).await;
        }
    }

    fn borrow_tid(
        &self,
        kind: QueryKind,
        addr: SocketAddr,
        info_hash: Option<[u8; 20]>,
    ) -> TransactionId {
        self.registry.lock().create(QueryContext {
            kind,
            addr,
            info_hash,
        })
    }

    /// Sends an outbound query; failures are logged, never retried.
    async fn transmit(&self, msg: &KrpcMessage, addr: SocketAddr) {
        let data = match msg.encode() {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to encode query: {}", e);
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&data, addr).await {
            warn!("send to {} failed: {}", addr, e);
        }
    }

    /// Sends a reply to a query we handled; send failures are logged.
    async fn reply(&self, msg: KrpcMessage, addr: SocketAddr) -> Result<(), DhtError> {
        let data = msg.encode()?;
        if let Err(e) = self.socket.send_to(&data, addr).await {
            warn!("reply to {} failed: {}", addr, e);
        }
        Ok(())
    }
}

/// Concatenates the compact form of every IPv4 node in the slice.
fn compact_nodes(nodes: &[Node]) -> Bytes {
    let compact: Vec<u8> = nodes
        .iter()
        .filter_map(|n| n.to_compact())
        .flatten()
        .collect();
    Bytes::from(compact)
}
