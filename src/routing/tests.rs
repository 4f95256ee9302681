use super::table::{test_add_one as add_one, test_midpoint as midpoint};
use super::*;
use crate::endpoint::{Endpoint, Host};
use crate::id::NodeId;
use crate::node::Node;

fn id_with_first_byte(b: u8) -> NodeId {
    let mut id = [0u8; 20];
    id[0] = b;
    NodeId(id)
}

fn id_with_last_byte(b: u8) -> NodeId {
    let mut id = [0u8; 20];
    id[19] = b;
    NodeId(id)
}

fn node_at(id: NodeId, addr: &str, port: u16) -> Node {
    Node::new(id, Endpoint::new(addr, port).unwrap())
}

fn node(id: NodeId) -> Node {
    node_at(id, "10.0.0.1", 6881)
}

#[test]
fn test_midpoint_of_full_range() {
    let lo = [0u8; 20];
    let hi = [0xFF; 20];

    let mid = midpoint(&lo, &hi);
    let mut expected = [0xFF; 20];
    expected[0] = 0x7F;
    assert_eq!(mid, expected);
}

#[test]
fn test_midpoint_of_adjacent_pair() {
    let mut lo = [0u8; 20];
    lo[19] = 2;
    let mut hi = [0u8; 20];
    hi[19] = 3;

    // [2, 3] splits into [2, 2] and [3, 3].
    assert_eq!(midpoint(&lo, &hi), lo);
}

#[test]
fn test_add_one_carries() {
    let mut bytes = [0u8; 20];
    bytes[19] = 0xFF;
    add_one(&mut bytes);
    assert_eq!(bytes[18], 1);
    assert_eq!(bytes[19], 0);
}

#[test]
fn test_partition_has_160_buckets() {
    for _ in 0..5 {
        let table = RoutingTable::new(NodeId::random());
        assert_eq!(table.buckets().len(), 160);
    }
}

#[test]
fn test_partition_covers_space_except_local_id() {
    let local = NodeId::random();
    let table = RoutingTable::new(local);

    let mut ranges: Vec<([u8; 20], [u8; 20])> = table
        .buckets()
        .iter()
        .map(|b| (b.start().0, b.end().0))
        .collect();
    ranges.sort();

    // Walk the sorted ranges: each must start where the previous ended,
    // with a single one-id hole exactly at the local id.
    let mut cursor = [0u8; 20];
    for (start, end) in &ranges {
        if cursor == local.0 {
            add_one(&mut cursor);
        }
        assert_eq!(*start, cursor, "gap or overlap before {:?}", start);
        assert!(start <= end);
        cursor = *end;
        add_one(&mut cursor);
    }

    // The last range ends at the top of the space (or one short of it when
    // the local id is the maximum), so the cursor has wrapped to zero or
    // sits on the local id.
    assert!(cursor == [0u8; 20] || cursor == local.0);
}

#[test]
fn test_no_bucket_covers_local_id() {
    let local = NodeId::random();
    let table = RoutingTable::new(local);
    assert!(!table.buckets().iter().any(|b| b.covers(&local)));
}

#[test]
fn test_every_other_id_has_exactly_one_bucket() {
    let local = NodeId::random();
    let table = RoutingTable::new(local);

    for _ in 0..200 {
        let id = NodeId::random();
        if id == local {
            continue;
        }
        let covering = table.buckets().iter().filter(|b| b.covers(&id)).count();
        assert_eq!(covering, 1, "id {} covered by {} buckets", id, covering);
    }
}

#[test]
fn test_add_rejects_local_id() {
    let local = NodeId::random();
    let mut table = RoutingTable::new(local);
    assert!(!table.add(node(local)));
    assert_eq!(table.node_count(), 0);
}

#[test]
fn test_add_is_newly_inserted_flag() {
    let mut table = RoutingTable::new(id_with_first_byte(0xAA));

    let n = node(id_with_last_byte(1));
    assert!(table.add(n.clone()));
    assert!(!table.add(n));
    assert_eq!(table.node_count(), 1);
}

#[test]
fn test_readd_refreshes_contact_in_place() {
    let mut table = RoutingTable::new(id_with_first_byte(0xAA));
    let id = id_with_last_byte(1);

    table.add(node_at(id, "10.0.0.1", 6881));
    let before = table.find(&id).unwrap().active_at();

    assert!(!table.add(node_at(id, "10.0.0.2", 7000)));
    let refreshed = table.find(&id).unwrap();
    assert_eq!(refreshed.endpoint, Endpoint::new("10.0.0.2", 7000).unwrap());
    assert!(refreshed.active_at() >= before);
}

#[test]
fn test_full_bucket_evicts_tail() {
    // Local id at the bottom of the space puts the whole top half in one
    // bucket, so nine ids with the high bit set all compete for it.
    let mut table = RoutingTable::new(NodeId([0u8; 20]));

    for i in 0..9u8 {
        assert!(table.add(node(id_with_first_byte(0x80 + i))));
    }

    let bucket = &table.buckets()[0];
    assert_eq!(bucket.len(), 8);

    // The first-inserted of the original eight is gone, the ninth leads.
    assert!(table.find(&id_with_first_byte(0x80)).is_none());
    let head = bucket.nodes().next().unwrap();
    assert_eq!(head.id, id_with_first_byte(0x88));
}

#[test]
fn test_bucket_members_stay_in_range() {
    let mut table = RoutingTable::new(NodeId::random());

    for _ in 0..100 {
        table.add(node(NodeId::random()));
    }

    for bucket in table.buckets() {
        assert!(bucket.len() <= crate::constants::BUCKET_CAPACITY);
        for n in bucket.nodes() {
            assert!(bucket.covers(&n.id));
        }
    }
}

#[test]
fn test_find_closest_nodes_orders_by_distance() {
    let mut table = RoutingTable::new(id_with_first_byte(0xAA));

    table.add(node(id_with_last_byte(0x04)));
    table.add(node(NodeId([0xFF; 20])));
    table.add(node(id_with_last_byte(0x01)));
    table.add(node(id_with_last_byte(0x02)));

    let closest = table.find_closest_nodes(&NodeId([0u8; 20]), 3);
    let ids: Vec<NodeId> = closest.iter().map(|n| n.id).collect();
    assert_eq!(
        ids,
        vec![
            id_with_last_byte(0x01),
            id_with_last_byte(0x02),
            id_with_last_byte(0x04),
        ]
    );
}

#[test]
fn test_find_closest_nodes_caps_at_population() {
    let mut table = RoutingTable::new(NodeId::random());
    table.add(node(NodeId::random()));
    table.add(node(NodeId::random()));

    assert_eq!(table.find_closest_nodes(&NodeId::random(), 8).len(), 2);
}

#[test]
fn test_bucket_closest_nodes() {
    let mut bucket = Bucket::new(NodeId([0u8; 20]), NodeId([0x7F; 20]));
    bucket.add(node(id_with_last_byte(0x08)));
    bucket.add(node(id_with_last_byte(0x01)));
    bucket.add(node(id_with_last_byte(0x03)));

    let closest = bucket.closest_nodes(&NodeId([0u8; 20]), 2);
    assert_eq!(closest.len(), 2);
    assert_eq!(closest[0].id, id_with_last_byte(0x01));
    assert_eq!(closest[1].id, id_with_last_byte(0x03));
}

#[test]
fn test_remove_by_id() {
    let mut table = RoutingTable::new(id_with_first_byte(0xAA));
    let id = id_with_last_byte(9);

    table.add(node(id));
    assert!(table.remove_by_id(&id).is_some());
    assert!(table.remove_by_id(&id).is_none());
    assert_eq!(table.node_count(), 0);
}

#[test]
fn test_remove_by_ip_drops_all_matches() {
    let mut table = RoutingTable::new(id_with_first_byte(0xAA));

    table.add(node_at(id_with_last_byte(1), "192.0.2.7", 6881));
    table.add(node_at(id_with_first_byte(0x01), "192.0.2.7", 6999));
    table.add(node_at(id_with_first_byte(0xF0), "198.51.100.3", 6881));

    let host = Host::V4("192.0.2.7".parse().unwrap());
    assert_eq!(table.remove_by_ip(&host), 2);
    assert_eq!(table.node_count(), 1);
    assert!(table.find(&id_with_first_byte(0xF0)).is_some());
}

#[test]
fn test_random_node() {
    let mut table = RoutingTable::new(id_with_first_byte(0xAA));
    assert!(table.random_node().is_none());

    let id = id_with_last_byte(5);
    table.add(node(id));
    assert_eq!(table.random_node().unwrap().id, id);
}
