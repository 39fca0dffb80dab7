//! Drives real nodes against an in-memory peer transport: joins, lookups,
//! storage routing, graceful departure, crash failover and recovery.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chord_dht::node::error::NodeError;
use chord_dht::node::peer::{PeerInfo, PeerRpc};
use chord_dht::node::ChordNode;
use chord_dht::utils::crypto::{hash, HashPos};
use chord_dht::utils::types::Address;

type TestNode = ChordNode<TestNet>;

/// An in-memory network: peer calls dispatch straight into the target
/// node's handlers. A missing or crashed target is reported the way the
/// real transport reports it, as `Unreachable`.
#[derive(Clone, Default)]
struct TestNet {
    nodes: Arc<Mutex<HashMap<Address, Arc<TestNode>>>>,
}

impl TestNet {
    fn spawn(&self, address: &str) -> Arc<TestNode> {
        let node = Arc::new(ChordNode::new(address.to_string(), self.clone()));
        self.nodes
            .lock()
            .unwrap()
            .insert(address.to_string(), node.clone());
        node
    }

    fn target(&self, address: &Address) -> Result<Arc<TestNode>, NodeError> {
        let node = self
            .nodes
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or(NodeError::Unreachable)?;
        if node.is_crashed() {
            return Err(NodeError::Unreachable);
        }
        Ok(node)
    }
}

/// The real client cannot tell a crashed peer from a dead one.
fn classify(err: NodeError) -> NodeError {
    match err {
        NodeError::Unavailable => NodeError::Unreachable,
        other => other,
    }
}

#[tonic::async_trait]
impl PeerRpc for TestNet {
    async fn node_info(&self, address: &Address) -> Result<PeerInfo, NodeError> {
        Ok(self.target(address)?.peer_info())
    }

    async fn predecessor(&self, address: &Address) -> Result<Option<Address>, NodeError> {
        Ok(self.target(address)?.predecessor())
    }

    async fn successor(&self, address: &Address) -> Result<Address, NodeError> {
        Ok(self.target(address)?.successor())
    }

    async fn successor_list(&self, address: &Address) -> Result<Vec<Address>, NodeError> {
        Ok(self.target(address)?.successor_list())
    }

    async fn notify(&self, address: &Address, candidate: &Address) -> Result<(), NodeError> {
        self.target(address)?
            .handle_notify(candidate.clone())
            .map_err(classify)
    }

    async fn update_predecessor(
        &self,
        address: &Address,
        predecessor: Option<&Address>,
    ) -> Result<(), NodeError> {
        self.target(address)?
            .force_set_predecessor(predecessor.cloned())
            .map_err(classify)
    }

    async fn update_successor(
        &self,
        address: &Address,
        successor: &Address,
    ) -> Result<(), NodeError> {
        self.target(address)?
            .force_set_successor(successor.clone())
            .map_err(classify)
    }

    async fn find_successor(&self, address: &Address, pos: &HashPos) -> Result<Address, NodeError> {
        self.target(address)?.find_successor(pos).await.map_err(classify)
    }

    async fn storage_put(
        &self,
        address: &Address,
        key: &str,
        value: &str,
    ) -> Result<(), NodeError> {
        self.target(address)?
            .serve_put(key.to_string(), value.to_string())
            .map_err(classify)
    }

    async fn storage_get(&self, address: &Address, key: &str) -> Result<String, NodeError> {
        self.target(address)?.serve_get(key).map_err(classify)
    }

    async fn health(&self, address: &Address) -> Result<(), NodeError> {
        self.target(address)?;
        Ok(())
    }
}

/// One maintenance tick over the given nodes, crashed ones skipped the way
/// the maintenance loop skips them.
async fn tick(nodes: &[&Arc<TestNode>]) {
    for node in nodes {
        if !node.is_crashed() {
            node.stabilize().await;
        }
    }
    for node in nodes {
        if !node.is_crashed() {
            node.fix_fingers().await;
        }
    }
    for node in nodes {
        if !node.is_crashed() {
            node.check_predecessor().await;
        }
    }
}

async fn ticks(nodes: &[&Arc<TestNode>], rounds: usize) {
    for _ in 0..rounds {
        tick(nodes).await;
    }
}

/// Spawns `count` nodes, joins them all through the first one and runs the
/// maintenance loop until the ring has converged.
async fn build_ring(net: &TestNet, count: usize) -> Vec<Arc<TestNode>> {
    let mut nodes = Vec::new();
    for i in 0..count {
        nodes.push(net.spawn(&format!("localhost:70{:02}", i + 1)));
    }
    for node in nodes.iter().skip(1) {
        node.join(nodes[0].address()).await.unwrap();
    }
    let refs: Vec<&Arc<TestNode>> = nodes.iter().collect();
    ticks(&refs, 2 * count + 2).await;
    nodes
}

/// Nodes sorted clockwise by ring position.
fn ring_order(nodes: &[Arc<TestNode>]) -> Vec<Arc<TestNode>> {
    let mut ordered = nodes.to_vec();
    ordered.sort_by_key(|node| *node.pos());
    ordered
}

/// The node responsible for `pos` among the given nodes: the first node
/// clockwise at or after `pos`.
fn oracle(nodes: &[&Arc<TestNode>], pos: &HashPos) -> Address {
    let mut ids: Vec<(HashPos, Address)> = nodes
        .iter()
        .map(|node| (*node.pos(), node.address().clone()))
        .collect();
    ids.sort();
    for (id, address) in &ids {
        if id >= pos {
            return address.clone();
        }
    }
    ids[0].1.clone()
}

fn random_pos(rng: &mut StdRng) -> HashPos {
    let mut bytes = [0u8; 20];
    rng.fill(&mut bytes[..]);
    HashPos::from_be_bytes(bytes)
}

#[tokio::test]
async fn single_node_stores_and_returns_values() {
    let net = TestNet::default();
    let a = net.spawn("localhost:7001");

    a.put("foo", "bar").await.unwrap();
    assert_eq!(a.get("foo").await.unwrap(), "bar");
    assert_eq!(a.get("missing").await, Err(NodeError::KeyNotFound));

    assert_eq!(a.successor(), *a.address());
    assert_eq!(a.predecessor(), None);
}

#[tokio::test]
async fn two_nodes_link_up_and_route_storage() {
    let net = TestNet::default();
    let a = net.spawn("localhost:7001");
    let b = net.spawn("localhost:7002");

    b.join(a.address()).await.unwrap();
    let refs = [&a, &b];
    ticks(&refs, 3).await;

    assert_eq!(a.successor(), *b.address());
    assert_eq!(b.successor(), *a.address());
    assert_eq!(a.predecessor(), Some(b.address().clone()));
    assert_eq!(b.predecessor(), Some(a.address().clone()));

    // exactly one of the two owns any key, and routing hides which one
    let pos = hash(b"key1");
    assert_ne!(a.owns(&pos), b.owns(&pos));
    a.put("key1", "v1").await.unwrap();
    assert_eq!(b.get("key1").await.unwrap(), "v1");
    assert_eq!(a.get("key1").await.unwrap(), "v1");
}

#[tokio::test]
async fn join_is_idempotent() {
    let net = TestNet::default();
    let a = net.spawn("localhost:7001");
    let b = net.spawn("localhost:7002");

    b.join(a.address()).await.unwrap();
    let refs = [&a, &b];
    ticks(&refs, 3).await;

    let successor_before = b.successor();
    let predecessor_before = b.predecessor();
    b.join(a.address()).await.unwrap();
    assert_eq!(b.successor(), successor_before);
    assert_eq!(b.predecessor(), predecessor_before);
}

#[tokio::test]
async fn four_node_ring_converges_and_routes_like_the_oracle() {
    let net = TestNet::default();
    let nodes = build_ring(&net, 4).await;
    let ordered = ring_order(&nodes);

    // successor and predecessor pointers form the sorted cycle
    for i in 0..4 {
        let next = &ordered[(i + 1) % 4];
        assert_eq!(ordered[i].successor(), *next.address());
        assert_eq!(next.predecessor(), Some(ordered[i].address().clone()));
    }

    // successor lists cover the three other nodes, in ring order
    for i in 0..4 {
        let list = ordered[i].successor_list();
        assert_eq!(list.len(), 3);
        assert_eq!(list.iter().collect::<HashSet<_>>().len(), 3);
        assert!(!list.contains(ordered[i].address()));
        for (j, entry) in list.iter().enumerate() {
            assert_eq!(entry, ordered[(i + j + 1) % 4].address());
        }
    }

    // lookups from every node agree with the oracle
    let refs: Vec<&Arc<TestNode>> = nodes.iter().collect();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let pos = random_pos(&mut rng);
        let expected = oracle(&refs, &pos);
        for node in &nodes {
            assert_eq!(node.find_successor(&pos).await.unwrap(), expected);
        }
    }

    // a position equal to a node id resolves to that node
    for target in &nodes {
        for node in &nodes {
            assert_eq!(
                node.find_successor(target.pos()).await.unwrap(),
                *target.address()
            );
        }
    }

    // wrap-around: just past the highest node id routes to the lowest
    let highest = ordered[3].pos();
    let wrapped = highest.wrapping_add_pow2(0);
    if wrapped != *ordered[0].pos() {
        assert_eq!(
            ordered[0].find_successor(&wrapped).await.unwrap(),
            *ordered[0].address()
        );
    }
}

#[tokio::test]
async fn storage_round_trips_from_any_node() {
    let net = TestNet::default();
    let nodes = build_ring(&net, 4).await;

    for (i, node) in nodes.iter().enumerate() {
        let key = format!("key-{}", i);
        let value = format!("value-{}", i);
        node.put(&key, &value).await.unwrap();
        for other in &nodes {
            assert_eq!(other.get(&key).await.unwrap(), value);
        }
    }

    // overwriting is idempotent
    nodes[0].put("key-0", "value-0").await.unwrap();
    assert_eq!(nodes[1].get("key-0").await.unwrap(), "value-0");
}

#[tokio::test]
async fn graceful_leave_relinks_the_ring() {
    let net = TestNet::default();
    let nodes = build_ring(&net, 4).await;
    let ordered = ring_order(&nodes);

    let leaver = &ordered[1];
    let before = &ordered[0];
    let after = &ordered[2];

    leaver.leave().await.unwrap();

    // neighbours are linked to each other right away
    assert_eq!(before.successor(), *after.address());
    assert_eq!(after.predecessor(), Some(before.address().clone()));
    assert_eq!(leaver.successor(), *leaver.address());
    assert_eq!(leaver.predecessor(), None);

    // the remaining ring keeps converging and routing correctly
    let rest = [before, after, &ordered[3]];
    ticks(&rest, 4).await;

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let pos = random_pos(&mut rng);
        let expected = oracle(&rest, &pos);
        for node in &rest {
            assert_eq!(node.find_successor(&pos).await.unwrap(), expected);
        }
    }
}

#[tokio::test]
async fn leaving_a_two_node_ring_leaves_a_clean_single_node() {
    let net = TestNet::default();
    let a = net.spawn("localhost:7001");
    let b = net.spawn("localhost:7002");

    b.join(a.address()).await.unwrap();
    let refs = [&a, &b];
    ticks(&refs, 3).await;

    b.leave().await.unwrap();

    // the survivor is a clean single-node ring, not linked to itself
    assert_eq!(a.successor(), *a.address());
    assert_eq!(a.predecessor(), None);
    a.put("still", "works").await.unwrap();
    assert_eq!(a.get("still").await.unwrap(), "works");
}

#[tokio::test]
async fn crash_fails_over_to_the_successor_list() {
    let net = TestNet::default();
    let nodes = build_ring(&net, 4).await;
    let ordered = ring_order(&nodes);

    let crashed = &ordered[1];
    let before = &ordered[0];
    let after = &ordered[2];

    crashed.sim_crash();

    // the first stabilize already moves the successor past the dead node
    before.stabilize().await;
    assert_eq!(before.successor(), *after.address());

    let live = [before, after, &ordered[3]];
    ticks(&live, 3).await;

    // the dead node's predecessor link is repaired too
    assert_eq!(after.predecessor(), Some(before.address().clone()));

    // lookups from any live node resolve to live nodes only
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..100 {
        let pos = random_pos(&mut rng);
        let expected = oracle(&live, &pos);
        for node in &live {
            let resolved = node.find_successor(&pos).await.unwrap();
            assert_ne!(resolved, *crashed.address());
            assert_eq!(resolved, expected);
        }
    }

    // storage routes around the crash; keys the dead node held are lost
    before.put("fresh", "data").await.unwrap();
    assert_eq!(ordered[3].get("fresh").await.unwrap(), "data");
}

#[tokio::test]
async fn crashed_node_recovers_and_rejoins() {
    let net = TestNet::default();
    let nodes = build_ring(&net, 4).await;
    let ordered = ring_order(&nodes);

    let crashed = &ordered[1];
    crashed.sim_crash();

    let live = [&ordered[0], &ordered[2], &ordered[3]];
    ticks(&live, 3).await;

    crashed.sim_recover().await;
    assert!(!crashed.is_crashed());

    let all: Vec<&Arc<TestNode>> = ordered.iter().collect();
    ticks(&all, 4).await;

    // the full cycle is restored
    for i in 0..4 {
        let next = &ordered[(i + 1) % 4];
        assert_eq!(ordered[i].successor(), *next.address());
        assert_eq!(next.predecessor(), Some(ordered[i].address().clone()));
    }

    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..100 {
        let pos = random_pos(&mut rng);
        let expected = oracle(&all, &pos);
        assert_eq!(ordered[0].find_successor(&pos).await.unwrap(), expected);
    }
}

#[tokio::test]
async fn losing_every_successor_collapses_to_a_single_node_ring() {
    let net = TestNet::default();
    let a = net.spawn("localhost:7001");
    let b = net.spawn("localhost:7002");

    b.join(a.address()).await.unwrap();
    let refs = [&a, &b];
    ticks(&refs, 3).await;

    b.sim_crash();
    a.stabilize().await;
    a.check_predecessor().await;

    assert_eq!(a.successor(), *a.address());
    assert_eq!(a.predecessor(), None);

    // alone again, the node owns everything
    a.put("solo", "value").await.unwrap();
    assert_eq!(a.get("solo").await.unwrap(), "value");
}
