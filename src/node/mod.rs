use std::sync::{Mutex, RwLock};

use log::{debug, info};

use crate::node::error::NodeError;
use crate::node::peer::{GrpcPeer, PeerInfo, PeerRpc};
use crate::node::ring::RingState;
use crate::node::successor_list::SuccessorList;
use crate::utils::crypto::{hash, in_interval_open, in_interval_open_closed, HashPos};
use crate::utils::types::{Address, KvStore};

pub mod error;
pub mod finger_table;
pub mod lookup;
pub mod peer;
pub mod ring;
pub mod stabilize;
pub mod successor_list;

/// The node type used by the running process.
pub type DhtNode = ChordNode<GrpcPeer>;

/// One node of the DHT: its immutable ring identity, the mutable ring state
/// and the local slice of the key value store. Generic over the peer RPC
/// transport so the ring logic can be driven against an in-memory network.
pub struct ChordNode<P> {
    /// peer RPC address of the node, also its ring identity
    address: Address,
    /// position in the hash ring
    pos: HashPos,
    /// successor, predecessor, successor list, finger table, crash flag
    ring: RwLock<RingState>,
    /// key value storage, independent of ring topology
    kv_store: Mutex<KvStore>,
    /// outbound peer RPC transport
    peer: P,
}

impl<P: PeerRpc> ChordNode<P> {
    pub fn new(address: Address, peer: P) -> Self {
        let pos = hash(address.as_bytes());
        info!("Initializing node {} at ring position {}", address, pos);
        let ring = RingState::single_node(&address, &pos);
        ChordNode {
            address,
            pos,
            ring: RwLock::new(ring),
            kv_store: Mutex::new(KvStore::new()),
            peer,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn pos(&self) -> &HashPos {
        &self.pos
    }

    pub(crate) fn peer(&self) -> &P {
        &self.peer
    }

    /// Atomic snapshot of the ring state for a routing decision.
    pub fn ring_snapshot(&self) -> RingState {
        self.ring.read().unwrap().clone()
    }

    pub fn is_crashed(&self) -> bool {
        self.ring.read().unwrap().crashed
    }

    pub fn successor(&self) -> Address {
        self.ring.read().unwrap().successor.clone()
    }

    pub fn predecessor(&self) -> Option<Address> {
        self.ring.read().unwrap().predecessor.clone()
    }

    pub fn successor_list(&self) -> Vec<Address> {
        self.ring.read().unwrap().successor_list.successors.clone()
    }

    pub fn finger_addresses(&self) -> Vec<Address> {
        self.ring.read().unwrap().finger_table.distinct_addresses()
    }

    /// Responsibility predicate: this node owns a key iff the key's position
    /// lies in `(predecessor, self]`. Without a predecessor the node only
    /// owns anything when it forms a single-node ring; otherwise operations
    /// forward through the lookup path until stabilization fills the gap.
    pub fn owns(&self, key_pos: &HashPos) -> bool {
        let ring = self.ring.read().unwrap();
        match ring.predecessor {
            Some(ref predecessor) => {
                in_interval_open_closed(key_pos, &hash(predecessor.as_bytes()), &self.pos)
            }
            None => ring.successor == self.address,
        }
    }

    /// The view of this node served to peers by `GetNodeInfo`.
    pub fn peer_info(&self) -> PeerInfo {
        let ring = self.ring.read().unwrap();
        PeerInfo {
            address: self.address.clone(),
            pos: self.pos,
            successor: ring.successor.clone(),
            predecessor: ring.predecessor.clone(),
            finger_table: ring.finger_table.distinct_addresses(),
            successor_list: ring.successor_list.successors.clone(),
        }
    }

    /// Peer-side notify: adopt the candidate as predecessor if none is known
    /// or it lies in `(predecessor, self)`. A candidate further back on the
    /// ring than the current predecessor is ignored.
    pub fn handle_notify(&self, candidate: Address) -> Result<(), NodeError> {
        if candidate == self.address {
            return Ok(());
        }
        let mut ring = self.ring.write().unwrap();
        if ring.crashed {
            return Err(NodeError::Unavailable);
        }
        let accept = match ring.predecessor {
            None => true,
            Some(ref predecessor) => in_interval_open(
                &hash(candidate.as_bytes()),
                &hash(predecessor.as_bytes()),
                &self.pos,
            ),
        };
        if accept {
            debug!("Updating predecessor to {} due to notify", candidate);
            ring.predecessor = Some(candidate);
        }
        Ok(())
    }

    /// Force-set of the predecessor, used by a gracefully leaving neighbour.
    pub fn force_set_predecessor(&self, predecessor: Option<Address>) -> Result<(), NodeError> {
        let mut ring = self.ring.write().unwrap();
        if ring.crashed {
            return Err(NodeError::Unavailable);
        }
        info!("Predecessor force-set to {:?}", predecessor);
        ring.predecessor = predecessor;
        Ok(())
    }

    /// Force-set of the successor, used by a gracefully leaving neighbour.
    pub fn force_set_successor(&self, successor: Address) -> Result<(), NodeError> {
        let mut ring = self.ring.write().unwrap();
        if ring.crashed {
            return Err(NodeError::Unavailable);
        }
        info!("Successor force-set to {}", successor);
        let list = SuccessorList::rebuild(&successor, &ring.successor_list.successors, &self.address);
        ring.adopt_successor(list, &self.address);
        Ok(())
    }

    fn put_local(&self, key: String, value: String) {
        debug!("Storing key {} locally", key);
        self.kv_store.lock().unwrap().insert(key, value);
    }

    fn get_local(&self, key: &str) -> Result<String, NodeError> {
        self.kv_store
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(NodeError::KeyNotFound)
    }

    /// Peer-side PUT, only accepted when this node is responsible.
    pub fn serve_put(&self, key: String, value: String) -> Result<(), NodeError> {
        if self.is_crashed() {
            return Err(NodeError::Unavailable);
        }
        if !self.owns(&hash(key.as_bytes())) {
            return Err(NodeError::NotResponsible);
        }
        self.put_local(key, value);
        Ok(())
    }

    /// Peer-side GET, only answered when this node is responsible.
    pub fn serve_get(&self, key: &str) -> Result<String, NodeError> {
        if self.is_crashed() {
            return Err(NodeError::Unavailable);
        }
        if !self.owns(&hash(key.as_bytes())) {
            return Err(NodeError::NotResponsible);
        }
        self.get_local(key)
    }

    /// Client-facing PUT: store locally when responsible, otherwise forward
    /// to the node the lookup engine resolves. Forward failures surface as
    /// transient errors, the operation is not retried internally.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), NodeError> {
        if self.is_crashed() {
            return Err(NodeError::Unavailable);
        }
        let key_pos = hash(key.as_bytes());
        if self.owns(&key_pos) {
            self.put_local(key.to_string(), value.to_string());
            return Ok(());
        }
        let responsible = self.find_successor(&key_pos).await?;
        if responsible == self.address {
            self.put_local(key.to_string(), value.to_string());
            return Ok(());
        }
        debug!("Forwarding PUT for key {} to {}", key, responsible);
        self.peer.storage_put(&responsible, key, value).await
    }

    /// Client-facing GET, the read counterpart of [`ChordNode::put`].
    pub async fn get(&self, key: &str) -> Result<String, NodeError> {
        if self.is_crashed() {
            return Err(NodeError::Unavailable);
        }
        let key_pos = hash(key.as_bytes());
        if self.owns(&key_pos) {
            return self.get_local(key);
        }
        let responsible = self.find_successor(&key_pos).await?;
        if responsible == self.address {
            return self.get_local(key);
        }
        debug!("Forwarding GET for key {} to {}", key, responsible);
        self.peer.storage_get(&responsible, key).await
    }
}
