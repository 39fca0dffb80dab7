use log::{debug, info, warn};

use crate::node::error::NodeError;
use crate::node::peer::PeerRpc;
use crate::node::successor_list::SuccessorList;
use crate::node::ChordNode;
use crate::utils::crypto::{hash, in_interval_open, in_interval_open_closed, HashPos};
use crate::utils::types::Address;

impl<P: PeerRpc> ChordNode<P> {
    /// One round of the stabilization protocol: refresh the view of the
    /// immediate neighbourhood, then announce ourselves to the successor.
    pub async fn stabilize(&self) {
        let (successor, own_predecessor) = {
            let ring = self.ring.read().unwrap();
            (ring.successor.clone(), ring.predecessor.clone())
        };

        // the successor's predecessor may be a node that joined between us
        let pred_of_successor = if successor == self.address {
            Ok(own_predecessor)
        } else {
            self.peer().predecessor(&successor).await
        };

        let candidate = match pred_of_successor {
            Ok(candidate) => candidate,
            Err(NodeError::Unreachable) => {
                info!("Successor {} is unreachable, failing over", successor);
                self.succeed_to_next_live(&successor).await;
                return;
            }
            Err(other) => {
                warn!("stabilize: reading predecessor of {} failed: {}", successor, other);
                return;
            }
        };

        let mut new_successor = successor;
        if let Some(candidate) = candidate {
            if candidate != self.address
                && in_interval_open(
                    &hash(candidate.as_bytes()),
                    &self.pos,
                    &hash(new_successor.as_bytes()),
                )
            {
                debug!("Adopting {} as new successor", candidate);
                new_successor = candidate;
            }
        }
        self.adopt_and_notify(&new_successor).await;
    }

    /// Refreshes the successor list from `successor`, commits the new
    /// neighbourhood as one group and notifies the successor. Falls over to
    /// the successor list when `successor` went away in the meantime.
    async fn adopt_and_notify(&self, successor: &Address) {
        if successor == &self.address {
            // alone in the ring, nothing to refresh or notify
            let mut ring = self.ring.write().unwrap();
            let list = SuccessorList::new(&self.address);
            ring.adopt_successor(list, &self.address);
            return;
        }
        match self.peer().successor_list(successor).await {
            Ok(remote) => {
                let list = SuccessorList::rebuild(successor, &remote, &self.address);
                {
                    let mut ring = self.ring.write().unwrap();
                    ring.adopt_successor(list, &self.address);
                }
                if let Err(err) = self.peer().notify(successor, &self.address).await {
                    debug!("notify to {} failed: {}", successor, err);
                }
            }
            Err(NodeError::Unreachable) => {
                info!("Successor {} became unreachable, failing over", successor);
                self.succeed_to_next_live(successor).await;
            }
            Err(other) => {
                warn!(
                    "stabilize: refreshing successor list from {} failed: {}",
                    successor, other
                );
            }
        }
    }

    /// Failover: adopt the first live entry of the successor list; with
    /// every entry dead, collapse back to a single-node ring.
    pub(crate) async fn succeed_to_next_live(&self, failed: &Address) {
        let successors = self.successor_list();
        for candidate in &successors {
            if candidate == failed || candidate == &self.address {
                continue;
            }
            if let Ok(remote) = self.peer().successor_list(candidate).await {
                info!("Failing over to successor {}", candidate);
                let list = SuccessorList::rebuild(candidate, &remote, &self.address);
                {
                    let mut ring = self.ring.write().unwrap();
                    ring.adopt_successor(list, &self.address);
                }
                if let Err(err) = self.peer().notify(candidate, &self.address).await {
                    debug!("notify to {} failed: {}", candidate, err);
                }
                return;
            }
        }
        warn!("Every known successor is unreachable, collapsing to a single-node ring");
        self.ring.write().unwrap().reset_to_single(&self.address);
    }

    /// Rebuilds the finger table through the lookup engine. Consecutive
    /// finger starts usually resolve to the same node, so the previous
    /// result is reused for every start it still covers and a full refresh
    /// costs one lookup per distinct successor rather than one per bit.
    pub async fn fix_fingers(&self) {
        let mut resolved: Vec<(usize, Address)> = Vec::new();
        let mut previous: Option<(HashPos, Address)> = None;
        for index in 0..HashPos::BITS {
            let start = self.pos.wrapping_add_pow2(index);
            if let Some((previous_start, ref address)) = previous {
                if in_interval_open_closed(&start, &previous_start, &hash(address.as_bytes())) {
                    resolved.push((index, address.clone()));
                    continue;
                }
            }
            match self.find_successor(&start).await {
                Ok(address) => {
                    resolved.push((index, address.clone()));
                    previous = Some((start, address));
                }
                Err(err) => {
                    // keep the stale entry, routing re-validates it anyway
                    debug!("fix_fingers: lookup for finger {} failed: {}", index, err);
                    previous = None;
                }
            }
        }
        let mut ring = self.ring.write().unwrap();
        for (index, address) in resolved {
            ring.finger_table.set_finger(index, address);
        }
    }

    /// Clears the predecessor once it stops answering health probes.
    pub async fn check_predecessor(&self) {
        let predecessor = match self.predecessor() {
            Some(predecessor) if predecessor != self.address => predecessor,
            _ => return,
        };
        if self.peer().health(&predecessor).await.is_err() {
            info!("Predecessor {} is unreachable, clearing it", predecessor);
            let mut ring = self.ring.write().unwrap();
            if ring.predecessor.as_ref() == Some(&predecessor) {
                ring.predecessor = None;
            }
        }
    }

    /// Joins the ring through `bootstrap`: the bootstrap peer resolves the
    /// node responsible for our own position, which becomes our successor.
    /// The following stabilize/notify rounds converge the ring.
    pub async fn join(&self, bootstrap: &Address) -> Result<(), NodeError> {
        if bootstrap == &self.address {
            return Err(NodeError::InvalidRequest(
                "cannot join through own address".to_string(),
            ));
        }
        let successor = self.peer().find_successor(bootstrap, &self.pos).await?;
        if successor == self.address {
            // the ring already routes our position to us, nothing to do
            return Ok(());
        }
        info!("Joining the ring via {}, successor is {}", bootstrap, successor);
        {
            let mut ring = self.ring.write().unwrap();
            ring.predecessor = None;
            let list = SuccessorList::new(&successor);
            ring.adopt_successor(list, &self.address);
        }
        self.stabilize().await;
        Ok(())
    }

    /// Graceful departure: link predecessor and successor to each other,
    /// then revert to a single-node ring. Stored keys are not transferred.
    pub async fn leave(&self) -> Result<(), NodeError> {
        let (successor, predecessor) = {
            let ring = self.ring.read().unwrap();
            (ring.successor.clone(), ring.predecessor.clone())
        };
        if successor != self.address {
            if let Some(ref predecessor) = predecessor {
                if let Err(err) = self.peer().update_successor(predecessor, &successor).await {
                    warn!("leave: updating successor of {} failed: {}", predecessor, err);
                }
            }
            // in a two-node ring predecessor == successor; the survivor gets
            // an empty predecessor instead of a link to itself
            let new_predecessor = predecessor.filter(|predecessor| predecessor != &successor);
            if let Err(err) = self
                .peer()
                .update_predecessor(&successor, new_predecessor.as_ref())
                .await
            {
                warn!("leave: updating predecessor of {} failed: {}", successor, err);
            }
        }
        info!("Left the ring, reverting to a single-node ring");
        let mut ring = self.ring.write().unwrap();
        ring.reset_to_single(&self.address);
        ring.last_known_successor = None;
        Ok(())
    }

    /// Simulated crash: peers see "unavailable" on every call and the
    /// maintenance loop stops touching ring state.
    pub fn sim_crash(&self) {
        info!("Simulating a crash");
        self.ring.write().unwrap().crashed = true;
    }

    /// Recovery re-joins through the last known successor, falling back to
    /// the remembered successor list, and stabilizes before the node starts
    /// answering again. With no reachable candidate the node restarts as a
    /// single-node ring.
    pub async fn sim_recover(&self) {
        let (crashed, mut candidates) = {
            let ring = self.ring.read().unwrap();
            let mut candidates: Vec<Address> = Vec::new();
            if let Some(ref last) = ring.last_known_successor {
                candidates.push(last.clone());
            }
            for address in &ring.successor_list.successors {
                if !candidates.contains(address) {
                    candidates.push(address.clone());
                }
            }
            (ring.crashed, candidates)
        };
        if !crashed {
            return;
        }
        candidates.retain(|candidate| candidate != &self.address);
        info!("Recovering, re-join candidates: {:?}", candidates);

        let mut rejoined = false;
        for candidate in &candidates {
            match self.join(candidate).await {
                Ok(()) => {
                    rejoined = true;
                    break;
                }
                Err(err) => debug!("recover: join via {} failed: {}", candidate, err),
            }
        }
        if !rejoined {
            if !candidates.is_empty() {
                warn!("Recovery found no reachable peer, restarting as a single-node ring");
            }
            self.ring.write().unwrap().reset_to_single(&self.address);
        }
        self.ring.write().unwrap().crashed = false;
    }
}
