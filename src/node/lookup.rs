use log::warn;

use crate::node::error::NodeError;
use crate::node::peer::{PeerInfo, PeerRpc};
use crate::node::ChordNode;
use crate::utils::crypto::{hash, in_interval_open, in_interval_open_closed, HashPos};
use crate::utils::types::Address;

/// Hard bound on lookup hops, 2·m.
pub const MAX_LOOKUP_HOPS: usize = 2 * HashPos::BITS;

impl<P: PeerRpc> ChordNode<P> {
    /// Resolves the address of the node responsible for `pos`.
    ///
    /// Iterative rather than recursive: each hop fetches the next node's
    /// view and re-checks the target interval against it, so stale or cold
    /// fingers cost extra hops (degrading to a walk along the ring) but can
    /// never misroute. An unreachable hop fails over to the next live entry
    /// of the local successor list.
    pub async fn find_successor(&self, pos: &HashPos) -> Result<Address, NodeError> {
        if self.owns(pos) {
            return Ok(self.address().clone());
        }
        let snapshot = self.ring_snapshot();
        let successor_pos = hash(snapshot.successor.as_bytes());
        if in_interval_open_closed(pos, self.pos(), &successor_pos) {
            return Ok(snapshot.successor.clone());
        }
        let fingers = snapshot.finger_table.distinct_addresses();
        let mut current = closest_preceding_finger(&fingers, self.pos(), pos, self.address());
        if current == *self.address() {
            // no usable finger yet, walk the ring through the successor
            current = snapshot.successor;
        }

        let mut hops = 0;
        loop {
            hops += 1;
            if hops > MAX_LOOKUP_HOPS {
                warn!(
                    "Lookup for {} exceeded {} hops, triggering stabilize",
                    pos, MAX_LOOKUP_HOPS
                );
                self.stabilize().await;
                return Err(NodeError::RingInconsistent);
            }
            match self.peer().node_info(&current).await {
                Ok(info) => {
                    if info.successor == info.address {
                        // a node alone in its own ring (it left, or has not
                        // finished joining) cannot route for us
                        current = self.next_live_successor(&current).await?;
                        continue;
                    }
                    let current_pos = hash(info.address.as_bytes());
                    let successor_pos = hash(info.successor.as_bytes());
                    if in_interval_open_closed(pos, &current_pos, &successor_pos) {
                        return Ok(info.successor);
                    }
                    current = next_hop(&info, pos);
                }
                Err(NodeError::Unreachable) => {
                    current = self.next_live_successor(&current).await?;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// First live entry of the local successor list, probed with `health`.
    /// With every entry unreachable the lookup cannot proceed.
    async fn next_live_successor(&self, failed: &Address) -> Result<Address, NodeError> {
        let successors = self.successor_list();
        for candidate in &successors {
            if candidate == failed || candidate == self.address() {
                continue;
            }
            if self.peer().health(candidate).await.is_ok() {
                return Ok(candidate.clone());
            }
        }
        Err(NodeError::Unreachable)
    }
}

/// The furthest finger preceding `pos`: scan from the highest index down,
/// the first address whose id lies in `(from, pos)` wins. Falls back to
/// `fallback` when no finger qualifies.
pub(crate) fn closest_preceding_finger(
    fingers: &[Address],
    from: &HashPos,
    pos: &HashPos,
    fallback: &Address,
) -> Address {
    for address in fingers.iter().rev() {
        if in_interval_open(&hash(address.as_bytes()), from, pos) {
            return address.clone();
        }
    }
    fallback.clone()
}

/// Next hop according to a remote node's fingers, falling back to its
/// successor so the walk always makes progress.
fn next_hop(info: &PeerInfo, pos: &HashPos) -> Address {
    let from = hash(info.address.as_bytes());
    let next = closest_preceding_finger(&info.finger_table, &from, pos, &info.address);
    if next == info.address {
        info.successor.clone()
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_preceding_prefers_the_furthest_qualifying_finger() {
        // lay three nodes on the ring and look just past the furthest one
        let mut nodes: Vec<Address> = (2..5).map(|p| format!("localhost:700{}", p)).collect();
        let own = "localhost:7001".to_string();
        let own_pos = hash(own.as_bytes());
        // order the candidates clockwise starting from the own position
        nodes.sort_by(|a, b| {
            let a_in = in_interval_open(&hash(a.as_bytes()), &own_pos, &hash(b.as_bytes()));
            if a_in {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });

        let target = hash(nodes[2].as_bytes()).wrapping_add_pow2(0);
        let chosen = closest_preceding_finger(&nodes, &own_pos, &target, &own);
        assert_eq!(chosen, nodes[2]);
    }

    #[test]
    fn closest_preceding_falls_back_when_no_finger_qualifies() {
        let own = "localhost:7001".to_string();
        let own_pos = hash(own.as_bytes());
        // only the node itself in the table: nothing lies in the open interval
        let fingers = vec![own.clone()];
        let target = own_pos.wrapping_add_pow2(3);
        assert_eq!(closest_preceding_finger(&fingers, &own_pos, &target, &own), own);
    }
}
