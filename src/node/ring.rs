use crate::node::finger_table::FingerTable;
use crate::node::successor_list::SuccessorList;
use crate::utils::crypto::HashPos;
use crate::utils::types::Address;

/// The mutable ring state of a node, guarded by a single lock. Successor,
/// successor list and the first finger are only updated together, so a
/// reader never observes `successor_list[0] != successor`.
#[derive(Debug, Clone)]
pub struct RingState {
    pub successor: Address,
    pub predecessor: Option<Address>,
    pub successor_list: SuccessorList,
    pub finger_table: FingerTable,
    /// While set, externally-facing operations answer "unavailable" and the
    /// maintenance loop leaves the ring state untouched.
    pub crashed: bool,
    /// Remembered across a simulated crash so recovery can re-join.
    pub last_known_successor: Option<Address>,
}

impl RingState {
    /// A freshly created node forms a single-node ring.
    pub fn single_node(address: &Address, pos: &HashPos) -> Self {
        RingState {
            successor: address.clone(),
            predecessor: None,
            successor_list: SuccessorList::new(address),
            finger_table: FingerTable::new(pos, address),
            crashed: false,
            last_known_successor: None,
        }
    }

    /// Commits a new successor, its list and the first finger as one group.
    pub fn adopt_successor(&mut self, list: SuccessorList, own_address: &Address) {
        let successor = list.first().clone();
        self.successor = successor.clone();
        self.successor_list = list;
        self.finger_table.set_finger(0, successor.clone());
        if &successor != own_address {
            self.last_known_successor = Some(successor);
        }
    }

    /// Collapses back to a single-node ring.
    pub fn reset_to_single(&mut self, own_address: &Address) {
        self.successor = own_address.clone();
        self.predecessor = None;
        self.successor_list = SuccessorList::new(own_address);
        self.finger_table.set_all_fingers(own_address);
    }
}
