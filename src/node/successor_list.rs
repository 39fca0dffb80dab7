use crate::utils::constants::SUCCESSOR_LIST_LENGTH;
use crate::utils::types::Address;

/// The next r successors on the ring, used for failover when the immediate
/// successor dies. The first entry always equals the node's successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessorList {
    pub successors: Vec<Address>,
}

impl SuccessorList {
    pub fn new(successor: &Address) -> Self {
        SuccessorList {
            successors: vec![successor.clone()],
        }
    }

    /// Rebuilds the list from a fresh successor and that successor's own
    /// list: `[successor] ++ remote`, minus self and duplicates, truncated
    /// to r entries.
    pub fn rebuild(successor: &Address, remote: &[Address], own_address: &Address) -> Self {
        let mut successors = vec![successor.clone()];
        for address in remote {
            if successors.len() == SUCCESSOR_LIST_LENGTH {
                break;
            }
            if address == own_address || successors.contains(address) {
                continue;
            }
            successors.push(address.clone());
        }
        SuccessorList { successors }
    }

    pub fn first(&self) -> &Address {
        &self.successors[0]
    }
}
