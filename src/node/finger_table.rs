use crate::utils::crypto::HashPos;
use crate::utils::types::Address;

/// One slot of the routing cache: the interval start `pos + 2^i` and the
/// node currently believed responsible for it.
#[derive(Debug, Clone)]
pub struct FingerEntry {
    pub start: HashPos,
    pub address: Address,
}

/// Routing cache: one entry per bit of the identifier space, entry i
/// covering the interval starting at `pos + 2^i`. Staleness is tolerated,
/// lookups re-validate against the live successor at every hop.
#[derive(Debug, Clone)]
pub struct FingerTable {
    pub fingers: Vec<FingerEntry>,
}

impl FingerTable {
    /// All fingers start out pointing at the node itself.
    pub fn new(own_pos: &HashPos, own_address: &Address) -> FingerTable {
        let fingers = (0..HashPos::BITS)
            .map(|i| FingerEntry {
                start: own_pos.wrapping_add_pow2(i),
                address: own_address.clone(),
            })
            .collect();
        FingerTable { fingers }
    }

    pub fn set_finger(&mut self, index: usize, address: Address) {
        self.fingers[index].address = address;
    }

    pub fn set_all_fingers(&mut self, address: &Address) {
        for finger in &mut self.fingers {
            finger.address = address.clone();
        }
    }

    /// Distinct finger targets in table order. Neighbouring indices usually
    /// resolve to the same successor, so this is short for small rings.
    pub fn distinct_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = Vec::new();
        for finger in &self.fingers {
            if !addresses.contains(&finger.address) {
                addresses.push(finger.address.clone());
            }
        }
        addresses
    }
}
