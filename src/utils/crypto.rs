use std::fmt;
use std::fmt::{Debug, Display};

use sha1::{Digest, Sha1};

/// Number of bytes in a SHA-1 digest.
pub const HASH_SIZE: usize = 20;

/// A position in the hash ring: a 160-bit unsigned integer stored as the
/// big-endian SHA-1 digest it came from. Lexicographic comparison of the
/// byte arrays equals numeric comparison, so the derived `Ord` is the ring
/// order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HashPos([u8; HASH_SIZE]);

impl HashPos {
    /// Width of the identifier space, m in the Chord papers.
    pub const BITS: usize = HASH_SIZE * 8;

    pub fn from_be_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        HashPos(bytes)
    }

    pub fn to_be_bytes(self) -> [u8; HASH_SIZE] {
        self.0
    }

    /// `self + 2^exp mod 2^160`, the start of the exp-th finger interval.
    pub fn wrapping_add_pow2(self, exp: usize) -> Self {
        debug_assert!(exp < Self::BITS);
        let mut bytes = self.0;
        let mut index = HASH_SIZE - 1 - exp / 8;
        let mut carry = (1u16) << (exp % 8);
        loop {
            let sum = bytes[index] as u16 + carry;
            bytes[index] = sum as u8;
            carry = sum >> 8;
            if carry == 0 || index == 0 {
                // a carry out of the top byte wraps around the ring
                break;
            }
            index -= 1;
        }
        HashPos(bytes)
    }
}

impl TryFrom<&[u8]> for HashPos {
    type Error = usize;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| bytes.len())?;
        Ok(HashPos(array))
    }
}

impl Display for HashPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for HashPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Hashes arbitrary bytes onto the ring.
pub fn hash(bytes: &[u8]) -> HashPos {
    let digest = Sha1::digest(bytes);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest);
    HashPos(out)
}

/// `x ∈ (lower, upper)` on the ring. `lower == upper` wraps the full ring
/// except `lower` itself.
pub fn in_interval_open(x: &HashPos, lower: &HashPos, upper: &HashPos) -> bool {
    if lower == upper {
        return x != lower;
    }
    if lower < upper {
        lower < x && x < upper
    } else {
        x > lower || x < upper
    }
}

/// `x ∈ (lower, upper]` on the ring, the ownership interval. Same wrap rule
/// as [`in_interval_open`].
pub fn in_interval_open_closed(x: &HashPos, lower: &HashPos, upper: &HashPos) -> bool {
    if lower == upper {
        return x != lower;
    }
    if lower < upper {
        lower < x && x <= upper
    } else {
        x > lower || x <= upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(high: u8) -> HashPos {
        let mut bytes = [0u8; HASH_SIZE];
        bytes[0] = high;
        HashPos::from_be_bytes(bytes)
    }

    #[test]
    fn hash_is_sha1_of_input() {
        // SHA-1("abc") is a published test vector
        let expected = "a9993e364706816aba3e25717850c26c9cd0d89d";
        assert_eq!(hash(b"abc").to_string(), expected);
    }

    #[test]
    fn add_pow2_low_bits() {
        let zero = HashPos::default();
        let one = zero.wrapping_add_pow2(0);
        assert_eq!(one.to_be_bytes()[HASH_SIZE - 1], 1);
        let two_fifty_six = zero.wrapping_add_pow2(8);
        assert_eq!(two_fifty_six.to_be_bytes()[HASH_SIZE - 2], 1);
        assert_eq!(two_fifty_six.to_be_bytes()[HASH_SIZE - 1], 0);
    }

    #[test]
    fn add_pow2_carries_across_bytes() {
        let mut bytes = [0xffu8; HASH_SIZE];
        bytes[0] = 0;
        let almost = HashPos::from_be_bytes(bytes);
        let bumped = almost.wrapping_add_pow2(0);
        let mut expected = [0u8; HASH_SIZE];
        expected[0] = 1;
        assert_eq!(bumped.to_be_bytes(), expected);
    }

    #[test]
    fn add_pow2_wraps_the_ring() {
        let max = HashPos::from_be_bytes([0xff; HASH_SIZE]);
        let wrapped = max.wrapping_add_pow2(0);
        assert_eq!(wrapped, HashPos::default());
        let top_bit = HashPos::default().wrapping_add_pow2(HashPos::BITS - 1);
        assert_eq!(top_bit.wrapping_add_pow2(HashPos::BITS - 1), HashPos::default());
    }

    #[test]
    fn open_interval_no_wrap() {
        assert!(in_interval_open(&pos(5), &pos(1), &pos(10)));
        assert!(!in_interval_open(&pos(1), &pos(1), &pos(10)));
        assert!(!in_interval_open(&pos(10), &pos(1), &pos(10)));
        assert!(!in_interval_open(&pos(11), &pos(1), &pos(10)));
    }

    #[test]
    fn open_interval_wraps() {
        assert!(in_interval_open(&pos(11), &pos(10), &pos(1)));
        assert!(in_interval_open(&pos(0), &pos(10), &pos(1)));
        assert!(!in_interval_open(&pos(1), &pos(10), &pos(1)));
        assert!(!in_interval_open(&pos(5), &pos(10), &pos(1)));
    }

    #[test]
    fn open_closed_includes_upper_bound() {
        assert!(in_interval_open_closed(&pos(10), &pos(1), &pos(10)));
        assert!(!in_interval_open_closed(&pos(1), &pos(1), &pos(10)));
        assert!(in_interval_open_closed(&pos(1), &pos(10), &pos(1)));
        assert!(!in_interval_open_closed(&pos(10), &pos(10), &pos(1)));
    }

    #[test]
    fn degenerate_interval_covers_ring_except_lower() {
        let a = pos(7);
        assert!(!in_interval_open(&a, &a, &a));
        assert!(!in_interval_open_closed(&a, &a, &a));
        assert!(in_interval_open(&pos(8), &a, &a));
        assert!(in_interval_open_closed(&pos(6), &a, &a));
    }
}
