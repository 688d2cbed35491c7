//! RBG Occupancy
//!
//! Per-slot record of which resource block groups are already claimed by a
//! committed PDSCH or PUSCH grant. A bit is set if and only if some grant in
//! that slot and direction covers the group; bits are only ever added by a
//! successful allocation and only cleared by a slot reset.

#![deny(missing_docs)]

use super::bitmask::RbgMask;
use crate::types::Direction;

/// DL and UL RBG occupancy of one slot
#[derive(Debug, Clone)]
pub struct RbgOccupancy {
    /// RBGs claimed by PDSCH grants
    dl: RbgMask,
    /// RBGs claimed by PUSCH grants
    ul: RbgMask,
}

impl RbgOccupancy {
    /// Create an empty occupancy map `nof_rbg` groups wide
    pub const fn new(nof_rbg: usize) -> Self {
        Self {
            dl: RbgMask::new(nof_rbg),
            ul: RbgMask::new(nof_rbg),
        }
    }

    /// Occupied groups in the given direction
    pub const fn mask(&self, dir: Direction) -> &RbgMask {
        match dir {
            Direction::Dl => &self.dl,
            Direction::Ul => &self.ul,
        }
    }

    /// Check whether `mask` overlaps any occupied group
    pub fn overlaps(&self, mask: &RbgMask, dir: Direction) -> bool {
        self.mask(dir).intersects(mask)
    }

    /// Mark the groups of `mask` as occupied
    pub fn merge(&mut self, mask: &RbgMask, dir: Direction) {
        match dir {
            Direction::Dl => self.dl |= mask,
            Direction::Ul => self.ul |= mask,
        }
    }

    /// Clear both directions
    pub fn reset(&mut self) {
        self.dl.clear();
        self.ul.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(bits: &str) -> RbgMask {
        RbgMask::from_bit_str(bits).unwrap()
    }

    #[test]
    fn test_directions_are_independent() {
        let mut occ = RbgOccupancy::new(4);
        occ.merge(&mask("1100"), Direction::Dl);
        assert!(occ.overlaps(&mask("0100"), Direction::Dl));
        assert!(!occ.overlaps(&mask("0100"), Direction::Ul));
    }

    #[test]
    fn test_merge_accumulates() {
        let mut occ = RbgOccupancy::new(4);
        occ.merge(&mask("1000"), Direction::Ul);
        occ.merge(&mask("0010"), Direction::Ul);
        assert_eq!(*occ.mask(Direction::Ul), mask("1010"));
        assert!(!occ.overlaps(&mask("0101"), Direction::Ul));
    }

    #[test]
    fn test_reset_clears_both() {
        let mut occ = RbgOccupancy::new(4);
        occ.merge(&mask("1111"), Direction::Dl);
        occ.merge(&mask("1111"), Direction::Ul);
        occ.reset();
        assert!(occ.mask(Direction::Dl).none());
        assert!(occ.mask(Direction::Ul).none());
        assert_eq!(occ.mask(Direction::Dl).len(), 4);
    }
}
