//! Bandwidth-Part and Cell Grids
//!
//! Each bandwidth part owns a ring of slot grids allocated once at cell
//! activation. Slot `n` maps to ring position `n % ring_len`, so a slot grid
//! is reused every `ring_len` slots. Clearing a position before reuse is the
//! job of the slot clock ([`CellResGrid::reset_slot`]); the grid never infers
//! it.
//!
//! ```text
//! ring_len = 10
//! slot:   ... 18 19 | 20 21 22 ...
//! index:  ...  8  9 |  0  1  2 ...
//! ```

#![deny(missing_docs)]

use alloc_crate::boxed::Box;
use alloc_crate::sync::Arc;
use alloc_crate::vec::Vec as AllocVec;
use core::ops::{Index, IndexMut};
use heapless::Vec;

use super::bitmask::{rbg_size, RbgMask};
use super::slot::BwpSlotGrid;
use crate::allocator::BwpSlotAllocator;
use crate::config::CellParams;
use crate::types::{BwpId, SlotPoint};

/// Maximum number of bandwidth parts per cell
pub const MAX_BWPS: usize = 4;

/// Maximum slot ring length
pub const MAX_SLOT_RING: usize = 40;

/// Slot grid ring of one bandwidth part
#[derive(Debug)]
pub struct BwpResGrid {
    /// Bandwidth part identifier
    bwp_id: BwpId,
    /// Shared cell parameters
    params: Arc<CellParams>,
    /// Width of the bandwidth part in PRBs
    nof_prbs: usize,
    /// PRBs per RBG
    rbg_size: usize,
    /// Slot grids, one per ring position
    slots: Box<[BwpSlotGrid]>,
}

impl BwpResGrid {
    /// Allocate the slot ring of bandwidth part `bwp_id`
    pub fn new(params: Arc<CellParams>, bwp_id: BwpId) -> Self {
        let ring_len = params.args().nof_slots_ring;
        let nof_prbs = params.bwp(bwp_id).map_or(0, |bwp| bwp.rb_width as usize);
        let slots = (0..ring_len)
            .map(|slot_idx| BwpSlotGrid::new(&params, bwp_id, slot_idx))
            .collect::<AllocVec<_>>()
            .into_boxed_slice();
        Self {
            bwp_id,
            rbg_size: rbg_size(nof_prbs, params.nof_rbg()),
            nof_prbs,
            params,
            slots,
        }
    }

    /// Bandwidth part identifier
    pub const fn bwp_id(&self) -> BwpId {
        self.bwp_id
    }

    /// Shared cell parameters
    pub fn params(&self) -> &CellParams {
        &self.params
    }

    /// Width in PRBs
    pub const fn nof_prbs(&self) -> usize {
        self.nof_prbs
    }

    /// PRBs per RBG
    pub const fn rbg_size(&self) -> usize {
        self.rbg_size
    }

    /// Number of RBGs
    pub fn nof_rbg(&self) -> usize {
        self.params.nof_rbg()
    }

    /// Number of ring positions
    pub fn ring_len(&self) -> usize {
        self.slots.len()
    }

    /// Empty RBG mask sized for this grid
    pub fn empty_mask(&self) -> RbgMask {
        RbgMask::new(self.nof_rbg())
    }

    /// Slot grid serving `slot`
    pub fn slot(&self, slot: SlotPoint) -> &BwpSlotGrid {
        &self[slot]
    }

    /// Mutable slot grid serving `slot`
    pub fn slot_mut(&mut self, slot: SlotPoint) -> &mut BwpSlotGrid {
        &mut self[slot]
    }

    /// Clear the ring position serving `slot`
    pub fn reset(&mut self, slot: SlotPoint) {
        self.slot_mut(slot).reset();
    }
}

// The ring is never empty: `CellParams` rejects a zero ring length, so
// `ring_index` is always in bounds.
#[allow(clippy::indexing_slicing)]
impl Index<SlotPoint> for BwpResGrid {
    type Output = BwpSlotGrid;

    fn index(&self, slot: SlotPoint) -> &BwpSlotGrid {
        &self.slots[slot.ring_index(self.slots.len())]
    }
}

#[allow(clippy::indexing_slicing)]
impl IndexMut<SlotPoint> for BwpResGrid {
    fn index_mut(&mut self, slot: SlotPoint) -> &mut BwpSlotGrid {
        let len = self.slots.len();
        &mut self.slots[slot.ring_index(len)]
    }
}

/// Resource grids of every bandwidth part of one cell
#[derive(Debug)]
pub struct CellResGrid {
    /// Shared cell parameters
    params: Arc<CellParams>,
    /// One grid per bandwidth part, indexed by BWP ID
    bwps: Vec<BwpResGrid, MAX_BWPS>,
}

impl CellResGrid {
    /// Build the grids of every configured bandwidth part
    pub fn new(params: Arc<CellParams>) -> Self {
        let mut bwps = Vec::new();
        for bwp_idx in 0..params.nof_bwps() {
            let _ = bwps.push(BwpResGrid::new(Arc::clone(&params), BwpId::new(bwp_idx as u8)));
        }
        sched_log!(
            INFO,
            "SCHED: cell grid ready, {} bwp(s), {} rbgs, ring of {} slots",
            bwps.len(),
            params.nof_rbg(),
            params.args().nof_slots_ring
        );
        Self { params, bwps }
    }

    /// Shared cell parameters
    pub fn params(&self) -> &CellParams {
        &self.params
    }

    /// Number of bandwidth part grids
    pub fn nof_bwps(&self) -> usize {
        self.bwps.len()
    }

    /// Grid of one bandwidth part
    pub fn bwp(&self, bwp_id: BwpId) -> Option<&BwpResGrid> {
        self.bwps.get(bwp_id.as_usize())
    }

    /// Mutable grid of one bandwidth part
    pub fn bwp_mut(&mut self, bwp_id: BwpId) -> Option<&mut BwpResGrid> {
        self.bwps.get_mut(bwp_id.as_usize())
    }

    /// Clear the ring position serving `slot` in every bandwidth part
    ///
    /// Called once per slot by the slot clock before the position is
    /// scheduled again.
    pub fn reset_slot(&mut self, slot: SlotPoint) {
        for bwp in &mut self.bwps {
            bwp.reset(slot);
        }
    }

    /// Start a slot pass on one bandwidth part
    pub fn allocator(&mut self, bwp_id: BwpId) -> Option<BwpSlotAllocator<'_>> {
        self.bwp_mut(bwp_id).map(BwpSlotAllocator::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BwpConfig, CellConfig, SchedArgs};
    use crate::grid::bitmask::PrbMask;
    use crate::grid::slot::{PdschGrant, PuschGrant};
    use crate::types::{HarqId, Rnti};

    fn params() -> Arc<CellParams> {
        let mut cell = CellConfig::new(4, 96);
        cell.bwps.push(BwpConfig::new(48)).unwrap();
        Arc::new(CellParams::new(cell, SchedArgs::default()).unwrap())
    }

    #[test]
    fn test_one_grid_per_bwp() {
        let grid = CellResGrid::new(params());
        assert_eq!(grid.nof_bwps(), 2);
        let bwp1 = grid.bwp(BwpId::new(1)).unwrap();
        assert_eq!(bwp1.nof_prbs(), 48);
        assert_eq!(bwp1.rbg_size(), 12);
        assert_eq!(bwp1.ring_len(), 10);
        assert!(grid.bwp(BwpId::new(2)).is_none());
    }

    #[test]
    fn test_ring_positions_alias() {
        let mut grid = CellResGrid::new(params());
        let bwp = grid.bwp_mut(BwpId::new(0)).unwrap();
        let mask = RbgMask::from_bit_str("1000").unwrap();
        bwp.slot_mut(SlotPoint::new(3))
            .commit_pdsch(PdschGrant {
                rnti: Rnti::new(1),
                harq_id: HarqId::new(0),
                ndi: true,
                rbgs: mask,
                prbs: PrbMask::new(96),
                mcs: 20,
                tbs: 100,
            })
            .unwrap();
        // slot 13 shares ring position 3 with slot 3
        assert_eq!(bwp.slot(SlotPoint::new(13)).pdsch_grants().len(), 1);
        assert_eq!(bwp[SlotPoint::new(13)].slot_idx(), 3);
        assert!(bwp.slot(SlotPoint::new(4)).pdsch_grants().is_empty());
    }

    #[test]
    fn test_reset_slot_touches_only_its_position() {
        let mut grid = CellResGrid::new(params());
        for bwp_idx in 0..2 {
            let bwp = grid.bwp_mut(BwpId::new(bwp_idx)).unwrap();
            let mask = bwp.empty_mask();
            for slot in [SlotPoint::new(1), SlotPoint::new(2)] {
                let mut rbgs = mask;
                rbgs.set(0);
                bwp.slot_mut(slot)
                    .commit_pusch(PuschGrant {
                        rnti: Rnti::new(1),
                        harq_id: HarqId::new(0),
                        ndi: true,
                        rbgs,
                        mcs: 20,
                        tbs: 100,
                    })
                    .unwrap();
            }
        }
        grid.reset_slot(SlotPoint::new(11));
        for bwp_idx in 0..2 {
            let bwp = grid.bwp(BwpId::new(bwp_idx)).unwrap();
            assert!(bwp.slot(SlotPoint::new(1)).ul_rbgs().none());
            assert!(bwp.slot(SlotPoint::new(2)).ul_rbgs().any());
        }
    }
}
