//! Slot Allocator
//!
//! The primitives a scheduling policy invokes for each candidate UE while it
//! fills one slot of one bandwidth part. Each call validates a proposed RBG
//! mask against every shared resource, then commits the data grant, its DCI,
//! the HARQ transition and the occupancy update together.
//!
//! # Allocation Order
//!
//! ```text
//! 1. HARQ process present?            no  -> NoRntiOpportunity
//! 2. mask width and slot offsets ok?  no  -> InvalidRequest
//! 3. grant list (and PUCCH) has room? no  -> NoGrantSpace
//! 4. mask disjoint from occupancy?    no  -> SchCollision
//! 5. CCE block free in the CORESET?   no  -> NoCchSpace
//! 6. HARQ new_tx / new_retx, fill DCI, commit grant, merge occupancy
//! ```
//!
//! A retransmission ignores the proposed mask: steps 2-6 run on the RBGs
//! stored in the HARQ process.
//!
//! Steps 1-4 only read the grid, and step 5 is the last check that can fail.
//! A failing call therefore never leaves a partial grant behind. Step 6
//! cannot fail: the allocator picks `new_tx` for an empty process and
//! `new_retx` otherwise, and the list capacities were checked in step 3. A
//! HARQ refusal at that point is an invariant violation and aborts the slot
//! pass.

#![deny(missing_docs)]

use core::fmt;

use thiserror_no_std::Error;

use crate::config::{DciParams, UeConfig};
use crate::grid::bitmask::{rbg_to_prb_mask, RbgMask};
use crate::grid::bwp::BwpResGrid;
use crate::grid::pdcch::{DciPayload, DciType};
use crate::grid::slot::{PdschGrant, PucchGrant, PuschGrant};
use crate::harq::{HarqProcess, TbInfo};
use crate::types::{Direction, Rnti, SlotPoint};

/// Recoverable allocation failures
///
/// None of them leaves any trace in the grid; the policy may retry with
/// another mask, another UE or give up on the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// No HARQ process was offered for this direction
    #[error("no HARQ process available for the UE")]
    NoRntiOpportunity,
    /// The mask does not match the grid's RBG count, or a target slot lies
    /// outside the slot ring
    #[error("malformed allocation request")]
    InvalidRequest,
    /// The grant list of the data slot, or the HARQ-ACK list of the
    /// feedback slot, is full
    #[error("no grant space left in the slot")]
    NoGrantSpace,
    /// The mask overlaps RBGs already granted in the same direction
    #[error("RBG mask collides with an existing grant")]
    SchCollision,
    /// No free CCE block of the requested aggregation level
    #[error("no PDCCH space left in the CORESET")]
    NoCchSpace,
}

/// Result type for allocation calls
pub type AllocResult<T> = Result<T, AllocError>;

/// Location of a committed data grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantRef {
    /// Link direction: PDSCH for DL, PUSCH for UL
    pub dir: Direction,
    /// Slot of the data transmission
    pub slot: SlotPoint,
    /// Position in the slot's grant list
    pub index: usize,
}

/// Counters of one allocator
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    /// Committed PDSCH grants
    pub dl_grants: u32,
    /// Committed PUSCH grants
    pub ul_grants: u32,
    /// Committed grants that were HARQ retransmissions
    pub retx_grants: u32,
    /// Calls rejected for a missing HARQ process
    pub no_rnti_opportunity: u32,
    /// Calls rejected for a malformed mask or timing
    pub invalid_request: u32,
    /// Calls rejected for a full grant list
    pub no_grant_space: u32,
    /// Calls rejected for an RBG collision
    pub sch_collision: u32,
    /// Calls rejected for lack of CCEs
    pub no_cch_space: u32,
}

impl AllocStats {
    /// Total committed grants
    pub const fn grants(&self) -> u32 {
        self.dl_grants + self.ul_grants
    }

    /// Total rejected calls
    pub const fn failures(&self) -> u32 {
        self.no_rnti_opportunity
            + self.invalid_request
            + self.no_grant_space
            + self.sch_collision
            + self.no_cch_space
    }

    fn record(&mut self, err: AllocError) {
        match err {
            AllocError::NoRntiOpportunity => self.no_rnti_opportunity += 1,
            AllocError::InvalidRequest => self.invalid_request += 1,
            AllocError::NoGrantSpace => self.no_grant_space += 1,
            AllocError::SchCollision => self.sch_collision += 1,
            AllocError::NoCchSpace => self.no_cch_space += 1,
        }
    }
}

/// One UE as seen by a single allocation call
///
/// Carries the UE's target slots for the PDCCH slot being scheduled and
/// borrows the HARQ processes the policy picked for it. A `None` process
/// means the UE has nothing to offer in that direction.
pub struct SlotUe<'a> {
    /// UE identifier
    pub rnti: Rnti,
    /// Slot carrying the DCI
    pub pdcch_slot: SlotPoint,
    /// Slot carrying the PDSCH
    pub pdsch_slot: SlotPoint,
    /// Slot carrying the HARQ-ACK for the PDSCH
    pub uci_slot: SlotPoint,
    /// Slot carrying the PUSCH
    pub pusch_slot: SlotPoint,
    /// DL HARQ process offered for this slot
    pub h_dl: Option<&'a mut dyn HarqProcess>,
    /// UL HARQ process offered for this slot
    pub h_ul: Option<&'a mut dyn HarqProcess>,
    /// UE configuration
    pub cfg: UeConfig,
    /// DCI placement; the scheduler default when `None`
    pub dci: Option<DciParams>,
}

impl<'a> SlotUe<'a> {
    /// Derive the UE's target slots from `pdcch_slot` and its K0/K1/K2
    ///
    /// See [`CellParams::validate_ue`](crate::config::CellParams::validate_ue)
    /// for the offsets the allocator accepts.
    pub fn new(rnti: Rnti, pdcch_slot: SlotPoint, cfg: UeConfig) -> Self {
        let pdsch_slot = pdcch_slot + cfg.k0;
        Self {
            rnti,
            pdcch_slot,
            pdsch_slot,
            uci_slot: pdsch_slot + cfg.k1,
            pusch_slot: pdcch_slot + cfg.k2,
            h_dl: None,
            h_ul: None,
            cfg,
            dci: None,
        }
    }

    /// Offer a DL HARQ process
    #[must_use]
    pub fn with_dl_harq(mut self, h: &'a mut dyn HarqProcess) -> Self {
        self.h_dl = Some(h);
        self
    }

    /// Offer a UL HARQ process
    #[must_use]
    pub fn with_ul_harq(mut self, h: &'a mut dyn HarqProcess) -> Self {
        self.h_ul = Some(h);
        self
    }

    /// Override the DCI placement
    #[must_use]
    pub const fn with_dci(mut self, dci: DciParams) -> Self {
        self.dci = Some(dci);
        self
    }
}

impl fmt::Debug for SlotUe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotUe")
            .field("rnti", &self.rnti)
            .field("pdcch_slot", &self.pdcch_slot)
            .field("pdsch_slot", &self.pdsch_slot)
            .field("uci_slot", &self.uci_slot)
            .field("pusch_slot", &self.pusch_slot)
            .field("h_dl", &self.h_dl.as_ref().map(|h| h.id()))
            .field("h_ul", &self.h_ul.as_ref().map(|h| h.id()))
            .field("dci", &self.dci)
            .finish_non_exhaustive()
    }
}

/// Allocator for one slot pass over one bandwidth part
///
/// Holds the bandwidth part grid exclusively for its lifetime, so the
/// occupancy merged by one call is seen by every later call of the pass.
#[derive(Debug)]
pub struct BwpSlotAllocator<'a> {
    /// Grid being filled
    grid: &'a mut BwpResGrid,
    /// Counters of this pass
    stats: AllocStats,
}

impl<'a> BwpSlotAllocator<'a> {
    /// Start a slot pass on `grid`
    pub fn new(grid: &'a mut BwpResGrid) -> Self {
        Self {
            grid,
            stats: AllocStats::default(),
        }
    }

    /// Grid being filled
    pub fn grid(&self) -> &BwpResGrid {
        self.grid
    }

    /// Counters of this pass
    pub const fn stats(&self) -> &AllocStats {
        &self.stats
    }

    /// Allocate a PDSCH for `ue` on the RBGs of `mask`
    ///
    /// The DCI goes to `ue.pdcch_slot`, the data to `ue.pdsch_slot` and the
    /// HARQ-ACK entry to `ue.uci_slot`. A retransmission goes out on the
    /// RBGs stored in the HARQ process and `mask` is ignored.
    pub fn alloc_pdsch(&mut self, ue: &mut SlotUe<'_>, mask: &RbgMask) -> AllocResult<GrantRef> {
        let args = *self.grid.params().args();
        let dci_params = ue.dci.unwrap_or(args.default_dci);

        let Some(h) = ue.h_dl.as_deref_mut() else {
            sched_log!(WARN, "SCHED: rnti={} has no DL HARQ process to allocate", ue.rnti);
            return Err(self.reject(AllocError::NoRntiOpportunity));
        };
        let is_retx = !h.empty();
        let mask = if is_retx { h.mask() } else { *mask };

        let data_delay = ue.pdsch_slot.distance_from(ue.pdcch_slot);
        let ack_delay = ue.uci_slot.distance_from(ue.pdsch_slot);
        if ack_delay == 0 || !self.is_well_formed(&mask, data_delay + ack_delay) {
            sched_log!(
                WARN,
                "SCHED: rnti={} malformed DL request rbgs={} pdsch={} ack={}",
                ue.rnti,
                mask,
                ue.pdsch_slot,
                ue.uci_slot
            );
            return Err(self.reject(AllocError::InvalidRequest));
        }
        if self.grid.slot(ue.pdsch_slot).is_pdsch_full() {
            sched_log!(
                WARN,
                "SCHED: maximum number of PDSCH grants reached in slot {}",
                ue.pdsch_slot
            );
            return Err(self.reject(AllocError::NoGrantSpace));
        }
        if self.grid.slot(ue.uci_slot).is_pucch_full() {
            sched_log!(
                WARN,
                "SCHED: maximum number of PUCCH grants reached in slot {}",
                ue.uci_slot
            );
            return Err(self.reject(AllocError::NoGrantSpace));
        }
        if self.grid.slot(ue.pdsch_slot).occupancy().overlaps(&mask, Direction::Dl) {
            sched_log!(
                TRACE,
                "SCHED: rnti={} DL mask {} collides in slot {}",
                ue.rnti,
                mask,
                ue.pdsch_slot
            );
            return Err(self.reject(AllocError::SchCollision));
        }
        let Some(dci) = self.grid.slot_mut(ue.pdcch_slot).alloc_dci(
            DciType::DlData,
            dci_params.aggr_level,
            dci_params.coreset_id,
            ue.rnti,
        ) else {
            sched_log!(
                TRACE,
                "SCHED: rnti={} no DL PDCCH space in slot {}",
                ue.rnti,
                ue.pdcch_slot
            );
            return Err(self.reject(AllocError::NoCchSpace));
        };

        let tb = if is_retx {
            h.new_retx(ue.pdsch_slot, ue.uci_slot)
                .unwrap_or_else(|err| invariant_violated(ue.rnti, err))
        } else {
            let tb = TbInfo {
                mcs: args.fixed_mcs,
                tbs: args.fixed_tbs,
            };
            h.new_tx(ue.pdsch_slot, ue.uci_slot, &mask, tb, args.dl_max_harq_tx)
                .unwrap_or_else(|err| invariant_violated(ue.rnti, err));
            tb
        };
        let harq_id = h.id();
        let ndi = h.ndi();

        if let Some(pdcch) = self.grid.slot_mut(ue.pdcch_slot).dci_mut(dci) {
            pdcch.payload = Some(DciPayload {
                harq_id,
                ndi,
                mcs: tb.mcs,
                rbgs: mask,
            });
        }

        let prbs = rbg_to_prb_mask(&mask, self.grid.rbg_size(), self.grid.nof_prbs());
        let index = self
            .grid
            .slot_mut(ue.pdsch_slot)
            .commit_pdsch(PdschGrant {
                rnti: ue.rnti,
                harq_id,
                ndi,
                rbgs: mask,
                prbs,
                mcs: tb.mcs,
                tbs: tb.tbs,
            })
            .unwrap_or_else(|| invariant_violated(ue.rnti, "PDSCH list full after check"));
        self.grid
            .slot_mut(ue.uci_slot)
            .commit_pucch(PucchGrant {
                rnti: ue.rnti,
                harq_id,
                pdsch_slot: ue.pdsch_slot,
            })
            .unwrap_or_else(|| invariant_violated(ue.rnti, "PUCCH list full after check"));

        self.stats.dl_grants += 1;
        if is_retx {
            self.stats.retx_grants += 1;
        }
        sched_log!(
            DEBUG,
            "SCHED: rnti={} PDSCH slot={} pid={} rbgs={} {}, ack at {}",
            ue.rnti,
            ue.pdsch_slot,
            harq_id.as_u8(),
            mask,
            if is_retx { "retx" } else { "newtx" },
            ue.uci_slot
        );

        Ok(GrantRef {
            dir: Direction::Dl,
            slot: ue.pdsch_slot,
            index,
        })
    }

    /// Allocate a PUSCH for `ue` on the RBGs of `mask`
    ///
    /// The DCI goes to `ue.pdcch_slot` and the data to `ue.pusch_slot`. UL
    /// feedback is implicit in the PUSCH slot, so no PUCCH entry is added.
    /// A retransmission reuses the stored RBGs as for the PDSCH.
    pub fn alloc_pusch(&mut self, ue: &mut SlotUe<'_>, mask: &RbgMask) -> AllocResult<GrantRef> {
        let args = *self.grid.params().args();
        let dci_params = ue.dci.unwrap_or(args.default_dci);

        let Some(h) = ue.h_ul.as_deref_mut() else {
            sched_log!(WARN, "SCHED: rnti={} has no UL HARQ process to allocate", ue.rnti);
            return Err(self.reject(AllocError::NoRntiOpportunity));
        };
        let is_retx = !h.empty();
        let mask = if is_retx { h.mask() } else { *mask };

        if !self.is_well_formed(&mask, ue.pusch_slot.distance_from(ue.pdcch_slot)) {
            sched_log!(
                WARN,
                "SCHED: rnti={} malformed UL request rbgs={} pusch={}",
                ue.rnti,
                mask,
                ue.pusch_slot
            );
            return Err(self.reject(AllocError::InvalidRequest));
        }
        if self.grid.slot(ue.pusch_slot).is_pusch_full() {
            sched_log!(
                WARN,
                "SCHED: maximum number of PUSCH grants reached in slot {}",
                ue.pusch_slot
            );
            return Err(self.reject(AllocError::NoGrantSpace));
        }
        if self.grid.slot(ue.pusch_slot).occupancy().overlaps(&mask, Direction::Ul) {
            sched_log!(
                TRACE,
                "SCHED: rnti={} UL mask {} collides in slot {}",
                ue.rnti,
                mask,
                ue.pusch_slot
            );
            return Err(self.reject(AllocError::SchCollision));
        }
        let Some(dci) = self.grid.slot_mut(ue.pdcch_slot).alloc_dci(
            DciType::UlData,
            dci_params.aggr_level,
            dci_params.coreset_id,
            ue.rnti,
        ) else {
            sched_log!(
                TRACE,
                "SCHED: rnti={} no UL PDCCH space in slot {}",
                ue.rnti,
                ue.pdcch_slot
            );
            return Err(self.reject(AllocError::NoCchSpace));
        };

        let tb = if is_retx {
            h.new_retx(ue.pusch_slot, ue.pusch_slot)
                .unwrap_or_else(|err| invariant_violated(ue.rnti, err))
        } else {
            let tb = TbInfo {
                mcs: args.fixed_mcs,
                tbs: args.fixed_tbs,
            };
            h.new_tx(ue.pusch_slot, ue.pusch_slot, &mask, tb, ue.cfg.max_harq_tx)
                .unwrap_or_else(|err| invariant_violated(ue.rnti, err));
            tb
        };
        let harq_id = h.id();
        let ndi = h.ndi();

        if let Some(pdcch) = self.grid.slot_mut(ue.pdcch_slot).dci_mut(dci) {
            pdcch.payload = Some(DciPayload {
                harq_id,
                ndi,
                mcs: tb.mcs,
                rbgs: mask,
            });
        }

        let index = self
            .grid
            .slot_mut(ue.pusch_slot)
            .commit_pusch(PuschGrant {
                rnti: ue.rnti,
                harq_id,
                ndi,
                rbgs: mask,
                mcs: tb.mcs,
                tbs: tb.tbs,
            })
            .unwrap_or_else(|| invariant_violated(ue.rnti, "PUSCH list full after check"));

        self.stats.ul_grants += 1;
        if is_retx {
            self.stats.retx_grants += 1;
        }
        sched_log!(
            DEBUG,
            "SCHED: rnti={} PUSCH slot={} pid={} rbgs={} {}",
            ue.rnti,
            ue.pusch_slot,
            harq_id.as_u8(),
            mask,
            if is_retx { "retx" } else { "newtx" }
        );

        Ok(GrantRef {
            dir: Direction::Ul,
            slot: ue.pusch_slot,
            index,
        })
    }

    /// Whether `mask` spans exactly the grid's RBGs and a target slot
    /// `delay` slots after the PDCCH stays inside the ring
    fn is_well_formed(&self, mask: &RbgMask, delay: u32) -> bool {
        mask.len() == self.grid.nof_rbg() && (delay as usize) < self.grid.ring_len()
    }

    fn reject(&mut self, err: AllocError) -> AllocError {
        self.stats.record(err);
        err
    }
}

/// Abort the slot pass on a broken allocator invariant
#[cold]
#[inline(never)]
#[allow(clippy::panic)]
fn invariant_violated(rnti: Rnti, cause: impl fmt::Display) -> ! {
    sched_log!(ERROR, "SCHED: rnti={} allocation invariant violated: {}", rnti, cause);
    panic!("allocation invariant violated for rnti={rnti}: {cause}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc_crate::sync::Arc;

    use crate::config::{CellConfig, CellParams, SchedArgs};
    use crate::grid::pdcch::AggregationLevel;
    use crate::harq::{HarqError, HarqProc, HarqResult};
    use crate::types::{BwpId, CoresetId, HarqId};

    fn grid(args: SchedArgs) -> BwpResGrid {
        let params = CellParams::new(CellConfig::new(4, 96), args).unwrap();
        BwpResGrid::new(Arc::new(params), BwpId::new(0))
    }

    fn mask(bits: &str) -> RbgMask {
        RbgMask::from_bit_str(bits).unwrap()
    }

    fn ue_cfg() -> UeConfig {
        UeConfig {
            max_harq_tx: 4,
            k0: 0,
            k1: 4,
            k2: 4,
        }
    }

    #[test]
    fn test_slot_ue_timing() {
        let ue = SlotUe::new(Rnti::new(0x46), SlotPoint::new(10238), ue_cfg());
        assert_eq!(ue.pdsch_slot, SlotPoint::new(10238));
        assert_eq!(ue.uci_slot, SlotPoint::new(2));
        assert_eq!(ue.pusch_slot, SlotPoint::new(2));
        assert!(ue.h_dl.is_none());
        assert!(ue.dci.is_none());
    }

    #[test]
    fn test_pdsch_commits_grant_dci_and_ack() {
        let mut grid = grid(SchedArgs::default());
        let mut h = HarqProc::new(HarqId::new(5));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let mut ue = SlotUe::new(Rnti::new(0x46), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h);

        let grant = alloc.alloc_pdsch(&mut ue, &mask("0110")).unwrap();
        assert_eq!(grant.dir, Direction::Dl);
        assert_eq!(grant.slot, SlotPoint::new(0));
        assert_eq!(grant.index, 0);

        let slot = alloc.grid().slot(SlotPoint::new(0));
        let pdsch = &slot.pdsch_grants()[0];
        assert_eq!(pdsch.harq_id, HarqId::new(5));
        assert_eq!((pdsch.mcs, pdsch.tbs), (20, 100));
        assert!(pdsch.ndi);
        // RBG size 24: RBGs 1 and 2 cover PRBs 24..72
        assert_eq!(pdsch.prbs.count(), 48);
        assert!(pdsch.prbs.test(24) && pdsch.prbs.test(71));
        assert!(!pdsch.prbs.test(23) && !pdsch.prbs.test(72));

        let dci = slot.pdcch_dl().next().unwrap();
        assert_eq!(dci.rnti, Rnti::new(0x46));
        let payload = dci.payload.unwrap();
        assert_eq!(payload.harq_id, HarqId::new(5));
        assert_eq!(payload.rbgs, mask("0110"));

        let acks = alloc.grid().slot(SlotPoint::new(4)).pucch_grants();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].pdsch_slot, SlotPoint::new(0));
        assert_eq!(alloc.stats().dl_grants, 1);

        drop(ue);
        assert!(!h.empty());
        assert_eq!(h.slot_ack(), SlotPoint::new(4));
    }

    #[test]
    fn test_missing_harq_is_rejected_first() {
        let mut grid = grid(SchedArgs {
            max_pdsch_per_slot: 1,
            ..SchedArgs::default()
        });
        let mut h = HarqProc::new(HarqId::new(0));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let mut ue1 = SlotUe::new(Rnti::new(1), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h);
        alloc.alloc_pdsch(&mut ue1, &mask("1000")).unwrap();

        // full list and colliding mask, but the missing process wins
        let mut ue2 = SlotUe::new(Rnti::new(2), SlotPoint::new(0), ue_cfg());
        assert_eq!(
            alloc.alloc_pdsch(&mut ue2, &mask("1000")),
            Err(AllocError::NoRntiOpportunity)
        );
        assert_eq!(alloc.alloc_pusch(&mut ue2, &mask("1000")), Err(AllocError::NoRntiOpportunity));
        assert_eq!(alloc.stats().no_rnti_opportunity, 2);
    }

    #[test]
    fn test_full_pucch_list_rejects_pdsch() {
        let mut grid = grid(SchedArgs {
            max_pucch_per_slot: 1,
            ..SchedArgs::default()
        });
        let mut h1 = HarqProc::new(HarqId::new(0));
        let mut h2 = HarqProc::new(HarqId::new(0));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let mut ue1 = SlotUe::new(Rnti::new(1), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h1);
        alloc.alloc_pdsch(&mut ue1, &mask("1000")).unwrap();

        // same feedback slot, different PDSCH RBGs
        let mut ue2 = SlotUe::new(Rnti::new(2), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h2);
        assert_eq!(alloc.alloc_pdsch(&mut ue2, &mask("0100")), Err(AllocError::NoGrantSpace));
        assert_eq!(alloc.grid().slot(SlotPoint::new(0)).pdsch_grants().len(), 1);
        assert_eq!(alloc.grid().slot(SlotPoint::new(0)).coresets()[0].used_cces(), 8);
        drop(ue2);
        assert!(h2.empty());
    }

    #[test]
    fn test_collision_leaves_dci_and_harq_untouched() {
        let mut grid = grid(SchedArgs::default());
        let mut h1 = HarqProc::new(HarqId::new(0));
        let mut h2 = HarqProc::new(HarqId::new(1));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let mut ue1 = SlotUe::new(Rnti::new(1), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h1);
        alloc.alloc_pdsch(&mut ue1, &mask("1100")).unwrap();

        let mut ue2 = SlotUe::new(Rnti::new(2), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h2);
        assert_eq!(alloc.alloc_pdsch(&mut ue2, &mask("0110")), Err(AllocError::SchCollision));
        let slot = alloc.grid().slot(SlotPoint::new(0));
        assert_eq!(*slot.dl_rbgs(), mask("1100"));
        assert_eq!(slot.pdcch_dl().count(), 1);
        assert_eq!(alloc.grid().slot(SlotPoint::new(4)).pucch_grants().len(), 1);
        assert_eq!(alloc.stats().sch_collision, 1);
        drop(ue2);
        assert!(h2.empty());
    }

    #[test]
    fn test_retx_goes_out_on_stored_rbgs() {
        let mut grid = grid(SchedArgs::default());
        let mut h = HarqProc::new(HarqId::new(1));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        {
            let mut ue =
                SlotUe::new(Rnti::new(9), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h);
            alloc.alloc_pdsch(&mut ue, &mask("1100")).unwrap();
        }
        h.ack_info(false).unwrap();

        let mut ue = SlotUe::new(Rnti::new(9), SlotPoint::new(1), ue_cfg()).with_dl_harq(&mut h);
        let grant = alloc.alloc_pdsch(&mut ue, &mask("0001")).unwrap();
        let slot = alloc.grid().slot(grant.slot);
        let pdsch = &slot.pdsch_grants()[grant.index];
        assert_eq!(pdsch.rbgs, mask("1100"));
        assert_eq!(pdsch.prbs.count(), 48);
        assert!(pdsch.prbs.test(0) && !pdsch.prbs.test(48));
        assert_eq!(*slot.dl_rbgs(), mask("1100"));
        assert_eq!(slot.pdcch_dl().next().unwrap().payload.unwrap().rbgs, mask("1100"));
        assert_eq!(alloc.stats().retx_grants, 1);

        // the proposed RBGs stay free for another UE
        let mut h2 = HarqProc::new(HarqId::new(0));
        let mut ue2 = SlotUe::new(Rnti::new(10), SlotPoint::new(1), ue_cfg()).with_dl_harq(&mut h2);
        alloc.alloc_pdsch(&mut ue2, &mask("0001")).unwrap();
        drop((ue, ue2));
        assert_eq!(h.mask(), mask("1100"));
        assert_eq!(h.nof_tx(), 2);
    }

    #[test]
    fn test_mask_width_must_match_grid() {
        let mut grid = grid(SchedArgs::default());
        let mut h1 = HarqProc::new(HarqId::new(0));
        let mut h2 = HarqProc::new(HarqId::new(0));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let mut ue1 = SlotUe::new(Rnti::new(1), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h1);
        let mut ue2 = SlotUe::new(Rnti::new(2), SlotPoint::new(0), ue_cfg()).with_ul_harq(&mut h2);

        assert_eq!(alloc.alloc_pdsch(&mut ue1, &mask("00001")), Err(AllocError::InvalidRequest));
        assert_eq!(alloc.alloc_pdsch(&mut ue1, &mask("100")), Err(AllocError::InvalidRequest));
        assert_eq!(alloc.alloc_pusch(&mut ue2, &mask("00001")), Err(AllocError::InvalidRequest));
        assert_eq!(alloc.stats().invalid_request, 3);

        let slot = alloc.grid().slot(SlotPoint::new(0));
        assert!(slot.dl_rbgs().none());
        assert!(slot.pdsch_grants().is_empty());
        assert_eq!(slot.coresets()[0].used_cces(), 0);
        drop((ue1, ue2));
        assert!(h1.empty() && h2.empty());
    }

    #[test]
    fn test_offsets_outside_the_ring_are_rejected() {
        let mut grid = grid(SchedArgs::default());
        let mut h1 = HarqProc::new(HarqId::new(0));
        let mut h2 = HarqProc::new(HarqId::new(0));
        let mut h3 = HarqProc::new(HarqId::new(0));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let now = UeConfig {
            k2: 0,
            ..ue_cfg()
        };
        let mut ue1 = SlotUe::new(Rnti::new(1), SlotPoint::new(0), now).with_ul_harq(&mut h1);
        alloc.alloc_pusch(&mut ue1, &mask("1100")).unwrap();

        // slot 10 shares ring position 0 with the live slot 0
        let far = UeConfig {
            k2: 10,
            ..ue_cfg()
        };
        let mut ue2 = SlotUe::new(Rnti::new(2), SlotPoint::new(0), far).with_ul_harq(&mut h2);
        assert_eq!(alloc.alloc_pusch(&mut ue2, &mask("0100")), Err(AllocError::InvalidRequest));

        let same_slot_ack = UeConfig {
            k1: 0,
            ..ue_cfg()
        };
        let mut ue3 =
            SlotUe::new(Rnti::new(3), SlotPoint::new(0), same_slot_ack).with_dl_harq(&mut h3);
        assert_eq!(alloc.alloc_pdsch(&mut ue3, &mask("0010")), Err(AllocError::InvalidRequest));
        ue3.uci_slot = ue3.pdsch_slot + 10;
        assert_eq!(alloc.alloc_pdsch(&mut ue3, &mask("0010")), Err(AllocError::InvalidRequest));

        assert_eq!(*alloc.grid().slot(SlotPoint::new(0)).ul_rbgs(), mask("1100"));
        assert_eq!(alloc.grid().slot(SlotPoint::new(0)).coresets()[0].used_cces(), 8);
        assert_eq!(alloc.stats().invalid_request, 3);
    }

    #[test]
    fn test_pusch_uses_ue_max_tx_and_no_pucch() {
        let mut grid = grid(SchedArgs::default());
        let mut h = HarqProc::new(HarqId::new(2));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let cfg = UeConfig {
            max_harq_tx: 1,
            ..ue_cfg()
        };
        let mut ue = SlotUe::new(Rnti::new(7), SlotPoint::new(0), cfg).with_ul_harq(&mut h);

        let grant = alloc.alloc_pusch(&mut ue, &mask("0011")).unwrap();
        assert_eq!(grant.dir, Direction::Ul);
        assert_eq!(grant.slot, SlotPoint::new(4));
        let slot = alloc.grid().slot(SlotPoint::new(4));
        assert_eq!(*slot.ul_rbgs(), mask("0011"));
        assert!(slot.dl_rbgs().none());
        assert!(slot.pucch_grants().is_empty());
        assert_eq!(alloc.grid().slot(SlotPoint::new(0)).pdcch_ul().count(), 1);
        assert_eq!(alloc.stats().ul_grants, 1);

        drop(ue);
        assert_eq!(h.slot_ack(), SlotPoint::new(4));
        // a single NACK exhausts max_harq_tx = 1
        assert_eq!(h.ack_info(false), Ok(true));
    }

    #[test]
    fn test_policy_dci_overrides_default() {
        let mut grid = grid(SchedArgs::default());
        let mut h = HarqProc::new(HarqId::new(0));
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let dci = DciParams {
            aggr_level: AggregationLevel::new(1).unwrap(),
            coreset_id: CoresetId::new(0),
        };
        let mut ue = SlotUe::new(Rnti::new(1), SlotPoint::new(0), ue_cfg())
            .with_dl_harq(&mut h)
            .with_dci(dci);
        alloc.alloc_pdsch(&mut ue, &mask("1000")).unwrap();
        let slot = alloc.grid().slot(SlotPoint::new(0));
        assert_eq!(slot.coresets()[0].used_cces(), 2);

        // unknown CORESET behaves as a CCE shortage
        let mut h2 = HarqProc::new(HarqId::new(1));
        let mut ue2 = SlotUe::new(Rnti::new(2), SlotPoint::new(0), ue_cfg())
            .with_dl_harq(&mut h2)
            .with_dci(DciParams {
                coreset_id: CoresetId::new(2),
                ..dci
            });
        assert_eq!(alloc.alloc_pdsch(&mut ue2, &mask("0100")), Err(AllocError::NoCchSpace));
    }

    #[test]
    fn test_stats_totals() {
        let stats = AllocStats {
            dl_grants: 2,
            ul_grants: 1,
            retx_grants: 1,
            no_rnti_opportunity: 1,
            invalid_request: 5,
            no_grant_space: 2,
            sch_collision: 3,
            no_cch_space: 4,
        };
        assert_eq!(stats.grants(), 3);
        assert_eq!(stats.failures(), 15);
    }

    /// Process that refuses every transition
    struct BrokenHarq;

    impl HarqProcess for BrokenHarq {
        fn id(&self) -> HarqId {
            HarqId::new(0)
        }

        fn empty(&self) -> bool {
            true
        }

        fn ndi(&self) -> bool {
            false
        }

        fn mask(&self) -> RbgMask {
            RbgMask::new(4)
        }

        fn new_tx(
            &mut self,
            _: SlotPoint,
            _: SlotPoint,
            _: &RbgMask,
            _: TbInfo,
            _: u32,
        ) -> HarqResult<()> {
            Err(HarqError::NotEmpty(HarqId::new(0)))
        }

        fn new_retx(&mut self, _: SlotPoint, _: SlotPoint) -> HarqResult<TbInfo> {
            Err(HarqError::Empty(HarqId::new(0)))
        }
    }

    #[test]
    #[should_panic(expected = "allocation invariant violated")]
    fn test_harq_refusal_is_fatal() {
        let mut grid = grid(SchedArgs::default());
        let mut h = BrokenHarq;
        let mut alloc = BwpSlotAllocator::new(&mut grid);
        let mut ue = SlotUe::new(Rnti::new(1), SlotPoint::new(0), ue_cfg()).with_dl_harq(&mut h);
        let _ = alloc.alloc_pdsch(&mut ue, &mask("1000"));
    }
}
