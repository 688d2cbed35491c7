//! Slot Grid
//!
//! Everything scheduled in one slot of one bandwidth part: the RBG
//! occupancy, the CORESETs with their DCIs and the committed PDSCH, PUSCH
//! and PUCCH (HARQ-ACK) lists. The physical layer reads these lists once the
//! slot pass is over; the scheduler only appends to them.
//!
//! All lists are fixed-capacity. A list reaching its configured cap is a
//! distinct condition from an RBG collision and is reported separately by
//! the allocator.

#![deny(missing_docs)]

use heapless::Vec;

use super::bitmask::{PrbMask, RbgMask};
use super::occupancy::RbgOccupancy;
use super::pdcch::{
    AggregationLevel, CoresetRegion, DciHandle, DciType, PdcchGrant, MAX_CORESETS_PER_BWP,
};
use crate::config::CellParams;
use crate::types::{BwpId, CoresetId, Direction, HarqId, Rnti, SlotPoint};

/// Maximum number of PDSCH, PUSCH or PUCCH grants per slot
pub const MAX_GRANTS: usize = 16;

/// Committed PDSCH grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdschGrant {
    /// Scheduled UE
    pub rnti: Rnti,
    /// HARQ process carrying the block
    pub harq_id: HarqId,
    /// New data indicator
    pub ndi: bool,
    /// Allocated RBGs
    pub rbgs: RbgMask,
    /// PRBs covered by the allocated RBGs
    pub prbs: PrbMask,
    /// Modulation and coding scheme index
    pub mcs: u8,
    /// Transport block size
    pub tbs: u32,
}

/// Committed PUSCH grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuschGrant {
    /// Scheduled UE
    pub rnti: Rnti,
    /// HARQ process carrying the block
    pub harq_id: HarqId,
    /// New data indicator
    pub ndi: bool,
    /// Allocated RBGs
    pub rbgs: RbgMask,
    /// Modulation and coding scheme index
    pub mcs: u8,
    /// Transport block size
    pub tbs: u32,
}

/// HARQ-ACK expected on PUCCH in this slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PucchGrant {
    /// UE reporting the feedback
    pub rnti: Rnti,
    /// DL HARQ process being acknowledged
    pub harq_id: HarqId,
    /// Slot of the acknowledged PDSCH
    pub pdsch_slot: SlotPoint,
}

/// Resource grid of one bandwidth part in one slot
#[derive(Debug, Clone)]
pub struct BwpSlotGrid {
    /// Owning bandwidth part
    bwp_id: BwpId,
    /// Ring position
    slot_idx: usize,
    /// DL/UL RBG occupancy
    occupancy: RbgOccupancy,
    /// Control-channel regions
    coresets: Vec<CoresetRegion, MAX_CORESETS_PER_BWP>,
    /// PDSCH grants
    pdsch: Vec<PdschGrant, MAX_GRANTS>,
    /// PUSCH grants
    pusch: Vec<PuschGrant, MAX_GRANTS>,
    /// PUCCH HARQ-ACK entries
    pucch: Vec<PucchGrant, MAX_GRANTS>,
    /// PDSCH cap
    max_pdsch: usize,
    /// PUSCH cap
    max_pusch: usize,
    /// PUCCH cap
    max_pucch: usize,
}

impl BwpSlotGrid {
    /// Create an empty slot grid for ring position `slot_idx`
    pub fn new(params: &CellParams, bwp_id: BwpId, slot_idx: usize) -> Self {
        let args = params.args();
        let mut coresets = Vec::new();
        if let Some(bwp) = params.bwp(bwp_id) {
            for cs in &bwp.coresets {
                let region = CoresetRegion::new(bwp_id, slot_idx, cs, args.max_dci_per_coreset);
                let _ = coresets.push(region);
            }
        }
        Self {
            bwp_id,
            slot_idx,
            occupancy: RbgOccupancy::new(params.nof_rbg()),
            coresets,
            pdsch: Vec::new(),
            pusch: Vec::new(),
            pucch: Vec::new(),
            max_pdsch: args.max_pdsch_per_slot.min(MAX_GRANTS),
            max_pusch: args.max_pusch_per_slot.min(MAX_GRANTS),
            max_pucch: args.max_pucch_per_slot.min(MAX_GRANTS),
        }
    }

    /// Clear the grid before its ring position is reused
    pub fn reset(&mut self) {
        for coreset in &mut self.coresets {
            coreset.reset();
        }
        self.occupancy.reset();
        self.pdsch.clear();
        self.pusch.clear();
        self.pucch.clear();
    }

    /// Owning bandwidth part
    pub const fn bwp_id(&self) -> BwpId {
        self.bwp_id
    }

    /// Ring position
    pub const fn slot_idx(&self) -> usize {
        self.slot_idx
    }

    /// DL/UL RBG occupancy
    pub const fn occupancy(&self) -> &RbgOccupancy {
        &self.occupancy
    }

    /// RBGs taken by PDSCH grants
    pub const fn dl_rbgs(&self) -> &RbgMask {
        self.occupancy.mask(Direction::Dl)
    }

    /// RBGs taken by PUSCH grants
    pub const fn ul_rbgs(&self) -> &RbgMask {
        self.occupancy.mask(Direction::Ul)
    }

    /// Committed PDSCH grants in allocation order
    pub fn pdsch_grants(&self) -> &[PdschGrant] {
        &self.pdsch
    }

    /// Committed PUSCH grants in allocation order
    pub fn pusch_grants(&self) -> &[PuschGrant] {
        &self.pusch
    }

    /// HARQ-ACK entries expected in this slot
    pub fn pucch_grants(&self) -> &[PucchGrant] {
        &self.pucch
    }

    /// Control-channel regions
    pub fn coresets(&self) -> &[CoresetRegion] {
        &self.coresets
    }

    /// Look up a region by CORESET ID
    pub fn coreset(&self, id: CoresetId) -> Option<&CoresetRegion> {
        self.coresets.iter().find(|cs| cs.id() == id)
    }

    /// DL DCIs of every region, region by region in issue order
    pub fn pdcch_dl(&self) -> impl Iterator<Item = &PdcchGrant> + '_ {
        self.coresets.iter().flat_map(CoresetRegion::dl_dcis)
    }

    /// UL DCIs of every region, region by region in issue order
    pub fn pdcch_ul(&self) -> impl Iterator<Item = &PdcchGrant> + '_ {
        self.coresets.iter().flat_map(CoresetRegion::ul_dcis)
    }

    /// Whether the PDSCH list reached its cap
    pub fn is_pdsch_full(&self) -> bool {
        self.pdsch.len() >= self.max_pdsch
    }

    /// Whether the PUSCH list reached its cap
    pub fn is_pusch_full(&self) -> bool {
        self.pusch.len() >= self.max_pusch
    }

    /// Whether the PUCCH list reached its cap
    pub fn is_pucch_full(&self) -> bool {
        self.pucch.len() >= self.max_pucch
    }

    /// Reserve a DCI in the CORESET `coreset_id`
    ///
    /// Returns `None` if the CORESET does not exist or has no room for
    /// `aggr_level`.
    pub fn alloc_dci(
        &mut self,
        dci_type: DciType,
        aggr_level: AggregationLevel,
        coreset_id: CoresetId,
        rnti: Rnti,
    ) -> Option<DciHandle> {
        let coreset_idx = self.coresets.iter().position(|cs| cs.id() == coreset_id)?;
        let index = self.coresets.get_mut(coreset_idx)?.reserve(dci_type, aggr_level, rnti)?;
        Some(DciHandle {
            dci_type,
            coreset_idx: coreset_idx as u8,
            index,
        })
    }

    /// Mutable access to a reserved DCI
    pub fn dci_mut(&mut self, handle: DciHandle) -> Option<&mut PdcchGrant> {
        self.coresets
            .get_mut(usize::from(handle.coreset_idx))?
            .dci_mut(handle.dci_type, handle.index)
    }

    /// Append a PDSCH grant and claim its RBGs
    ///
    /// Returns the list position, or `None` if the list is full.
    pub(crate) fn commit_pdsch(&mut self, grant: PdschGrant) -> Option<usize> {
        if self.is_pdsch_full() {
            return None;
        }
        let rbgs = grant.rbgs;
        self.pdsch.push(grant).ok()?;
        self.occupancy.merge(&rbgs, Direction::Dl);
        Some(self.pdsch.len() - 1)
    }

    /// Append a PUSCH grant and claim its RBGs
    pub(crate) fn commit_pusch(&mut self, grant: PuschGrant) -> Option<usize> {
        if self.is_pusch_full() {
            return None;
        }
        let rbgs = grant.rbgs;
        self.pusch.push(grant).ok()?;
        self.occupancy.merge(&rbgs, Direction::Ul);
        Some(self.pusch.len() - 1)
    }

    /// Append a HARQ-ACK entry
    pub(crate) fn commit_pucch(&mut self, grant: PucchGrant) -> Option<usize> {
        if self.is_pucch_full() {
            return None;
        }
        self.pucch.push(grant).ok()?;
        Some(self.pucch.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CellConfig, SchedArgs};

    fn params(max_pdsch: usize) -> CellParams {
        let args = SchedArgs {
            max_pdsch_per_slot: max_pdsch,
            ..SchedArgs::default()
        };
        CellParams::new(CellConfig::new(4, 96), args).unwrap()
    }

    fn pdsch(rnti: u16, bits: &str) -> PdschGrant {
        PdschGrant {
            rnti: Rnti::new(rnti),
            harq_id: HarqId::new(0),
            ndi: true,
            rbgs: RbgMask::from_bit_str(bits).unwrap(),
            prbs: PrbMask::new(96),
            mcs: 20,
            tbs: 100,
        }
    }

    #[test]
    fn test_new_grid_layout() {
        let grid = BwpSlotGrid::new(&params(2), BwpId::new(0), 3);
        assert_eq!(grid.slot_idx(), 3);
        assert_eq!(grid.coresets().len(), 1);
        assert_eq!(grid.coresets()[0].nof_cces(), 16);
        assert_eq!(grid.dl_rbgs().len(), 4);
        assert!(grid.pdsch_grants().is_empty());
    }

    #[test]
    fn test_commit_respects_cap() {
        let mut grid = BwpSlotGrid::new(&params(2), BwpId::new(0), 0);
        assert_eq!(grid.commit_pdsch(pdsch(1, "1100")), Some(0));
        assert_eq!(grid.commit_pdsch(pdsch(2, "0011")), Some(1));
        assert!(grid.is_pdsch_full());
        assert_eq!(grid.commit_pdsch(pdsch(3, "0000")), None);
        assert_eq!(*grid.dl_rbgs(), RbgMask::from_bit_str("1111").unwrap());
        assert!(grid.ul_rbgs().none());
    }

    #[test]
    fn test_dci_lookup_by_coreset_id() {
        let mut grid = BwpSlotGrid::new(&params(2), BwpId::new(0), 0);
        let al = AggregationLevel::new(3).unwrap();
        assert!(grid.alloc_dci(DciType::DlData, al, CoresetId::new(1), Rnti::new(1)).is_none());
        let handle = grid
            .alloc_dci(DciType::UlData, al, CoresetId::new(0), Rnti::new(1))
            .unwrap();
        assert_eq!(handle.coreset_idx, 0);
        assert_eq!(grid.dci_mut(handle).map(|dci| dci.rnti), Some(Rnti::new(1)));
        assert_eq!(grid.pdcch_ul().count(), 1);
        assert_eq!(grid.pdcch_dl().count(), 0);
    }

    #[test]
    fn test_reset_clears_all_lists() {
        let mut grid = BwpSlotGrid::new(&params(2), BwpId::new(0), 0);
        let al = AggregationLevel::new(3).unwrap();
        grid.commit_pdsch(pdsch(1, "1100")).unwrap();
        grid.commit_pucch(PucchGrant {
            rnti: Rnti::new(1),
            harq_id: HarqId::new(0),
            pdsch_slot: SlotPoint::new(0),
        })
        .unwrap();
        grid.alloc_dci(DciType::DlData, al, CoresetId::new(0), Rnti::new(1)).unwrap();
        grid.reset();
        assert!(grid.pdsch_grants().is_empty());
        assert!(grid.pucch_grants().is_empty());
        assert_eq!(grid.pdcch_dl().count(), 0);
        assert!(grid.dl_rbgs().none());
        assert_eq!(grid.coresets()[0].used_cces(), 0);
    }
}
