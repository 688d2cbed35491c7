//! PDCCH Control-Channel Regions
//!
//! A CORESET is the set of control channel elements (CCEs) in which DCIs of
//! one slot are placed. Each region keeps its own CCE occupancy and the
//! ordered lists of DL and UL DCIs issued from it.
//!
//! # CCE placement
//!
//! ```text
//! nof_cces = nof_freq_resources * nof_symbols   (one freq resource = 6 PRBs)
//!
//! aggregation level index:  0  1  2  3  4
//! CCEs per DCI           :  1  2  4  8 16
//!
//! candidates for AL idx 3 in a 16-CCE region:  [0..8) [8..16)
//! ```
//!
//! The first candidate whose CCEs are all free is taken. A reservation is
//! final for the slot: there is no release primitive, the whole region is
//! cleared when its slot is reset.

#![deny(missing_docs)]

use heapless::Vec;

use super::bitmask::{CceMask, RbgMask, MAX_NOF_CCES};
use crate::config::{ConfigError, CoresetConfig};
use crate::types::{BwpId, CoresetId, HarqId, Rnti};

/// Maximum number of CORESETs per bandwidth part
pub const MAX_CORESETS_PER_BWP: usize = 3;

/// Maximum number of DCIs per CORESET and direction in one slot
pub const MAX_DCI_PER_CORESET: usize = 16;

/// Highest aggregation level index (16 CCEs)
pub const MAX_AGGREGATION_LEVEL_IDX: u8 = 4;

/// Number of PRBs in one CORESET frequency resource
pub const PRBS_PER_FREQ_RESOURCE: u32 = 6;

/// PDCCH aggregation level, stored as its index (`2^idx` CCEs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct AggregationLevel(u8);

impl AggregationLevel {
    /// Create an aggregation level from its index (0..=4)
    pub const fn new(idx: u8) -> Option<Self> {
        if idx > MAX_AGGREGATION_LEVEL_IDX {
            return None;
        }
        Some(Self(idx))
    }

    /// Aggregation level index
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Number of CCEs occupied by one DCI at this level
    pub const fn nof_cces(self) -> usize {
        1 << self.0
    }
}

impl Default for AggregationLevel {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for AggregationLevel {
    type Error = ConfigError;

    fn try_from(idx: u8) -> Result<Self, Self::Error> {
        Self::new(idx).ok_or(ConfigError::InvalidAggregationLevel(idx))
    }
}

impl From<AggregationLevel> for u8 {
    fn from(level: AggregationLevel) -> Self {
        level.0
    }
}

/// Kind of scheduling DCI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DciType {
    /// DL assignment carrying a PDSCH grant
    DlData,
    /// UL grant scheduling a PUSCH
    UlData,
}

/// Grant-specific DCI fields, known once the data grant is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DciPayload {
    /// HARQ process carrying the transport block
    pub harq_id: HarqId,
    /// New data indicator
    pub ndi: bool,
    /// Modulation and coding scheme index
    pub mcs: u8,
    /// Frequency-domain allocation
    pub rbgs: RbgMask,
}

/// One DCI placed in a CORESET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdcchGrant {
    /// Scheduled UE
    pub rnti: Rnti,
    /// Bandwidth part of the scheduled data
    pub bwp_id: BwpId,
    /// CORESET holding the DCI
    pub coreset_id: CoresetId,
    /// Aggregation level used
    pub aggr_level: AggregationLevel,
    /// First CCE of the DCI
    pub cce_index: u16,
    /// Grant fields, `None` until the data allocation completes
    pub payload: Option<DciPayload>,
}

/// Reference to a reserved DCI within one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DciHandle {
    /// DL or UL list
    pub dci_type: DciType,
    /// Position of the CORESET within the slot
    pub coreset_idx: u8,
    /// Position within the DCI list
    pub index: u8,
}

/// CCE accounting and DCI lists of one CORESET in one slot
#[derive(Debug, Clone)]
pub struct CoresetRegion {
    /// CORESET identifier
    id: CoresetId,
    /// Owning bandwidth part
    bwp_id: BwpId,
    /// Ring position of the owning slot
    slot_idx: usize,
    /// OFDM symbols spanned by the CORESET
    nof_symbols: u8,
    /// Frequency resources (groups of 6 PRBs)
    nof_freq_resources: u8,
    /// Occupied CCEs
    cces: CceMask,
    /// Runtime cap on each DCI list
    max_dcis: usize,
    /// DL assignments issued this slot
    dl_dcis: Vec<PdcchGrant, MAX_DCI_PER_CORESET>,
    /// UL grants issued this slot
    ul_dcis: Vec<PdcchGrant, MAX_DCI_PER_CORESET>,
}

impl CoresetRegion {
    /// Create an empty region from its configuration
    pub fn new(bwp_id: BwpId, slot_idx: usize, cfg: &CoresetConfig, max_dcis: usize) -> Self {
        let nof_cces = usize::from(cfg.nof_freq_resources) * usize::from(cfg.nof_symbols);
        Self {
            id: cfg.id,
            bwp_id,
            slot_idx,
            nof_symbols: cfg.nof_symbols,
            nof_freq_resources: cfg.nof_freq_resources,
            cces: CceMask::new(nof_cces.min(MAX_NOF_CCES)),
            max_dcis: max_dcis.min(MAX_DCI_PER_CORESET),
            dl_dcis: Vec::new(),
            ul_dcis: Vec::new(),
        }
    }

    /// CORESET identifier
    pub const fn id(&self) -> CoresetId {
        self.id
    }

    /// Ring position of the slot owning this region
    pub const fn slot_idx(&self) -> usize {
        self.slot_idx
    }

    /// OFDM symbols spanned
    pub const fn nof_symbols(&self) -> u8 {
        self.nof_symbols
    }

    /// Frequency resources spanned
    pub const fn nof_freq_resources(&self) -> u8 {
        self.nof_freq_resources
    }

    /// Total CCE budget
    pub const fn nof_cces(&self) -> usize {
        self.cces.len()
    }

    /// CCEs consumed so far this slot
    pub fn used_cces(&self) -> usize {
        self.cces.count()
    }

    /// DL assignments in issue order
    pub fn dl_dcis(&self) -> &[PdcchGrant] {
        &self.dl_dcis
    }

    /// UL grants in issue order
    pub fn ul_dcis(&self) -> &[PdcchGrant] {
        &self.ul_dcis
    }

    /// Reserve CCEs for one DCI
    ///
    /// Returns the list position of the new record, or `None` when the DCI
    /// list for `dci_type` is full or no candidate of `aggr_level` fits.
    /// Nothing is modified on failure.
    pub fn reserve(
        &mut self,
        dci_type: DciType,
        aggr_level: AggregationLevel,
        rnti: Rnti,
    ) -> Option<u8> {
        let list_len = match dci_type {
            DciType::DlData => self.dl_dcis.len(),
            DciType::UlData => self.ul_dcis.len(),
        };
        if list_len >= self.max_dcis {
            return None;
        }

        let cce_index = self.find_candidate(aggr_level)?;
        let record = PdcchGrant {
            rnti,
            bwp_id: self.bwp_id,
            coreset_id: self.id,
            aggr_level,
            cce_index: cce_index as u16,
            payload: None,
        };
        let list = match dci_type {
            DciType::DlData => &mut self.dl_dcis,
            DciType::UlData => &mut self.ul_dcis,
        };
        list.push(record).ok()?;
        self.cces.fill(cce_index, cce_index + aggr_level.nof_cces());
        Some(list_len as u8)
    }

    /// Mutable access to a reserved DCI
    pub fn dci_mut(&mut self, dci_type: DciType, index: u8) -> Option<&mut PdcchGrant> {
        match dci_type {
            DciType::DlData => self.dl_dcis.get_mut(usize::from(index)),
            DciType::UlData => self.ul_dcis.get_mut(usize::from(index)),
        }
    }

    /// Release every CCE and DCI
    pub fn reset(&mut self) {
        self.cces.clear();
        self.dl_dcis.clear();
        self.ul_dcis.clear();
    }

    /// First free candidate start for `aggr_level`
    fn find_candidate(&self, aggr_level: AggregationLevel) -> Option<usize> {
        let step = aggr_level.nof_cces();
        let total = self.cces.len();
        if step > total {
            return None;
        }
        (0..=total - step)
            .step_by(step)
            .find(|start| self.cces.is_range_clear(*start, start + step))
    }
}
