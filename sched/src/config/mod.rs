//! Scheduler Configuration
//!
//! Static cell configuration and scheduler arguments, validated once at cell
//! activation and then frozen in [`CellParams`]. The grid hierarchy holds
//! the parameters behind an `Arc`, so nothing here is copied per slot.
//!
//! # Configuration layers
//!
//! - **Compile-time maxima**: `MAX_*` constants bounding every fixed-size
//!   collection (see `grid`)
//! - **Cell configuration**: RBG count, bandwidth parts and their CORESETs
//! - **Scheduler arguments**: ring length, per-slot caps and the transport
//!   defaults used for new transmissions
//! - **UE configuration**: HARQ retransmission ceiling and slot offsets
//!
//! Defaults reproduce a single 52-PRB bandwidth part with one CORESET
//! spanning the whole part in one symbol.

#![deny(missing_docs)]

use heapless::Vec;
use thiserror_no_std::Error;

use crate::grid::bitmask::{rbg_size, MAX_NOF_CCES, MAX_NOF_PRBS, MAX_NOF_RBGS};
use crate::grid::bwp::{MAX_BWPS, MAX_SLOT_RING};
use crate::grid::pdcch::{
    AggregationLevel, MAX_CORESETS_PER_BWP, MAX_DCI_PER_CORESET, PRBS_PER_FREQ_RESOURCE,
};
use crate::grid::slot::MAX_GRANTS;
use crate::types::{BwpId, CoresetId, SLOT_WRAP};

/// Default bandwidth part width in PRBs
pub const DEFAULT_BWP_WIDTH: u32 = 52;

/// Default number of RBGs
pub const DEFAULT_NOF_RBG: u32 = 13;

/// Default slot ring length
pub const DEFAULT_SLOT_RING: usize = 10;

/// Default MCS for new transmissions
pub const DEFAULT_FIXED_MCS: u8 = 20;

/// Default TBS for new transmissions
pub const DEFAULT_FIXED_TBS: u32 = 100;

/// Default maximum number of DL HARQ transmissions
pub const DEFAULT_DL_MAX_HARQ_TX: u32 = 4;

/// Maximum number of OFDM symbols in a CORESET
pub const MAX_CORESET_SYMBOLS: u8 = 3;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The cell has no bandwidth part
    #[error("cell has no bandwidth parts")]
    NoBandwidthParts,
    /// RBG count is zero or above the supported maximum
    #[error("invalid RBG count {0}")]
    InvalidRbgCount(u32),
    /// Bandwidth part width is too wide, or too narrow to give every RBG
    /// at least one PRB
    #[error("bwp {bwp}: invalid width of {width} PRBs")]
    InvalidBwpWidth {
        /// Offending bandwidth part
        bwp: u8,
        /// Configured width
        width: u32,
    },
    /// CORESET missing, duplicated or not fitting the bandwidth part
    #[error("bwp {bwp}: invalid CORESET {coreset}")]
    InvalidCoreset {
        /// Offending bandwidth part
        bwp: u8,
        /// Offending CORESET
        coreset: u8,
    },
    /// Slot ring length is zero, too long, or does not divide the hyper-frame
    #[error("invalid slot ring length {0}")]
    InvalidSlotRing(usize),
    /// A per-slot list cap is zero or above the compile-time capacity
    #[error("invalid per-slot capacity {0}")]
    InvalidCapacity(usize),
    /// Aggregation level index above 4
    #[error("invalid aggregation level index {0}")]
    InvalidAggregationLevel(u8),
    /// UE slot offsets that leave the slot ring or merge the DL data and
    /// feedback slots
    #[error("invalid UE timing k0={k0} k1={k1} k2={k2}")]
    InvalidUeTiming {
        /// PDCCH to PDSCH offset
        k0: u32,
        /// PDSCH to HARQ-ACK offset
        k1: u32,
        /// PDCCH to PUSCH offset
        k2: u32,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// CORESET configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoresetConfig {
    /// CORESET identifier
    pub id: CoresetId,
    /// OFDM symbols spanned (1..=3)
    pub nof_symbols: u8,
    /// Frequency resources, each 6 PRBs wide
    pub nof_freq_resources: u8,
}

impl CoresetConfig {
    /// Number of CCEs in the CORESET
    pub const fn nof_cces(&self) -> usize {
        self.nof_freq_resources as usize * self.nof_symbols as usize
    }
}

/// Bandwidth part configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BwpConfig {
    /// Width in PRBs
    pub rb_width: u32,
    /// CORESETs available for DCIs
    pub coresets: Vec<CoresetConfig, MAX_CORESETS_PER_BWP>,
}

impl BwpConfig {
    /// Bandwidth part with one single-symbol CORESET spanning its width
    pub fn new(rb_width: u32) -> Self {
        let mut coresets = Vec::new();
        let _ = coresets.push(CoresetConfig {
            id: CoresetId::new(0),
            nof_symbols: 1,
            nof_freq_resources: (rb_width / PRBS_PER_FREQ_RESOURCE).min(u32::from(u8::MAX)) as u8,
        });
        Self { rb_width, coresets }
    }

    /// Find a CORESET by identifier
    pub fn coreset(&self, id: CoresetId) -> Option<&CoresetConfig> {
        self.coresets.iter().find(|cs| cs.id == id)
    }
}

impl Default for BwpConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BWP_WIDTH)
    }
}

/// Cell configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellConfig {
    /// Number of RBGs in each bandwidth part grid
    pub nof_rbg: u32,
    /// Configured bandwidth parts, indexed by BWP ID
    pub bwps: Vec<BwpConfig, MAX_BWPS>,
}

impl CellConfig {
    /// Cell with a single bandwidth part of `rb_width` PRBs
    pub fn new(nof_rbg: u32, rb_width: u32) -> Self {
        let mut bwps = Vec::new();
        let _ = bwps.push(BwpConfig::new(rb_width));
        Self { nof_rbg, bwps }
    }
}

impl Default for CellConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NOF_RBG, DEFAULT_BWP_WIDTH)
    }
}

/// DCI placement chosen by the scheduling policy for one allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DciParams {
    /// PDCCH aggregation level
    pub aggr_level: AggregationLevel,
    /// CORESET to place the DCI in
    pub coreset_id: CoresetId,
}

/// Scheduler arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedArgs {
    /// Number of slot grids in each bandwidth part ring
    pub nof_slots_ring: usize,
    /// PDSCH grants per slot
    pub max_pdsch_per_slot: usize,
    /// PUSCH grants per slot
    pub max_pusch_per_slot: usize,
    /// PUCCH HARQ-ACK entries per slot
    pub max_pucch_per_slot: usize,
    /// DCIs per CORESET and direction per slot
    pub max_dci_per_coreset: usize,
    /// MCS of new transmissions
    pub fixed_mcs: u8,
    /// TBS of new transmissions
    pub fixed_tbs: u32,
    /// Maximum DL HARQ transmissions
    pub dl_max_harq_tx: u32,
    /// DCI placement used when the policy does not choose one
    pub default_dci: DciParams,
}

impl Default for SchedArgs {
    fn default() -> Self {
        Self {
            nof_slots_ring: DEFAULT_SLOT_RING,
            max_pdsch_per_slot: MAX_GRANTS,
            max_pusch_per_slot: MAX_GRANTS,
            max_pucch_per_slot: MAX_GRANTS,
            max_dci_per_coreset: MAX_DCI_PER_CORESET,
            fixed_mcs: DEFAULT_FIXED_MCS,
            fixed_tbs: DEFAULT_FIXED_TBS,
            dl_max_harq_tx: DEFAULT_DL_MAX_HARQ_TX,
            default_dci: DciParams::default(),
        }
    }
}

/// Per-UE configuration consumed by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UeConfig {
    /// Maximum UL HARQ transmissions
    pub max_harq_tx: u32,
    /// PDCCH to PDSCH offset in slots
    pub k0: u32,
    /// PDSCH to HARQ-ACK offset in slots
    pub k1: u32,
    /// PDCCH to PUSCH offset in slots
    pub k2: u32,
}

impl Default for UeConfig {
    fn default() -> Self {
        Self {
            max_harq_tx: 4,
            k0: 0,
            k1: 4,
            k2: 4,
        }
    }
}

/// Validated, immutable cell parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellParams {
    /// Cell configuration
    cell: CellConfig,
    /// Scheduler arguments
    args: SchedArgs,
}

impl CellParams {
    /// Validate and freeze a cell configuration
    pub fn new(cell: CellConfig, args: SchedArgs) -> ConfigResult<Self> {
        if cell.bwps.is_empty() {
            return Err(ConfigError::NoBandwidthParts);
        }
        if cell.nof_rbg == 0 || cell.nof_rbg as usize > MAX_NOF_RBGS {
            return Err(ConfigError::InvalidRbgCount(cell.nof_rbg));
        }
        for (idx, bwp) in cell.bwps.iter().enumerate() {
            Self::validate_bwp(idx as u8, bwp, cell.nof_rbg, &args)?;
        }
        Self::validate_args(&args)?;

        Ok(Self { cell, args })
    }

    /// Check one bandwidth part and its CORESETs
    fn validate_bwp(
        bwp_idx: u8,
        bwp: &BwpConfig,
        nof_rbg: u32,
        args: &SchedArgs,
    ) -> ConfigResult<()> {
        let width = bwp.rb_width as usize;
        let nof_rbg = nof_rbg as usize;
        // the last RBG must start inside the bandwidth part
        let last_rbg_start = (nof_rbg - 1) * rbg_size(width, nof_rbg);
        if width < nof_rbg || width > MAX_NOF_PRBS || last_rbg_start >= width {
            return Err(ConfigError::InvalidBwpWidth {
                bwp: bwp_idx,
                width: bwp.rb_width,
            });
        }

        let coreset_err = |cs: CoresetId| ConfigError::InvalidCoreset {
            bwp: bwp_idx,
            coreset: cs.as_u8(),
        };
        for (pos, cs) in bwp.coresets.iter().enumerate() {
            let duplicated = bwp.coresets.iter().take(pos).any(|other| other.id == cs.id);
            let freq_span = u32::from(cs.nof_freq_resources) * PRBS_PER_FREQ_RESOURCE;
            if duplicated
                || cs.nof_symbols == 0
                || cs.nof_symbols > MAX_CORESET_SYMBOLS
                || cs.nof_freq_resources == 0
                || freq_span as usize > width
                || cs.nof_cces() > MAX_NOF_CCES
            {
                return Err(coreset_err(cs.id));
            }
        }
        if bwp.coreset(args.default_dci.coreset_id).is_none() {
            return Err(coreset_err(args.default_dci.coreset_id));
        }
        Ok(())
    }

    /// Check ring length and per-slot caps
    fn validate_args(args: &SchedArgs) -> ConfigResult<()> {
        let ring = args.nof_slots_ring;
        if ring == 0 || ring > MAX_SLOT_RING || SLOT_WRAP as usize % ring != 0 {
            return Err(ConfigError::InvalidSlotRing(ring));
        }
        for cap in [args.max_pdsch_per_slot, args.max_pusch_per_slot, args.max_pucch_per_slot] {
            if cap == 0 || cap > MAX_GRANTS {
                return Err(ConfigError::InvalidCapacity(cap));
            }
        }
        let dci_cap = args.max_dci_per_coreset;
        if dci_cap == 0 || dci_cap > MAX_DCI_PER_CORESET {
            return Err(ConfigError::InvalidCapacity(dci_cap));
        }
        Ok(())
    }

    /// Check a UE's slot offsets against the slot ring
    ///
    /// The DL feedback slot must come strictly after the PDSCH slot, and
    /// every target slot must stay within one ring length of the PDCCH
    /// slot so it never aliases the grid of another live slot.
    pub fn validate_ue(&self, cfg: &UeConfig) -> ConfigResult<()> {
        let ring = self.args.nof_slots_ring as u64;
        let dl_span = u64::from(cfg.k0) + u64::from(cfg.k1);
        if cfg.k1 == 0 || dl_span >= ring || u64::from(cfg.k2) >= ring {
            return Err(ConfigError::InvalidUeTiming {
                k0: cfg.k0,
                k1: cfg.k1,
                k2: cfg.k2,
            });
        }
        Ok(())
    }

    /// Cell configuration
    pub const fn cell(&self) -> &CellConfig {
        &self.cell
    }

    /// Scheduler arguments
    pub const fn args(&self) -> &SchedArgs {
        &self.args
    }

    /// Number of RBGs per bandwidth part grid
    pub const fn nof_rbg(&self) -> usize {
        self.cell.nof_rbg as usize
    }

    /// Number of configured bandwidth parts
    pub fn nof_bwps(&self) -> usize {
        self.cell.bwps.len()
    }

    /// Configuration of one bandwidth part
    pub fn bwp(&self, bwp_id: BwpId) -> Option<&BwpConfig> {
        self.cell.bwps.get(bwp_id.as_usize())
    }
}
