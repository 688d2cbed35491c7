//! NR MAC Scheduler Core
//!
//! Per-cell, per-slot resource grid and the allocation primitives a
//! scheduling policy invokes for each candidate UE. This library provides the
//! bookkeeping for PDSCH/PUSCH resource block groups, PDCCH control channel
//! elements and the interlock with each UE's HARQ processes.
//!
//! # Architecture
//!
//! ```text
//! CellResGrid
//! └── BwpResGrid (one per bandwidth part)
//!     └── [BwpSlotGrid; ring]  (indexed by slot % ring length)
//!         ├── RbgOccupancy     (DL/UL RBG bitmaps)
//!         ├── CoresetRegion*   (CCE budget, DL/UL DCI lists)
//!         └── PDSCH / PUSCH / PUCCH grant lists
//! ```
//!
//! A [`allocator::BwpSlotAllocator`] borrows one BWP grid for the duration of a
//! slot pass. Every call either commits a grant, its DCI and the occupancy
//! update together, or fails without touching the grid.
//!
//! # Real-time behaviour
//!
//! - Every per-slot collection has a fixed capacity (`heapless`)
//! - The slot ring is allocated once at cell activation
//! - No locking: one scheduling thread owns one cell grid
//! - Allocation calls never block and never allocate

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::panic)]
#![warn(clippy::unwrap_used)]

extern crate alloc as alloc_crate;

#[macro_use]
pub mod macros;

pub mod allocator;
pub mod config;
pub mod grid;
pub mod harq;
pub mod types;

pub use crate::allocator::{
    AllocError, AllocResult, AllocStats, BwpSlotAllocator, GrantRef, SlotUe,
};
pub use crate::config::{
    BwpConfig, CellConfig, CellParams, ConfigError, ConfigResult, CoresetConfig, DciParams,
    SchedArgs, UeConfig,
};
pub use crate::grid::{BwpResGrid, BwpSlotGrid, CellResGrid, RbgMask};
pub use crate::harq::{HarqEntity, HarqError, HarqProc, HarqProcess, HarqResult};
pub use crate::types::{BwpId, CoresetId, Direction, HarqId, Rnti, SlotPoint};

#[doc(hidden)]
pub mod __private {
    pub use tracing;
}
