//! Resource Grid Hierarchy
//!
//! The scheduler's view of one cell: which RBGs, CCEs and grant slots are
//! already taken in every slot of the scheduling window.
//!
//! # Structure
//!
//! - [`CellResGrid`]: one [`BwpResGrid`] per configured bandwidth part
//! - [`BwpResGrid`]: fixed ring of [`BwpSlotGrid`]s, indexed by slot
//! - [`BwpSlotGrid`]: RBG occupancy, CORESET regions and grant lists
//!
//! The grids are created once at cell activation; afterwards only their
//! contents change, through the allocator (append) and the slot clock
//! (reset).

#![deny(missing_docs)]

pub mod bitmask;
pub mod bwp;
pub mod occupancy;
pub mod pdcch;
pub mod slot;

pub use bitmask::{CceMask, PrbMask, RbgMask};
pub use bwp::{BwpResGrid, CellResGrid, MAX_BWPS, MAX_SLOT_RING};
pub use occupancy::RbgOccupancy;
pub use pdcch::{AggregationLevel, CoresetRegion, DciHandle, DciPayload, DciType, PdcchGrant};
pub use slot::{BwpSlotGrid, PdschGrant, PucchGrant, PuschGrant, MAX_GRANTS};
