//! Scheduler Identifiers and Slot Arithmetic
//!
//! Small value types shared by the grid, the HARQ processes and the
//! allocator. Slot points count slots within one hyper-frame and wrap at
//! [`SLOT_WRAP`], so every comparison between slots is modular.
//!
//! ```text
//! slot count:  0 1 2 ... 9 | 10 ... 19 | ... | 10230 ... 10239 | 0 ...
//! sfn.slot  :  0.0  ...  0.9 | 1.0 ... | ... | 1023.0 ... 1023.9 | 0.0
//! ```

#![deny(missing_docs)]

use core::fmt;
use core::ops::{Add, AddAssign};

/// Number of slots per radio frame
pub const NOF_SLOTS_PER_FRAME: u32 = 10;

/// Number of system frame numbers before wrap-around
pub const NOF_SFNS: u32 = 1024;

/// Slot counter wrap-around (one hyper-frame)
pub const SLOT_WRAP: u32 = NOF_SLOTS_PER_FRAME * NOF_SFNS;

/// Absolute slot within a hyper-frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotPoint(u32);

impl SlotPoint {
    /// Create a slot point from a raw slot count, wrapping at [`SLOT_WRAP`]
    pub const fn new(count: u32) -> Self {
        Self(count % SLOT_WRAP)
    }

    /// Create a slot point from a system frame number and a slot index
    pub const fn from_sfn(sfn: u32, slot_idx: u32) -> Self {
        Self::new((sfn % NOF_SFNS) * NOF_SLOTS_PER_FRAME + slot_idx % NOF_SLOTS_PER_FRAME)
    }

    /// Get the raw slot count
    pub const fn to_uint(self) -> u32 {
        self.0
    }

    /// System frame number
    pub const fn sfn(self) -> u32 {
        self.0 / NOF_SLOTS_PER_FRAME
    }

    /// Slot index within the frame
    pub const fn slot_idx(self) -> u32 {
        self.0 % NOF_SLOTS_PER_FRAME
    }

    /// Position of this slot in a ring of `ring_len` entries
    ///
    /// `ring_len` must divide [`SLOT_WRAP`] for the ring to stay aligned
    /// across the hyper-frame boundary.
    pub const fn ring_index(self, ring_len: usize) -> usize {
        self.0 as usize % ring_len
    }

    /// Number of slots from `earlier` forward to `self`
    pub const fn distance_from(self, earlier: Self) -> u32 {
        (self.0 + SLOT_WRAP - earlier.0) % SLOT_WRAP
    }
}

impl Add<u32> for SlotPoint {
    type Output = Self;

    fn add(self, rhs: u32) -> Self {
        Self::new(self.0 + rhs % SLOT_WRAP)
    }
}

impl AddAssign<u32> for SlotPoint {
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sfn(), self.slot_idx())
    }
}

/// Radio network temporary identifier of a UE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rnti(u16);

impl Rnti {
    /// Create a new RNTI
    pub const fn new(rnti: u16) -> Self {
        Self(rnti)
    }

    /// Get the raw RNTI value
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Bandwidth part identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BwpId(u8);

impl BwpId {
    /// Create a new BWP ID
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the BWP ID as an index
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// CORESET (control-channel region) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoresetId(u8);

impl CoresetId {
    /// Create a new CORESET ID
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

/// HARQ process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HarqId(u8);

impl HarqId {
    /// Create a new HARQ process ID
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

/// Link direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Downlink (PDSCH)
    Dl,
    /// Uplink (PUSCH)
    Ul,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dl => f.write_str("DL"),
            Self::Ul => f.write_str("UL"),
        }
    }
}
