//! HARQ Processes
//!
//! The allocator never owns a UE's HARQ processes; it borrows one process per
//! direction for the duration of a call through the [`HarqProcess`] trait and
//! only queries and transitions it. [`HarqProc`] and [`HarqEntity`] are the
//! stop-and-wait implementation used by the UE objects of this crate.
//!
//! # Process States
//!
//! ```text
//!           new_tx                  NACK (tx < max_tx)
//! Empty ───────────> WaitingAck ───────────────────> PendingRetx
//!   ^                 │  ^   │                           │
//!   │   ACK, or NACK  │  │   │ new_retx                  │ new_retx
//!   +── with tx==max ─+  │   v                           │
//!                        +── WaitingAck <────────────────+
//! ```
//!
//! A retransmission goes out on the RBGs of the initial transmission and
//! keeps its MCS, TBS and NDI value; only a new transmission toggles the NDI.

#![deny(missing_docs)]

use heapless::Vec;
use thiserror_no_std::Error;

use crate::grid::bitmask::RbgMask;
use crate::types::{HarqId, SlotPoint};

/// Maximum number of HARQ processes per UE and direction
pub const MAX_HARQ_PROCS: usize = 16;

/// HARQ state-machine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HarqError {
    /// A new transmission was requested on a busy process
    #[error("HARQ process {0:?} is not empty")]
    NotEmpty(HarqId),
    /// A retransmission or feedback was requested on an empty process
    #[error("HARQ process {0:?} is empty")]
    Empty(HarqId),
    /// No process with this identifier
    #[error("unknown HARQ process {0:?}")]
    UnknownProcess(HarqId),
}

/// Result type for HARQ operations
pub type HarqResult<T> = Result<T, HarqError>;

/// Transport parameters of the block held by a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TbInfo {
    /// Modulation and coding scheme index
    pub mcs: u8,
    /// Transport block size
    pub tbs: u32,
}

/// Retransmission process interface consumed by the allocator
pub trait HarqProcess {
    /// Process identifier
    fn id(&self) -> HarqId;

    /// Whether the process holds no transport block
    fn empty(&self) -> bool;

    /// Current new data indicator
    fn ndi(&self) -> bool;

    /// RBGs of the held block; a retransmission reuses them
    fn mask(&self) -> RbgMask;

    /// Start a new transmission
    ///
    /// `max_tx` bounds the total number of transmissions of the block.
    fn new_tx(
        &mut self,
        slot_tx: SlotPoint,
        slot_ack: SlotPoint,
        mask: &RbgMask,
        tb: TbInfo,
        max_tx: u32,
    ) -> HarqResult<()>;

    /// Start a retransmission of the stored block
    ///
    /// The stored RBGs and transport parameters are kept; the latter are
    /// returned for the retransmission grant.
    fn new_retx(&mut self, slot_tx: SlotPoint, slot_ack: SlotPoint) -> HarqResult<TbInfo>;
}

/// HARQ process states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqState {
    /// No transport block held
    Empty,
    /// Transmitted, awaiting ACK/NACK
    WaitingAck,
    /// NACK received, eligible for retransmission
    PendingRetx,
}

/// Stop-and-wait HARQ process
#[derive(Debug, Clone)]
pub struct HarqProc {
    /// Process identifier
    id: HarqId,
    /// Current state
    state: HarqState,
    /// New data indicator
    ndi: bool,
    /// Slot of the latest (re)transmission
    slot_tx: SlotPoint,
    /// Slot where feedback for the latest transmission is expected
    slot_ack: SlotPoint,
    /// RBGs of the held block
    mask: RbgMask,
    /// Transport parameters of the held block
    tb: TbInfo,
    /// Transmissions of the held block so far
    nof_tx: u32,
    /// Transmission ceiling for the held block
    max_tx: u32,
}

impl HarqProc {
    /// Create an empty process
    pub const fn new(id: HarqId) -> Self {
        Self {
            id,
            state: HarqState::Empty,
            ndi: false,
            slot_tx: SlotPoint::new(0),
            slot_ack: SlotPoint::new(0),
            mask: RbgMask::new(0),
            tb: TbInfo { mcs: 0, tbs: 0 },
            nof_tx: 0,
            max_tx: 0,
        }
    }

    /// Current state
    pub const fn state(&self) -> HarqState {
        self.state
    }

    /// Whether a NACK left the block waiting for a retransmission
    pub fn has_pending_retx(&self) -> bool {
        self.state == HarqState::PendingRetx
    }

    /// Transport parameters of the held block
    pub const fn tb(&self) -> TbInfo {
        self.tb
    }

    /// Transmissions of the held block so far
    pub const fn nof_tx(&self) -> u32 {
        self.nof_tx
    }

    /// Retransmissions of the held block so far
    pub const fn nof_retx(&self) -> u32 {
        self.nof_tx.saturating_sub(1)
    }

    /// Slot of the latest (re)transmission
    pub const fn slot_tx(&self) -> SlotPoint {
        self.slot_tx
    }

    /// Slot where feedback is expected
    pub const fn slot_ack(&self) -> SlotPoint {
        self.slot_ack
    }

    /// Apply HARQ feedback
    ///
    /// Returns `true` when the process was emptied, either by an ACK or by a
    /// NACK once the transmission ceiling is reached.
    pub fn ack_info(&mut self, ack: bool) -> HarqResult<bool> {
        if self.state == HarqState::Empty {
            return Err(HarqError::Empty(self.id));
        }
        if ack || self.nof_tx >= self.max_tx {
            if !ack {
                sched_log!(
                    INFO,
                    "SCHED: HARQ pid={} dropped after {} transmissions",
                    self.id.as_u8(),
                    self.nof_tx
                );
            }
            self.reset();
            return Ok(true);
        }
        self.state = HarqState::PendingRetx;
        Ok(false)
    }

    /// Drop the held block
    pub fn reset(&mut self) {
        self.state = HarqState::Empty;
        self.nof_tx = 0;
        self.max_tx = 0;
        self.mask.clear();
        self.tb = TbInfo::default();
    }
}

impl HarqProcess for HarqProc {
    fn id(&self) -> HarqId {
        self.id
    }

    fn empty(&self) -> bool {
        self.state == HarqState::Empty
    }

    fn ndi(&self) -> bool {
        self.ndi
    }

    fn mask(&self) -> RbgMask {
        self.mask
    }

    fn new_tx(
        &mut self,
        slot_tx: SlotPoint,
        slot_ack: SlotPoint,
        mask: &RbgMask,
        tb: TbInfo,
        max_tx: u32,
    ) -> HarqResult<()> {
        if !self.empty() {
            return Err(HarqError::NotEmpty(self.id));
        }
        self.state = HarqState::WaitingAck;
        self.ndi = !self.ndi;
        self.slot_tx = slot_tx;
        self.slot_ack = slot_ack;
        self.mask = *mask;
        self.tb = tb;
        self.nof_tx = 1;
        self.max_tx = max_tx;
        Ok(())
    }

    fn new_retx(&mut self, slot_tx: SlotPoint, slot_ack: SlotPoint) -> HarqResult<TbInfo> {
        if self.empty() {
            return Err(HarqError::Empty(self.id));
        }
        self.state = HarqState::WaitingAck;
        self.slot_tx = slot_tx;
        self.slot_ack = slot_ack;
        self.nof_tx += 1;
        Ok(self.tb)
    }
}

/// HARQ processes of one UE in one direction
#[derive(Debug, Clone)]
pub struct HarqPool {
    /// Processes indexed by HARQ ID
    procs: Vec<HarqProc, MAX_HARQ_PROCS>,
}

impl HarqPool {
    /// Create `nof_procs` empty processes (capped at [`MAX_HARQ_PROCS`])
    pub fn new(nof_procs: usize) -> Self {
        let mut procs = Vec::new();
        for pid in 0..nof_procs.min(MAX_HARQ_PROCS) {
            let _ = procs.push(HarqProc::new(HarqId::new(pid as u8)));
        }
        Self { procs }
    }

    /// Number of processes
    pub fn len(&self) -> usize {
        self.procs.len()
    }

    /// Whether the pool has no process
    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    /// Look up a process
    pub fn get(&self, id: HarqId) -> Option<&HarqProc> {
        self.procs.get(usize::from(id.as_u8()))
    }

    /// Look up a process mutably
    pub fn get_mut(&mut self, id: HarqId) -> Option<&mut HarqProc> {
        self.procs.get_mut(usize::from(id.as_u8()))
    }

    /// First process waiting for a retransmission
    pub fn find_pending_retx(&mut self) -> Option<&mut HarqProc> {
        self.procs.iter_mut().find(|h| h.has_pending_retx())
    }

    /// First empty process
    pub fn find_empty(&mut self) -> Option<&mut HarqProc> {
        self.procs.iter_mut().find(|h| h.empty())
    }

    /// Process to offer the allocator: a pending retransmission first,
    /// otherwise an empty process
    pub fn candidate(&mut self) -> Option<&mut HarqProc> {
        let pos = self
            .procs
            .iter()
            .position(HarqProc::has_pending_retx)
            .or_else(|| self.procs.iter().position(|h| h.empty()))?;
        self.procs.get_mut(pos)
    }

    /// Forward feedback to a process
    pub fn ack_info(&mut self, id: HarqId, ack: bool) -> HarqResult<bool> {
        self.get_mut(id).ok_or(HarqError::UnknownProcess(id))?.ack_info(ack)
    }
}

/// DL and UL HARQ processes of one UE
#[derive(Debug, Clone)]
pub struct HarqEntity {
    /// DL processes
    pub dl: HarqPool,
    /// UL processes
    pub ul: HarqPool,
}

impl HarqEntity {
    /// Create an entity with `nof_procs` processes per direction
    pub fn new(nof_procs: usize) -> Self {
        Self {
            dl: HarqPool::new(nof_procs),
            ul: HarqPool::new(nof_procs),
        }
    }
}
