//! Fixed-Width Bitmasks
//!
//! One bounded bitset type backs the RBG masks, the PRB masks handed to the
//! physical layer and the CCE occupancy of each CORESET. The width is chosen
//! at runtime (from the cell configuration) up to a compile-time capacity,
//! so a mask never allocates.
//!
//! Bit `i` of the textual form is character `i`, left to right:
//! `"1100"` marks groups 0 and 1.

#![deny(missing_docs)]

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};
use static_assertions::const_assert;

/// Maximum number of resource block groups in a bandwidth part
pub const MAX_NOF_RBGS: usize = 64;

/// Maximum number of physical resource blocks in a bandwidth part
pub const MAX_NOF_PRBS: usize = 275;

/// Maximum number of CCEs in one CORESET (45 frequency resources x 3 symbols)
pub const MAX_NOF_CCES: usize = 135;

const WORD_BITS: usize = u64::BITS as usize;

const_assert!(MAX_NOF_RBGS <= WORD_BITS);
const_assert!(MAX_NOF_PRBS <= 5 * WORD_BITS);
const_assert!(MAX_NOF_CCES <= 3 * WORD_BITS);

/// Resource block group mask (one bit per RBG)
pub type RbgMask = Bitmask<1>;

/// Physical resource block mask (one bit per PRB)
pub type PrbMask = Bitmask<5>;

/// Control channel element mask (one bit per CCE)
pub type CceMask = Bitmask<3>;

/// Bitset of runtime width backed by `W` 64-bit words
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bitmask<const W: usize> {
    /// Bit storage, bit `i` lives in word `i / 64`
    words: [u64; W],
    /// Number of valid bits
    len: usize,
}

impl<const W: usize> Bitmask<W> {
    /// Largest width this mask type can hold
    pub const CAPACITY: usize = W * WORD_BITS;

    /// Create an all-clear mask of `len` bits (clamped to [`Self::CAPACITY`])
    pub const fn new(len: usize) -> Self {
        let len = if len > Self::CAPACITY { Self::CAPACITY } else { len };
        Self { words: [0; W], len }
    }

    /// Create a mask of `len` bits from the low bits of `bits`
    pub fn from_bits(len: usize, bits: u64) -> Self {
        let mut mask = Self::new(len);
        if let Some(word) = mask.words.first_mut() {
            *word = bits;
        }
        mask.trim();
        mask
    }

    /// Parse a mask from a string of `0`/`1` characters
    ///
    /// The mask width equals the string length. Returns `None` on any other
    /// character or if the string is wider than [`Self::CAPACITY`].
    pub fn from_bit_str(bits: &str) -> Option<Self> {
        if bits.len() > Self::CAPACITY {
            return None;
        }
        let mut mask = Self::new(bits.len());
        for (idx, ch) in bits.chars().enumerate() {
            match ch {
                '1' => mask.set(idx),
                '0' => {}
                _ => return None,
            }
        }
        Some(mask)
    }

    /// Number of valid bits
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check whether the mask has zero width
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check a single bit; out-of-range bits read as clear
    pub fn test(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        self.words
            .get(idx / WORD_BITS)
            .is_some_and(|word| word & (1u64 << (idx % WORD_BITS)) != 0)
    }

    /// Set a single bit; out-of-range indices are ignored
    pub fn set(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "bit {idx} out of range for width {}", self.len);
        if idx >= self.len {
            return;
        }
        if let Some(word) = self.words.get_mut(idx / WORD_BITS) {
            *word |= 1u64 << (idx % WORD_BITS);
        }
    }

    /// Clear a single bit
    pub fn unset(&mut self, idx: usize) {
        if let Some(word) = self.words.get_mut(idx / WORD_BITS) {
            *word &= !(1u64 << (idx % WORD_BITS));
        }
    }

    /// Set every bit in `start..end` (clamped to the mask width)
    pub fn fill(&mut self, start: usize, end: usize) {
        for idx in start..end.min(self.len) {
            self.set(idx);
        }
    }

    /// Clear every bit, keeping the width
    pub fn clear(&mut self) {
        self.words = [0; W];
    }

    /// Check whether any bit is set
    pub fn any(&self) -> bool {
        self.words.iter().any(|word| *word != 0)
    }

    /// Check whether no bit is set
    pub fn none(&self) -> bool {
        !self.any()
    }

    /// Number of set bits
    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Check whether `self` and `other` share any set bit
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Check whether every bit of `range` is clear
    pub fn is_range_clear(&self, start: usize, end: usize) -> bool {
        end <= self.len && (start..end).all(|idx| !self.test(idx))
    }

    /// Iterate over the indices of set bits in ascending order
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |idx| self.test(*idx))
    }

    /// Raw word value of the first 64 bits
    pub fn first_word(&self) -> u64 {
        self.words.first().copied().unwrap_or(0)
    }

    /// Drop any bits beyond `len`
    fn trim(&mut self) {
        for (widx, word) in self.words.iter_mut().enumerate() {
            let base = widx * WORD_BITS;
            if base >= self.len {
                *word = 0;
            } else if self.len - base < WORD_BITS {
                *word &= (1u64 << (self.len - base)) - 1;
            }
        }
    }
}

impl<const W: usize> BitOrAssign<&Self> for Bitmask<W> {
    fn bitor_assign(&mut self, rhs: &Self) {
        for (a, b) in self.words.iter_mut().zip(rhs.words.iter()) {
            *a |= b;
        }
        self.trim();
    }
}

impl<const W: usize> BitOr for Bitmask<W> {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        self |= &rhs;
        self
    }
}

impl<const W: usize> BitAnd for Bitmask<W> {
    type Output = Self;

    fn bitand(mut self, rhs: Self) -> Self {
        for (a, b) in self.words.iter_mut().zip(rhs.words.iter()) {
            *a &= b;
        }
        self
    }
}

impl<const W: usize> fmt::Display for Bitmask<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for idx in 0..self.len {
            f.write_str(if self.test(idx) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl<const W: usize> fmt::Debug for Bitmask<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmask({self})")
    }
}

/// Nominal RBG size for a bandwidth part of `nof_prbs` split into `nof_rbg`
pub const fn rbg_size(nof_prbs: usize, nof_rbg: usize) -> usize {
    if nof_rbg == 0 {
        return 0;
    }
    nof_prbs.div_ceil(nof_rbg)
}

/// Expand an RBG mask into the PRBs it covers
///
/// Each RBG spans `rbg_size` PRBs; the last group is truncated at
/// `nof_prbs`.
pub fn rbg_to_prb_mask(rbgs: &RbgMask, rbg_size: usize, nof_prbs: usize) -> PrbMask {
    let mut prbs = PrbMask::new(nof_prbs);
    for rbg in rbgs.iter_ones() {
        let start = rbg * rbg_size;
        prbs.fill(start, start + rbg_size);
    }
    prbs
}
