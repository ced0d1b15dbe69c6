//! The three tempo-synced effect engines (§4.3–§4.5) and the shared
//! scheduling-field primitive they're built on.
//!
//! Each effect splits in two, mirroring the teacher's `SlicerAtomics` /
//! `SlicerState` split in `engine/slicer.rs`: a `*Shared` struct of atomics
//! that the control side writes and the audio side reads (and occasionally
//! clears), and an engine struct that lives exclusively in the audio
//! context and owns the actual sample buffers and per-sample state.

pub mod choke;
pub mod freeze;
pub mod stutter;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Whether an onset or release is engaged immediately or scheduled to a
/// quantized grid position (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OnsetMode {
    #[default]
    Free = 0,
    Quantized = 1,
}

impl OnsetMode {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => OnsetMode::Quantized,
            _ => OnsetMode::Free,
        }
    }

    /// Decode a `Command::param2` byte carrying a SET_PARAM mode bit (§4.7).
    pub(crate) fn from_param_byte(v: u8) -> Self {
        Self::from_u8(v)
    }

    /// FREE <-> QUANTIZED, for the encoder-button parameter-mode toggle (§4.9).
    pub fn toggled(self) -> Self {
        match self {
            OnsetMode::Free => OnsetMode::Quantized,
            OnsetMode::Quantized => OnsetMode::Free,
        }
    }
}

/// A single-writer(CC)/single-reader(AC) scheduled sample position. 0 means
/// "none". AC clears it back to 0 once the scheduled instant has been
/// consumed (§3 lifecycle); CC may also cancel by writing 0 (§5 cancellation).
#[derive(Debug, Default)]
pub struct ScheduledPosition(AtomicU64);

impl ScheduledPosition {
    pub fn none() -> Self {
        Self(AtomicU64::new(0))
    }

    /// CC: schedule (or cancel with 0).
    pub fn set(&self, position: u64) {
        self.0.store(position, Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            p => Some(p),
        }
    }

    /// AC: consume and clear back to the 0 sentinel.
    pub fn take(&self) -> Option<u64> {
        let v = self.0.swap(0, Ordering::Relaxed);
        if v == 0 {
            None
        } else {
            Some(v)
        }
    }

    /// Whether `position` falls within the block `[block_start, block_start + block_len)`.
    pub fn fires_in_block(position: u64, block_start: u64, block_len: u64) -> bool {
        position >= block_start && position < block_start + block_len
    }
}

/// Atomic holder for an [`OnsetMode`].
#[derive(Debug)]
pub struct ModeCell(AtomicU8);

impl ModeCell {
    pub fn new(mode: OnsetMode) -> Self {
        Self(AtomicU8::new(mode as u8))
    }

    pub fn set(&self, mode: OnsetMode) {
        self.0.store(mode as u8, Ordering::Relaxed);
    }

    pub fn get(&self) -> OnsetMode {
        OnsetMode::from_u8(self.0.load(Ordering::Relaxed))
    }
}

impl Default for ModeCell {
    fn default() -> Self {
        Self::new(OnsetMode::Free)
    }
}
