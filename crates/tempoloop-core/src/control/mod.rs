//! Effect controllers and the command plane (§4.6, §4.7) — control-context-only.
//!
//! Each controller holds shared references to its effect's `*Shared`
//! scheduling state and the `TimeKeeper`, and exposes the three operations
//! §4.6 names. Grounded on `engine/slicer.rs`'s `handle_button_action`
//! (button event mutates shared atomics) and `mesh-midi/shared_state.rs`'s
//! modifier-key latch for FUNC+STUTTER ordering.

pub mod choke;
pub mod command_plane;
pub mod freeze;
pub mod stutter;

use std::sync::atomic::{AtomicU8, Ordering};

use crate::time::Quantization;

/// Result of a controller's button-event interception (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleResult {
    Handled,
    Passthrough,
}

/// Shared, CC-editable quantization grid selector (§3). One global selector
/// bound to an encoder per §6; all three effect controllers read it.
#[derive(Debug)]
pub struct QuantSelector(AtomicU8);

impl QuantSelector {
    pub fn new(default: Quantization) -> Self {
        Self(AtomicU8::new(quant_to_u8(default)))
    }

    pub fn get(&self) -> Quantization {
        quant_from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, q: Quantization) {
        self.0.store(quant_to_u8(q), Ordering::Relaxed);
    }
}

impl Default for QuantSelector {
    fn default() -> Self {
        Self::new(Quantization::Quant16)
    }
}

fn quant_to_u8(q: Quantization) -> u8 {
    match q {
        Quantization::Quant32 => 0,
        Quantization::Quant16 => 1,
        Quantization::Quant8 => 2,
        Quantization::Quant4 => 3,
    }
}

fn quant_from_u8(v: u8) -> Quantization {
    match v {
        0 => Quantization::Quant32,
        2 => Quantization::Quant8,
        3 => Quantization::Quant4,
        _ => Quantization::Quant16,
    }
}
