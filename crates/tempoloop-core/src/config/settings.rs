//! Performer-tunable settings
//!
//! Everything here has a sensible default matching the values named in the
//! core's design: fade time, lookahead, default quantization, and the
//! button→command mapping table. None of it affects real-time safety — it's
//! all read once at startup (or on an explicit reload) and handed to the
//! control-side components as plain values.

use serde::{Deserialize, Serialize};

use crate::command::{CommandKind, TargetEffect};
use crate::time::Quantization;

/// A single row of the button mapping table (§6): which command fires on
/// press and release for a physical key index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeyMapping {
    pub key_index: u8,
    pub press: CommandKind,
    pub release: CommandKind,
    pub target: TargetEffect,
}

impl KeyMapping {
    pub const fn new(
        key_index: u8,
        press: CommandKind,
        release: CommandKind,
        target: TargetEffect,
    ) -> Self {
        Self {
            key_index,
            press,
            release,
            target,
        }
    }
}

/// Default four-key mapping from §6: FREEZE, CHOKE, STUTTER, FUNC.
pub fn default_key_mappings() -> Vec<KeyMapping> {
    vec![
        KeyMapping::new(
            0,
            CommandKind::Enable,
            CommandKind::Disable,
            TargetEffect::Freeze,
        ),
        KeyMapping::new(
            1,
            CommandKind::Enable,
            CommandKind::Disable,
            TargetEffect::Choke,
        ),
        KeyMapping::new(
            2,
            CommandKind::Enable,
            CommandKind::Disable,
            TargetEffect::Stutter,
        ),
        KeyMapping::new(
            3,
            CommandKind::Enable,
            CommandKind::Disable,
            TargetEffect::Func,
        ),
    ]
}

/// Top-level tunables for the looper core, loadable from `tempoloop.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LooperConfig {
    /// Sample rate the core assumes for the session (Hz).
    pub sample_rate: u32,
    /// Audio block size in stereo frames.
    pub block_size: usize,
    /// CHOKE fade time in milliseconds (§4.3 default 3).
    pub choke_fade_ms: f32,
    /// Quantized-onset lookahead in samples (§4.6/Glossary default 128).
    pub lookahead_samples: u64,
    /// On-time tolerance for `samples_to_next_beat` in samples (§4.2 default 16).
    pub on_time_tolerance: u64,
    /// Default quantization grid (§3 default QUANT_16).
    pub default_quantization: Quantization,
    /// FREEZE capture buffer length in samples (resolves Open Question 2; see DESIGN.md).
    pub freeze_buffer_samples: usize,
    /// Button → command mapping table.
    pub key_mappings: Vec<KeyMapping>,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 128,
            choke_fade_ms: 3.0,
            lookahead_samples: 128,
            on_time_tolerance: 16,
            default_quantization: Quantization::Quant16,
            freeze_buffer_samples: 132, // ~3ms at 44.1kHz, see DESIGN.md
            key_mappings: default_key_mappings(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec_constants() {
        let cfg = LooperConfig::default();
        assert_eq!(cfg.lookahead_samples, 128);
        assert_eq!(cfg.on_time_tolerance, 16);
        assert_eq!(cfg.key_mappings.len(), 4);
    }
}
