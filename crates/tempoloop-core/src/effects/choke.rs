//! CHOKE engine (§4.3) — instant mute with a short linear crossfade.
//!
//! Grounded on `effect/native/gain.rs`'s per-sample scaling, generalized
//! with a ramped target-gain follower in the style of
//! `engine/master_limiter.rs`'s envelope smoothing — a fixed per-sample
//! step computed once per transition rather than recomputed per sample
//! (recomputing the ratio every sample would make this a one-pole filter,
//! not the linear ramp §4.3 specifies and scenario 1 measures against).

use std::sync::atomic::{AtomicBool, Ordering};

use crate::effects::{ModeCell, ScheduledPosition};
use crate::types::StereoBuffer;

/// Control-side-writable, audio-side-readable CHOKE scheduling state.
#[derive(Debug, Default)]
pub struct ChokeShared {
    pub scheduled_onset: ScheduledPosition,
    pub scheduled_release: ScheduledPosition,
    pub onset_mode: ModeCell,
    pub length_mode: ModeCell,
    enabled: AtomicBool,
}

impl ChokeShared {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

/// Audio-context-exclusive CHOKE processing state.
pub struct ChokeEngine {
    current_gain: f32,
    target_gain: f32,
    step: f32,
    fade_samples: u32,
}

impl ChokeEngine {
    /// `fade_ms` / `sample_rate` determine `F = round(fade_ms * sample_rate / 1000)`.
    pub fn new(fade_ms: f32, sample_rate: u32) -> Self {
        let fade_samples = (fade_ms * sample_rate as f32 / 1000.0).round().max(1.0) as u32;
        Self {
            current_gain: 1.0,
            target_gain: 1.0,
            step: 0.0,
            fade_samples,
        }
    }

    fn retarget(&mut self, target: f32) {
        self.target_gain = target;
        self.step = (self.target_gain - self.current_gain) / self.fade_samples as f32;
    }

    pub fn current_gain(&self) -> f32 {
        self.current_gain
    }

    /// Process one audio block in place. `block_start` is the sample
    /// position of the block's first frame (AC-owned `TimeKeeper::sample_position`
    /// as observed at block start).
    pub fn process(&mut self, shared: &ChokeShared, block: &mut StereoBuffer, block_start: u64) {
        let block_len = block.len() as u64;

        if let Some(onset) = shared.scheduled_onset.get() {
            if ScheduledPosition::fires_in_block(onset, block_start, block_len) {
                shared.scheduled_onset.take();
                self.retarget(0.0);
                shared.set_enabled(true);
            }
        }
        if let Some(release) = shared.scheduled_release.get() {
            if ScheduledPosition::fires_in_block(release, block_start, block_len) {
                shared.scheduled_release.take();
                self.retarget(1.0);
                shared.set_enabled(false);
            }
        }

        for sample in block.iter_mut() {
            if self.step != 0.0 {
                self.current_gain += self.step;
                let overshot = (self.step > 0.0 && self.current_gain >= self.target_gain)
                    || (self.step < 0.0 && self.current_gain <= self.target_gain);
                if overshot {
                    self.current_gain = self.target_gain;
                    self.step = 0.0;
                }
            }
            self.current_gain = self.current_gain.clamp(0.0, 1.0);
            *sample = sample.scale(self.current_gain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_1_choke_free_free() {
        // S=44100, fadeMs=3 => F=132.
        let shared = ChokeShared::default();
        let mut engine = ChokeEngine::new(3.0, 44_100);
        shared.scheduled_onset.set(1_000);

        let mut block_start = 1_000u64;
        let mut block = StereoBuffer::silence(128);
        for s in block.iter_mut() {
            *s = crate::types::StereoSample::new(1.0, 1.0);
        }

        // Drive 132 samples across however many blocks it takes.
        let mut remaining = 132usize;
        while remaining > 0 {
            let n = remaining.min(128);
            let mut b = StereoBuffer::silence(n);
            for s in b.iter_mut() {
                *s = crate::types::StereoSample::new(1.0, 1.0);
            }
            engine.process(&shared, &mut b, block_start);
            block_start += n as u64;
            remaining -= n;
        }
        assert!(engine.current_gain() < 0.01, "gain={}", engine.current_gain());

        shared.scheduled_release.set(block_start);
        engine.process(&shared, &mut block, block_start);
        assert!(engine.current_gain() > 0.0);
    }
}
