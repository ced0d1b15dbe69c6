//! FREEZE engine (§4.4) — continuous short circular capture, switched to
//! looped playback on engage.
//!
//! Grounded on `engine/latency.rs`'s `DelayLine`: a circular buffer with a
//! wrapping write position, generalized here with a second (read) position
//! so the same buffer can serve either as a rolling record buffer or, once
//! engaged, a fixed loop source.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::effects::{ModeCell, ScheduledPosition};
use crate::types::{StereoBuffer, StereoSample};

#[derive(Debug, Default)]
pub struct FreezeShared {
    pub scheduled_onset: ScheduledPosition,
    pub scheduled_release: ScheduledPosition,
    pub onset_mode: ModeCell,
    pub length_mode: ModeCell,
    enabled: AtomicBool,
}

impl FreezeShared {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

/// Audio-context-exclusive FREEZE processing state. `buffer` is `N_f`
/// stereo samples, sized for a musically useful micro-loop (default ≈ 3ms).
pub struct FreezeEngine {
    buffer: Vec<StereoSample>,
    write_pos: usize,
    read_pos: usize,
}

impl FreezeEngine {
    pub fn new(n_f: usize) -> Self {
        Self {
            buffer: vec![StereoSample::silence(); n_f.max(1)],
            write_pos: 0,
            read_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn process(&mut self, shared: &FreezeShared, block: &mut StereoBuffer, block_start: u64) {
        let block_len = block.len() as u64;
        let was_enabled = shared.is_enabled();

        if let Some(onset) = shared.scheduled_onset.get() {
            if ScheduledPosition::fires_in_block(onset, block_start, block_len) {
                shared.scheduled_onset.take();
                shared.set_enabled(true);
            }
        }
        if let Some(release) = shared.scheduled_release.get() {
            if ScheduledPosition::fires_in_block(release, block_start, block_len) {
                shared.scheduled_release.take();
                shared.set_enabled(false);
            }
        }

        let now_enabled = shared.is_enabled();
        if now_enabled && !was_enabled {
            // Engage: snapshot the capture point atomically with this block boundary.
            self.read_pos = self.write_pos;
        }

        let n_f = self.buffer.len();
        if now_enabled {
            for sample in block.iter_mut() {
                *sample = self.buffer[self.read_pos];
                self.read_pos = (self.read_pos + 1) % n_f;
            }
        } else {
            for sample in block.iter_mut() {
                self.buffer[self.write_pos] = *sample;
                self.write_pos = (self.write_pos + 1) % n_f;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_4_freeze_free() {
        let shared = FreezeShared::default();
        let mut engine = FreezeEngine::new(8);

        // Feed a ramp through while disabled so the circular buffer holds
        // a known tail: [..., 5, 6, 7] at the last N_f=8 positions.
        let mut fill = StereoBuffer::silence(8);
        for (i, s) in fill.iter_mut().enumerate() {
            *s = StereoSample::new(i as f32, i as f32);
        }
        engine.process(&shared, &mut fill, 9_992);

        shared.scheduled_onset.set(10_000);
        let mut block = StereoBuffer::silence(8);
        for s in block.iter_mut() {
            *s = StereoSample::new(99.0, 99.0);
        }
        engine.process(&shared, &mut block, 10_000);

        assert!(shared.is_enabled());
        // Looped output should be the frozen buffer, not the passthrough input.
        assert_eq!(block[0].left, fill.as_slice()[0].left);
    }
}
