//! STUTTER engine (§4.5) — eight-state arm/capture/play machine.
//!
//! Grounded on `engine/slicer.rs`'s `SlicerState`: a capture buffer plus
//! enable/pending-enable staging driven entirely from the audio callback,
//! generalized from "remap playback order" to "arm, capture, then loop a
//! single captured span" with the state table and tie-breaks from §4.5.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::effects::{ModeCell, ScheduledPosition};
use crate::types::{StereoBuffer, StereoSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StutterState {
    IdleNoLoop = 0,
    IdleWithLoop = 1,
    WaitCaptureStart = 2,
    Capturing = 3,
    WaitCaptureEnd = 4,
    WaitPlaybackOnset = 5,
    Playing = 6,
    WaitPlaybackLength = 7,
}

impl StutterState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => StutterState::IdleWithLoop,
            2 => StutterState::WaitCaptureStart,
            3 => StutterState::Capturing,
            4 => StutterState::WaitCaptureEnd,
            5 => StutterState::WaitPlaybackOnset,
            6 => StutterState::Playing,
            7 => StutterState::WaitPlaybackLength,
            _ => StutterState::IdleNoLoop,
        }
    }
}

/// Externally requested (button-driven) immediate transitions — trigger
/// type (c) in §4.5. Scheduled-position firing (a) and buffer-full (b)
/// are handled inside `process` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StutterRequest {
    None = 0,
    CaptureNow = 1,
    CancelWaitCaptureStart = 2,
    StopCaptureNow = 3,
    WaitCaptureEndNow = 4,
    PlayNow = 5,
    WaitPlaybackOnsetNow = 6,
    StopPlaybackNow = 7,
    WaitPlaybackLengthNow = 8,
}

impl StutterRequest {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => StutterRequest::CaptureNow,
            2 => StutterRequest::CancelWaitCaptureStart,
            3 => StutterRequest::StopCaptureNow,
            4 => StutterRequest::WaitCaptureEndNow,
            5 => StutterRequest::PlayNow,
            6 => StutterRequest::WaitPlaybackOnsetNow,
            7 => StutterRequest::StopPlaybackNow,
            8 => StutterRequest::WaitPlaybackLengthNow,
            _ => StutterRequest::None,
        }
    }
}

#[derive(Debug)]
pub struct StutterShared {
    pub capture_start: ScheduledPosition,
    pub capture_end: ScheduledPosition,
    pub playback_onset: ScheduledPosition,
    pub playback_length: ScheduledPosition,
    pub capture_start_mode: ModeCell,
    pub capture_end_mode: ModeCell,
    pub onset_mode: ModeCell,
    pub length_mode: ModeCell,
    held: AtomicBool,
    state: AtomicU8,
    capture_length: AtomicU64,
    request: AtomicU8,
}

impl Default for StutterShared {
    fn default() -> Self {
        Self {
            capture_start: ScheduledPosition::none(),
            capture_end: ScheduledPosition::none(),
            playback_onset: ScheduledPosition::none(),
            playback_length: ScheduledPosition::none(),
            capture_start_mode: ModeCell::default(),
            capture_end_mode: ModeCell::default(),
            onset_mode: ModeCell::default(),
            length_mode: ModeCell::default(),
            held: AtomicBool::new(false),
            state: AtomicU8::new(StutterState::IdleNoLoop as u8),
            capture_length: AtomicU64::new(0),
            request: AtomicU8::new(StutterRequest::None as u8),
        }
    }
}

impl StutterShared {
    /// CC: latch whether the physical STUTTER key is currently held.
    pub fn set_held(&self, held: bool) {
        self.held.store(held, Ordering::Relaxed);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// CC: request an immediate (non-scheduled) transition.
    pub fn request(&self, req: StutterRequest) {
        self.request.store(req as u8, Ordering::Relaxed);
    }

    fn take_request(&self) -> StutterRequest {
        StutterRequest::from_u8(self.request.swap(StutterRequest::None as u8, Ordering::Relaxed))
    }

    fn set_state(&self, state: StutterState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn state(&self) -> StutterState {
        StutterState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn capture_length(&self) -> u64 {
        self.capture_length.load(Ordering::Relaxed)
    }
}

/// Audio-context-exclusive STUTTER processing state. `buffer` is `N_s`
/// stereo samples, sized to hold one bar at the minimum supported tempo.
/// Non-circular: capture writes stop at capacity rather than wrapping.
pub struct StutterEngine {
    buffer: Vec<StereoSample>,
    write_pos: usize,
    read_pos: usize,
}

impl StutterEngine {
    pub fn new(n_s: usize) -> Self {
        Self {
            buffer: vec![StereoSample::silence(); n_s.max(1)],
            write_pos: 0,
            read_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn start_capture(&mut self, shared: &StutterShared) {
        self.write_pos = 0;
        shared.capture_end.take();
        shared.set_state(StutterState::Capturing);
    }

    /// Finalize a capture (button release, quantized end firing, or
    /// buffer-full) and return the destination state per the post-capture
    /// transition rule (§4.5).
    fn finalize_capture(&mut self, shared: &StutterShared) -> StutterState {
        let len = self.write_pos;
        shared.capture_length.store(len as u64, Ordering::Relaxed);
        shared.capture_end.take();
        shared.playback_onset.take();
        let dest = if len == 0 {
            StutterState::IdleNoLoop
        } else if shared.is_held() {
            self.read_pos = 0;
            StutterState::Playing
        } else {
            StutterState::IdleWithLoop
        };
        shared.set_state(dest);
        dest
    }

    pub fn process(&mut self, shared: &StutterShared, block: &mut StereoBuffer, block_start: u64) {
        let block_len = block.len() as u64;
        let mut state = shared.state();

        // Reflect a freshly-scheduled quantized onset as a distinct wait state
        // (audio behavior unchanged, purely a visual-state transition).
        if state == StutterState::IdleNoLoop && shared.capture_start.get().is_some() {
            state = StutterState::WaitCaptureStart;
            shared.set_state(state);
        }
        if state == StutterState::IdleWithLoop && shared.playback_onset.get().is_some() {
            state = StutterState::WaitPlaybackOnset;
            shared.set_state(state);
        }

        // (c) externally requested immediate transitions.
        match shared.take_request() {
            StutterRequest::CaptureNow
                if matches!(state, StutterState::IdleNoLoop | StutterState::IdleWithLoop) =>
            {
                self.start_capture(shared);
                state = StutterState::Capturing;
            }
            StutterRequest::CancelWaitCaptureStart if state == StutterState::WaitCaptureStart => {
                shared.capture_start.take();
                shared.set_state(StutterState::IdleNoLoop);
                state = StutterState::IdleNoLoop;
            }
            StutterRequest::StopCaptureNow
                if matches!(state, StutterState::Capturing | StutterState::WaitCaptureEnd) =>
            {
                state = self.finalize_capture(shared);
            }
            StutterRequest::WaitCaptureEndNow if state == StutterState::Capturing => {
                shared.set_state(StutterState::WaitCaptureEnd);
                state = StutterState::WaitCaptureEnd;
            }
            StutterRequest::PlayNow if state == StutterState::IdleWithLoop => {
                self.read_pos = 0;
                shared.set_state(StutterState::Playing);
                state = StutterState::Playing;
            }
            StutterRequest::WaitPlaybackOnsetNow if state == StutterState::IdleWithLoop => {
                shared.set_state(StutterState::WaitPlaybackOnset);
                state = StutterState::WaitPlaybackOnset;
            }
            StutterRequest::StopPlaybackNow
                if matches!(state, StutterState::Playing | StutterState::WaitPlaybackLength) =>
            {
                shared.playback_length.take();
                shared.set_state(StutterState::IdleWithLoop);
                state = StutterState::IdleWithLoop;
            }
            StutterRequest::WaitPlaybackLengthNow if state == StutterState::Playing => {
                shared.set_state(StutterState::WaitPlaybackLength);
                state = StutterState::WaitPlaybackLength;
            }
            _ => {}
        }

        // (a) scheduled-position firing. Tie-break: capture-start before
        // capture-end; playback-onset before playback-length (§4.5).
        if state == StutterState::WaitCaptureStart {
            if let Some(p) = shared.capture_start.get() {
                if ScheduledPosition::fires_in_block(p, block_start, block_len) {
                    shared.capture_start.take();
                    self.start_capture(shared);
                    state = StutterState::Capturing;
                }
            }
        }
        if matches!(state, StutterState::Capturing | StutterState::WaitCaptureEnd) {
            if let Some(p) = shared.capture_end.get() {
                if ScheduledPosition::fires_in_block(p, block_start, block_len) {
                    state = self.finalize_capture(shared);
                }
            }
        }
        if matches!(state, StutterState::IdleWithLoop | StutterState::WaitPlaybackOnset) {
            if let Some(p) = shared.playback_onset.get() {
                if ScheduledPosition::fires_in_block(p, block_start, block_len) {
                    shared.playback_onset.take();
                    self.read_pos = 0;
                    shared.set_state(StutterState::Playing);
                    state = StutterState::Playing;
                }
            }
        }
        if matches!(state, StutterState::Playing | StutterState::WaitPlaybackLength) {
            if let Some(p) = shared.playback_length.get() {
                if ScheduledPosition::fires_in_block(p, block_start, block_len) {
                    shared.playback_length.take();
                    shared.set_state(StutterState::IdleWithLoop);
                    state = StutterState::IdleWithLoop;
                }
            }
        }

        // Audio behavior for the (possibly just-updated) state. A mid-block
        // buffer-full during capture overrides any pending capture-end
        // schedule (§4.5) and hands the remaining frames to the new state.
        match state {
            StutterState::IdleNoLoop
            | StutterState::IdleWithLoop
            | StutterState::WaitCaptureStart
            | StutterState::WaitPlaybackOnset => {}
            StutterState::Capturing | StutterState::WaitCaptureEnd => {
                let cap = self.buffer.len();
                let mut filled_mid_block = false;
                for sample in block.iter_mut() {
                    if self.write_pos < cap {
                        self.buffer[self.write_pos] = *sample;
                        self.write_pos += 1;
                    } else {
                        filled_mid_block = true;
                        break;
                    }
                }
                if filled_mid_block {
                    self.finalize_capture(shared);
                }
            }
            StutterState::Playing | StutterState::WaitPlaybackLength => {
                let len = shared.capture_length() as usize;
                if len == 0 {
                    block.fill_silence();
                } else {
                    for sample in block.iter_mut() {
                        *sample = self.buffer[self.read_pos];
                        self.read_pos = (self.read_pos + 1) % len;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_5_stutter_free_held_to_playing() {
        let shared = StutterShared::default();
        let mut engine = StutterEngine::new(20_000);

        shared.set_held(true);
        shared.request(StutterRequest::CaptureNow);

        let mut sp = 0u64;
        let mut remaining = 15_000usize;
        let mut fill = StereoSample::new(1.0, 1.0);
        while remaining > 0 {
            let n = remaining.min(128);
            let mut block = StereoBuffer::silence(n);
            for s in block.iter_mut() {
                *s = fill;
            }
            engine.process(&shared, &mut block, sp);
            sp += n as u64;
            remaining -= n;
            fill.left += 1.0;
        }

        // Still held => release lands in PLAYING, not IDLE_WITH_LOOP.
        shared.request(StutterRequest::StopCaptureNow);
        let mut block = StereoBuffer::silence(8);
        engine.process(&shared, &mut block, sp);

        assert_eq!(shared.state(), StutterState::Playing);
        assert_eq!(shared.capture_length(), 15_000);
    }

    #[test]
    fn test_scenario_5_stutter_released_to_idle_with_loop() {
        let shared = StutterShared::default();
        let mut engine = StutterEngine::new(20_000);

        shared.set_held(true);
        shared.request(StutterRequest::CaptureNow);
        let mut block = StereoBuffer::silence(100);
        engine.process(&shared, &mut block, 0);

        shared.set_held(false);
        shared.request(StutterRequest::StopCaptureNow);
        let mut block2 = StereoBuffer::silence(8);
        engine.process(&shared, &mut block2, 100);

        assert_eq!(shared.state(), StutterState::IdleWithLoop);
        assert_eq!(shared.capture_length(), 100);
    }

    #[test]
    fn test_buffer_full_overrides_pending_capture_end() {
        let shared = StutterShared::default();
        let mut engine = StutterEngine::new(64);
        shared.set_held(false);
        shared.request(StutterRequest::CaptureNow);

        shared.capture_end.set(10_000); // far in the future, should never fire
        let mut block = StereoBuffer::silence(128); // bigger than capacity
        engine.process(&shared, &mut block, 0);

        assert_eq!(shared.capture_length(), 64);
        assert_eq!(shared.state(), StutterState::IdleWithLoop);
        assert!(shared.capture_end.get().is_none());
    }
}
