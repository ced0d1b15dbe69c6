//! STUTTER controller (§4.6) — FUNC+STUTTER ordering and four independent
//! quantization parameters (LENGTH, ONSET, CAPTURE_START, CAPTURE_END).

use crate::control::{HandleResult, QuantSelector};
use crate::effects::stutter::{StutterRequest, StutterShared, StutterState};
use crate::effects::OnsetMode;
use crate::time::TimeKeeper;

/// The four independently-quantizable STUTTER parameters (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StutterParam {
    Length,
    Onset,
    CaptureStart,
    CaptureEnd,
}

impl StutterParam {
    pub const ALL: [StutterParam; 4] = [
        StutterParam::Length,
        StutterParam::Onset,
        StutterParam::CaptureStart,
        StutterParam::CaptureEnd,
    ];

    /// Decode a `Command::param1` byte naming which parameter SET_PARAM targets.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(StutterParam::Length),
            1 => Some(StutterParam::Onset),
            2 => Some(StutterParam::CaptureStart),
            3 => Some(StutterParam::CaptureEnd),
            _ => None,
        }
    }
}

pub struct StutterController<'a> {
    shared: &'a StutterShared,
    time: &'a TimeKeeper,
    quant: &'a QuantSelector,
    lookahead: u64,
    /// FUNC must be held before STUTTER to enter capture mode (§4.6).
    func_held: bool,
}

impl<'a> StutterController<'a> {
    pub fn new(
        shared: &'a StutterShared,
        time: &'a TimeKeeper,
        quant: &'a QuantSelector,
        lookahead: u64,
    ) -> Self {
        Self {
            shared,
            time,
            quant,
            lookahead,
            func_held: false,
        }
    }

    pub fn set_param_mode(&self, param: StutterParam, mode: OnsetMode) {
        match param {
            StutterParam::Length => self.shared.length_mode.set(mode),
            StutterParam::Onset => self.shared.onset_mode.set(mode),
            StutterParam::CaptureStart => self.shared.capture_start_mode.set(mode),
            StutterParam::CaptureEnd => self.shared.capture_end_mode.set(mode),
        }
    }

    fn quantized_target(&self, lookahead_applies: bool) -> u64 {
        let now = self.time.sample_position();
        let dur = self.quant.get().duration_samples(self.time.samples_per_beat());
        let raw = self.time.samples_to_next_subdivision(dur);
        let adjusted = if lookahead_applies {
            raw.saturating_sub(self.lookahead)
        } else {
            raw
        };
        now + adjusted
    }

    /// FUNC is a modifier key, not a registered effect: its own press/release
    /// never yields "handled" to the command plane, it only updates the
    /// controller's latch.
    pub fn handle_func_press(&mut self) {
        self.func_held = true;
    }

    pub fn handle_func_release(&mut self) {
        self.func_held = false;
    }

    pub fn handle_button_press(&self) -> HandleResult {
        self.shared.set_held(true);

        if self.func_held {
            match self.shared.capture_start_mode.get() {
                OnsetMode::Free => self.shared.request(StutterRequest::CaptureNow),
                OnsetMode::Quantized => {
                    let target = self.quantized_target(true);
                    self.shared.capture_start.set(target);
                }
            }
        } else if self.shared.state() == StutterState::IdleWithLoop {
            let onset_sample = match self.shared.onset_mode.get() {
                OnsetMode::Free => {
                    self.shared.request(StutterRequest::PlayNow);
                    self.time.sample_position().max(1)
                }
                OnsetMode::Quantized => {
                    let target = self.quantized_target(true);
                    self.shared.playback_onset.set(target);
                    target
                }
            };
            if self.shared.length_mode.get() == OnsetMode::Quantized {
                let dur = self.quant.get().duration_samples(self.time.samples_per_beat());
                self.shared.playback_length.set(onset_sample + dur);
            }
        }
        HandleResult::Handled
    }

    pub fn handle_button_release(&self) -> HandleResult {
        self.shared.set_held(false);

        match self.shared.state() {
            StutterState::Capturing | StutterState::WaitCaptureEnd => {
                match self.shared.capture_end_mode.get() {
                    OnsetMode::Free => self.shared.request(StutterRequest::StopCaptureNow),
                    OnsetMode::Quantized => {
                        let target = self.quantized_target(false);
                        self.shared.capture_end.set(target);
                        self.shared.request(StutterRequest::WaitCaptureEndNow);
                    }
                }
            }
            StutterState::Playing | StutterState::WaitPlaybackLength
                if self.shared.length_mode.get() == OnsetMode::Free =>
            {
                self.shared.request(StutterRequest::StopPlaybackNow);
                // QUANTIZED: absorb, the length was already scheduled at onset.
            }
            StutterState::WaitCaptureStart => {
                self.shared.request(StutterRequest::CancelWaitCaptureStart);
            }
            _ => {}
        }
        HandleResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::stutter::StutterEngine;
    use crate::types::StereoBuffer;

    #[test]
    fn test_scenario_5_func_stutter_held_then_released() {
        let shared = StutterShared::default();
        let time = TimeKeeper::new();
        let quant = QuantSelector::default();
        let mut ctrl = StutterController::new(&shared, &time, &quant, 128);
        let mut engine = StutterEngine::new(20_000);

        ctrl.handle_func_press();
        ctrl.handle_button_press(); // FREE capture_start by default

        let mut sp = 0u64;
        let mut remaining = 15_000usize;
        while remaining > 0 {
            let n = remaining.min(128);
            let mut block = StereoBuffer::silence(n);
            engine.process(&shared, &mut block, sp);
            sp += n as u64;
            remaining -= n;
        }
        assert_eq!(shared.state(), StutterState::Capturing);

        time.increment_samples(15_000);
        ctrl.handle_button_release(); // FREE capture_end by default, not held

        let mut block = StereoBuffer::silence(8);
        engine.process(&shared, &mut block, sp);
        assert_eq!(shared.state(), StutterState::IdleWithLoop);
        assert_eq!(shared.capture_length(), 15_000);
    }

    #[test]
    fn test_stutter_alone_without_func_is_noop_from_idle_no_loop() {
        let shared = StutterShared::default();
        let time = TimeKeeper::new();
        let quant = QuantSelector::default();
        let ctrl = StutterController::new(&shared, &time, &quant, 128);

        ctrl.handle_button_press();
        assert_eq!(shared.capture_start.get(), None);
        assert_eq!(shared.playback_onset.get(), None);
    }
}
