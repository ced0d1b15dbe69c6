//! Control loop scheduler (§4.9)
//!
//! The single cooperative loop the control context runs: drain the
//! button-command queue (controller interception, then command-plane
//! fallback), drain the clock event/tick queues, refresh visual feedback,
//! and pulse the beat LED. Grounded on `cpal_backend.rs`'s audio-thread/
//! control-thread split and `engine/command.rs`'s UI-poll-cadence doc
//! comments, adapted from a ~16ms UI poll to the ~2ms cadence this core
//! specifies. Encoder/GPIO polling itself is the rig binary's concern
//! (§6); this type exposes `handle_quant_encoder_detent` and the
//! per-effect `handle_*_param_encoder`/`handle_*_param_button_press`
//! methods for it to call into.

use rtrb::Consumer;

use crate::clock::{ClockEvent, ClockEventKind, ClockTick};
use crate::command::{Command, CommandKind, TargetEffect};
use crate::control::choke::{ChokeController, ChokeParam};
use crate::control::command_plane::CommandPlane;
use crate::control::freeze::{FreezeController, FreezeParam};
use crate::control::stutter::{StutterController, StutterParam};
use crate::control::{HandleResult, QuantSelector};
use crate::effects::choke::ChokeShared;
use crate::effects::freeze::FreezeShared;
use crate::effects::stutter::StutterShared;
use crate::sinks::{DisplayEvent, DisplayQueue};
use crate::time::{Quantization, TimeKeeper};
use crate::visual::{BitmapId, LedState, VisualState};

/// Tick-period EMA gate (§4.9 step 5): periods outside this range are
/// treated as spurious and dropped rather than smoothed in.
const TICK_PERIOD_GATE_MIN_US: f64 = 10_000.0;
const TICK_PERIOD_GATE_MAX_US: f64 = 50_000.0;
const EMA_WEIGHT_NEW: f64 = 0.1; // 9:1 smoothing

pub struct ControlLoop<'a> {
    command_rx: Consumer<Command>,
    clock_event_rx: Consumer<ClockEvent>,
    clock_tick_rx: Consumer<ClockTick>,
    time: &'a TimeKeeper,
    sample_rate: u32,
    quant: &'a QuantSelector,

    choke_shared: &'a ChokeShared,
    freeze_shared: &'a FreezeShared,
    stutter_shared: &'a StutterShared,
    stutter_ctrl: StutterController<'a>,
    command_plane: CommandPlane<'a>,

    /// Parameter currently selected by each effect's dedicated encoder (§6).
    selected_choke_param: ChokeParam,
    selected_freeze_param: FreezeParam,
    selected_stutter_param: StutterParam,

    visual: VisualState,
    last_bitmap: Option<BitmapId>,
    last_leds: Option<LedState>,
    display_queue: &'a DisplayQueue,

    ema_tick_period_us: Option<f64>,
    last_tick_timestamp_us: Option<u64>,
    beat_led_off_deadline: Option<u64>,
}

impl<'a> ControlLoop<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        command_rx: Consumer<Command>,
        clock_event_rx: Consumer<ClockEvent>,
        clock_tick_rx: Consumer<ClockTick>,
        time: &'a TimeKeeper,
        sample_rate: u32,
        quant: &'a QuantSelector,
        choke_shared: &'a ChokeShared,
        freeze_shared: &'a FreezeShared,
        stutter_shared: &'a StutterShared,
        lookahead: u64,
        display_queue: &'a DisplayQueue,
    ) -> Self {
        Self {
            command_rx,
            clock_event_rx,
            clock_tick_rx,
            time,
            sample_rate,
            quant,
            choke_shared,
            freeze_shared,
            stutter_shared,
            stutter_ctrl: StutterController::new(stutter_shared, time, quant, lookahead),
            command_plane: CommandPlane::new(
                Some(choke_shared),
                Some(freeze_shared),
                Some(stutter_shared),
                quant,
            ),
            selected_choke_param: ChokeParam::ALL[0],
            selected_freeze_param: FreezeParam::ALL[0],
            selected_stutter_param: StutterParam::ALL[0],
            visual: VisualState::new(),
            last_bitmap: None,
            last_leds: None,
            display_queue,
            ema_tick_period_us: None,
            last_tick_timestamp_us: None,
            beat_led_off_deadline: None,
        }
    }

    /// Run one control-loop iteration (§4.9 steps 1, 3-6). Step 2 (encoder
    /// polling) is driven externally via [`Self::handle_quant_encoder_detent`]
    /// and the per-effect `handle_*_param_encoder`/`handle_*_param_button_press`
    /// methods; step 7 (the ~2ms yield) is the caller's responsibility.
    pub fn tick(&mut self, now_ms: u64) {
        self.drain_commands();
        self.update_visual_feedback(now_ms);
        self.drain_clock_events();
        self.drain_clock_ticks();
        self.pulse_beat_led();
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.pop() {
            self.dispatch_command(cmd);
        }
    }

    fn dispatch_command(&mut self, cmd: Command) {
        match cmd.target() {
            TargetEffect::Func => match cmd.kind() {
                CommandKind::Enable => self.stutter_ctrl.handle_func_press(),
                CommandKind::Disable => self.stutter_ctrl.handle_func_release(),
                _ => {}
            },
            TargetEffect::Choke => {
                let choke_ctrl =
                    ChokeController::new(self.choke_shared, self.time, self.quant, 128);
                let result = match cmd.kind() {
                    CommandKind::Enable => choke_ctrl.handle_button_press(),
                    CommandKind::Disable => choke_ctrl.handle_button_release(),
                    _ => HandleResult::Passthrough,
                };
                if result == HandleResult::Passthrough {
                    self.command_plane.dispatch(cmd, self.time);
                } else {
                    self.visual.note_activated(TargetEffect::Choke);
                }
            }
            TargetEffect::Freeze => {
                let freeze_ctrl =
                    FreezeController::new(self.freeze_shared, self.time, self.quant, 128);
                let result = match cmd.kind() {
                    CommandKind::Enable => freeze_ctrl.handle_button_press(),
                    CommandKind::Disable => freeze_ctrl.handle_button_release(),
                    _ => HandleResult::Passthrough,
                };
                if result == HandleResult::Passthrough {
                    self.command_plane.dispatch(cmd, self.time);
                } else {
                    self.visual.note_activated(TargetEffect::Freeze);
                }
            }
            TargetEffect::Stutter => {
                let result = match cmd.kind() {
                    CommandKind::Enable => self.stutter_ctrl.handle_button_press(),
                    CommandKind::Disable => self.stutter_ctrl.handle_button_release(),
                    _ => HandleResult::Passthrough,
                };
                if result == HandleResult::Passthrough {
                    self.command_plane.dispatch(cmd, self.time);
                } else {
                    self.visual.note_activated(TargetEffect::Stutter);
                }
            }
            TargetEffect::None => self.command_plane.dispatch(cmd, self.time),
        }
    }

    /// §4.9 step 2 (driven by the rig's encoder driver). Adjusts the
    /// global quantization selector by `detent` steps once the encoder
    /// menu abstraction has resolved a raw delta into a detent.
    pub fn handle_quant_encoder_detent(&self, detent: i32) {
        let order = [
            Quantization::Quant32,
            Quantization::Quant16,
            Quantization::Quant8,
            Quantization::Quant4,
        ];
        let current = order.iter().position(|q| *q == self.quant.get()).unwrap_or(1) as i32;
        let next = (current + detent).rem_euclid(order.len() as i32) as usize;
        self.quant.set(order[next]);
    }

    /// §6 CHOKE parameter-selection encoder: rotates which of CHOKE's two
    /// parameters the dedicated encoder's button press will toggle.
    pub fn handle_choke_param_encoder(&mut self, detent: i32) {
        let all = ChokeParam::ALL;
        let current = all.iter().position(|p| *p == self.selected_choke_param).unwrap_or(0) as i32;
        let next = (current + detent).rem_euclid(all.len() as i32) as usize;
        self.selected_choke_param = all[next];
    }

    /// §6/§4.9: toggle the currently-selected CHOKE parameter between FREE
    /// and QUANTIZED, via the same `set_param_mode` path SET_PARAM uses.
    pub fn handle_choke_param_button_press(&self) {
        let ctrl = ChokeController::new(self.choke_shared, self.time, self.quant, 0);
        let current = match self.selected_choke_param {
            ChokeParam::Onset => self.choke_shared.onset_mode.get(),
            ChokeParam::Length => self.choke_shared.length_mode.get(),
        };
        ctrl.set_param_mode(self.selected_choke_param, current.toggled());
    }

    /// §6 FREEZE parameter-selection encoder, mirrors [`Self::handle_choke_param_encoder`].
    pub fn handle_freeze_param_encoder(&mut self, detent: i32) {
        let all = FreezeParam::ALL;
        let current = all.iter().position(|p| *p == self.selected_freeze_param).unwrap_or(0) as i32;
        let next = (current + detent).rem_euclid(all.len() as i32) as usize;
        self.selected_freeze_param = all[next];
    }

    /// Mirrors [`Self::handle_choke_param_button_press`] for FREEZE.
    pub fn handle_freeze_param_button_press(&self) {
        let ctrl = FreezeController::new(self.freeze_shared, self.time, self.quant, 0);
        let current = match self.selected_freeze_param {
            FreezeParam::Onset => self.freeze_shared.onset_mode.get(),
            FreezeParam::Length => self.freeze_shared.length_mode.get(),
        };
        ctrl.set_param_mode(self.selected_freeze_param, current.toggled());
    }

    /// §6 STUTTER parameter-selection encoder, mirrors [`Self::handle_choke_param_encoder`]
    /// over all four STUTTER parameters (LENGTH, ONSET, CAPTURE_START, CAPTURE_END).
    pub fn handle_stutter_param_encoder(&mut self, detent: i32) {
        let all = StutterParam::ALL;
        let current = all
            .iter()
            .position(|p| *p == self.selected_stutter_param)
            .unwrap_or(0) as i32;
        let next = (current + detent).rem_euclid(all.len() as i32) as usize;
        self.selected_stutter_param = all[next];
    }

    /// Mirrors [`Self::handle_choke_param_button_press`] for STUTTER.
    pub fn handle_stutter_param_button_press(&self) {
        let ctrl = StutterController::new(self.stutter_shared, self.time, self.quant, 0);
        let current = match self.selected_stutter_param {
            StutterParam::Length => self.stutter_shared.length_mode.get(),
            StutterParam::Onset => self.stutter_shared.onset_mode.get(),
            StutterParam::CaptureStart => self.stutter_shared.capture_start_mode.get(),
            StutterParam::CaptureEnd => self.stutter_shared.capture_end_mode.get(),
        };
        ctrl.set_param_mode(self.selected_stutter_param, current.toggled());
    }

    fn update_visual_feedback(&mut self, now_ms: u64) {
        let stutter_state = self.stutter_shared.state();
        let (bitmap, leds) = self.visual.update(
            self.choke_shared.is_enabled(),
            self.freeze_shared.is_enabled(),
            stutter_state,
            now_ms,
        );
        if self.last_bitmap != Some(bitmap) {
            self.display_queue.push(DisplayEvent::Bitmap(bitmap));
            self.last_bitmap = Some(bitmap);
        }
        if self.last_leds != Some(leds) {
            self.display_queue.push(DisplayEvent::Leds(leds));
            self.last_leds = Some(leds);
        }
    }

    fn drain_clock_events(&mut self) {
        while let Ok(event) = self.clock_event_rx.pop() {
            match event.kind() {
                ClockEventKind::Start => {
                    self.time.reset();
                    self.time
                        .set_transport_state(crate::types::TransportState::Playing);
                }
                ClockEventKind::Stop => {
                    self.time
                        .set_transport_state(crate::types::TransportState::Stopped);
                }
                ClockEventKind::Continue => {
                    self.time
                        .set_transport_state(crate::types::TransportState::Playing);
                }
            }
        }
    }

    fn drain_clock_ticks(&mut self) {
        while let Ok(tick) = self.clock_tick_rx.pop() {
            if let Some(last) = self.last_tick_timestamp_us {
                let period = tick.timestamp_micros.wrapping_sub(last) as f64;
                if (TICK_PERIOD_GATE_MIN_US..=TICK_PERIOD_GATE_MAX_US).contains(&period) {
                    self.ema_tick_period_us = Some(match self.ema_tick_period_us {
                        Some(prev) => prev * (1.0 - EMA_WEIGHT_NEW) + period * EMA_WEIGHT_NEW,
                        None => period,
                    });
                }
            }
            self.last_tick_timestamp_us = Some(tick.timestamp_micros);

            if let Some(estimate) = self.ema_tick_period_us {
                self.time.sync_to_external_clock(estimate, self.sample_rate);
            }
            self.time.increment_tick();
        }
    }

    fn pulse_beat_led(&mut self) {
        if self.time.poll_beat_flag() {
            self.display_queue.push(DisplayEvent::BeatLed(true));
            let two_ticks = (self.time.samples_per_beat() as u64 * 2) / crate::time::PPQN as u64;
            self.beat_led_off_deadline = Some(self.time.sample_position() + two_ticks);
        }
        if let Some(deadline) = self.beat_led_off_deadline {
            if self.time.sample_position() >= deadline {
                self.display_queue.push(DisplayEvent::BeatLed(false));
                self.beat_led_off_deadline = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::command_channel;
    use crate::sinks::DisplayQueue;

    #[test]
    fn test_start_event_resets_time_and_runs_transport() {
        let time = TimeKeeper::new();
        time.increment_samples(500);
        let quant = QuantSelector::default();
        let choke = ChokeShared::default();
        let freeze = FreezeShared::default();
        let stutter = StutterShared::default();
        let display_queue = DisplayQueue::new();

        let (_cmd_tx, cmd_rx) = command_channel();
        let (mut event_tx, event_rx) = crate::clock::clock_event_channel();
        let (_tick_tx, tick_rx) = crate::clock::clock_tick_channel();

        let mut loop_ = ControlLoop::new(
            cmd_rx,
            event_rx,
            tick_rx,
            &time,
            44_100,
            &quant,
            &choke,
            &freeze,
            &stutter,
            128,
            &display_queue,
        );

        event_tx
            .push(ClockEvent::new(ClockEventKind::Start))
            .unwrap();
        loop_.tick(0);

        assert_eq!(time.sample_position(), 0);
        assert!(time.is_running());
    }

    #[test]
    fn test_command_drives_choke_controller() {
        let time = TimeKeeper::new();
        let quant = QuantSelector::default();
        let choke = ChokeShared::default();
        let freeze = FreezeShared::default();
        let stutter = StutterShared::default();
        let display_queue = DisplayQueue::new();

        let (mut cmd_tx, cmd_rx) = command_channel();
        let (_event_tx, event_rx) = crate::clock::clock_event_channel();
        let (_tick_tx, tick_rx) = crate::clock::clock_tick_channel();

        let mut loop_ = ControlLoop::new(
            cmd_rx,
            event_rx,
            tick_rx,
            &time,
            44_100,
            &quant,
            &choke,
            &freeze,
            &stutter,
            128,
            &display_queue,
        );

        cmd_tx
            .push(Command::new(CommandKind::Enable, TargetEffect::Choke, 0, 0))
            .unwrap();
        loop_.tick(0);

        assert_eq!(choke.scheduled_onset.get(), Some(1));
    }

    #[test]
    fn test_choke_param_encoder_selects_and_toggles_mode() {
        let time = TimeKeeper::new();
        let quant = QuantSelector::default();
        let choke = ChokeShared::default();
        let freeze = FreezeShared::default();
        let stutter = StutterShared::default();
        let display_queue = DisplayQueue::new();

        let (_cmd_tx, cmd_rx) = command_channel();
        let (_event_tx, event_rx) = crate::clock::clock_event_channel();
        let (_tick_tx, tick_rx) = crate::clock::clock_tick_channel();

        let mut loop_ = ControlLoop::new(
            cmd_rx,
            event_rx,
            tick_rx,
            &time,
            44_100,
            &quant,
            &choke,
            &freeze,
            &stutter,
            128,
            &display_queue,
        );

        // Default selection is Onset; one detent rotates to Length.
        loop_.handle_choke_param_button_press();
        assert_eq!(choke.onset_mode.get(), crate::effects::OnsetMode::Quantized);
        assert_eq!(choke.length_mode.get(), crate::effects::OnsetMode::Free);

        loop_.handle_choke_param_encoder(1);
        loop_.handle_choke_param_button_press();
        assert_eq!(choke.length_mode.get(), crate::effects::OnsetMode::Quantized);
    }
}
