//! Command plane (§4.7)
//!
//! Two dispatch layers: per-effect controller interception (handled
//! upstream, before this runs) and a fallback mapping {TOGGLE, ENABLE,
//! DISABLE, SET_PARAM} onto the engine's corresponding operation, reached
//! when a command targets a registered effect but no controller claimed it.
//! Grounded on `engine/command.rs`'s `EngineCommand` dispatch-by-variant
//! style, generalized from one big enum processed in the engine to a small
//! registry of effect-id-keyed trait objects.

use crate::command::{Command, CommandKind, TargetEffect};
use crate::control::choke::{ChokeController, ChokeParam};
use crate::control::freeze::{FreezeController, FreezeParam};
use crate::control::stutter::{StutterController, StutterParam};
use crate::control::QuantSelector;
use crate::effects::stutter::{StutterRequest, StutterShared, StutterState};
use crate::effects::{choke::ChokeShared, freeze::FreezeShared, OnsetMode};
use crate::time::TimeKeeper;

/// SET_PARAM never schedules a transition, so the lookahead a controller
/// would otherwise use for quantized onsets is irrelevant here.
const SET_PARAM_LOOKAHEAD: u64 = 0;

/// Fallback engine operations a command can trigger directly, bypassing
/// quantization scheduling (used for commands no controller intercepted).
pub trait EngineOps {
    fn is_engaged(&self) -> bool;
    fn enable(&self, time: &TimeKeeper);
    fn disable(&self, time: &TimeKeeper);

    fn toggle(&self, time: &TimeKeeper) {
        if self.is_engaged() {
            self.disable(time);
        } else {
            self.enable(time);
        }
    }
}

impl EngineOps for ChokeShared {
    fn is_engaged(&self) -> bool {
        self.is_enabled()
    }

    fn enable(&self, time: &TimeKeeper) {
        self.scheduled_onset.set(time.sample_position().max(1));
    }

    fn disable(&self, time: &TimeKeeper) {
        self.scheduled_release.set(time.sample_position().max(1));
    }
}

impl EngineOps for FreezeShared {
    fn is_engaged(&self) -> bool {
        self.is_enabled()
    }

    fn enable(&self, time: &TimeKeeper) {
        self.scheduled_onset.set(time.sample_position().max(1));
    }

    fn disable(&self, time: &TimeKeeper) {
        self.scheduled_release.set(time.sample_position().max(1));
    }
}

impl EngineOps for StutterShared {
    fn is_engaged(&self) -> bool {
        !matches!(self.state(), StutterState::IdleNoLoop)
    }

    fn enable(&self, _time: &TimeKeeper) {
        match self.state() {
            StutterState::IdleNoLoop | StutterState::IdleWithLoop => {
                self.request(StutterRequest::CaptureNow)
            }
            _ => {}
        }
    }

    fn disable(&self, _time: &TimeKeeper) {
        match self.state() {
            StutterState::Capturing | StutterState::WaitCaptureEnd => {
                self.request(StutterRequest::StopCaptureNow)
            }
            StutterState::Playing | StutterState::WaitPlaybackLength => {
                self.request(StutterRequest::StopPlaybackNow)
            }
            _ => {}
        }
    }
}

/// Registry of up to four effect ids -> engine references (§4.7).
pub struct CommandPlane<'a> {
    choke: Option<&'a ChokeShared>,
    freeze: Option<&'a FreezeShared>,
    stutter: Option<&'a StutterShared>,
    quant: &'a QuantSelector,
}

impl<'a> CommandPlane<'a> {
    pub fn new(
        choke: Option<&'a ChokeShared>,
        freeze: Option<&'a FreezeShared>,
        stutter: Option<&'a StutterShared>,
        quant: &'a QuantSelector,
    ) -> Self {
        Self {
            choke,
            freeze,
            stutter,
            quant,
        }
    }

    /// Fallback dispatch, invoked only when no controller intercepted the
    /// command (§4.7). Invalid commands (unknown kind, unregistered target)
    /// are logged and discarded (§7).
    pub fn dispatch(&self, cmd: Command, time: &TimeKeeper) {
        if cmd.kind() == CommandKind::SetParam {
            self.dispatch_set_param(cmd, time);
            return;
        }

        let ops: Option<&dyn EngineOps> = match cmd.target() {
            TargetEffect::Choke => self.choke.map(|s| s as &dyn EngineOps),
            TargetEffect::Freeze => self.freeze.map(|s| s as &dyn EngineOps),
            TargetEffect::Stutter | TargetEffect::None => {
                self.stutter.map(|s| s as &dyn EngineOps)
            }
            TargetEffect::Func => None,
        };

        let Some(ops) = ops else {
            log::warn!("command plane: no engine registered for {:?}", cmd.target());
            return;
        };

        match cmd.kind() {
            CommandKind::Toggle => ops.toggle(time),
            CommandKind::Enable | CommandKind::StutterEnable => ops.enable(time),
            CommandKind::Disable => ops.disable(time),
            CommandKind::SetParam => unreachable!("handled above"),
            CommandKind::None => {
                log::warn!("command plane: discarding NONE command");
            }
        }
    }

    /// SET_PARAM (§4.7): `param1` names which of the target effect's
    /// parameters to change, `param2` carries the FREE/QUANTIZED mode bit.
    /// Routed through the matching controller's `set_param_mode`, exactly
    /// the path a button+encoder combo would take (§4.6).
    fn dispatch_set_param(&self, cmd: Command, time: &TimeKeeper) {
        let mode = OnsetMode::from_param_byte(cmd.param2);
        match cmd.target() {
            TargetEffect::Choke => {
                let Some(shared) = self.choke else {
                    log::warn!("command plane: SET_PARAM for unregistered CHOKE");
                    return;
                };
                let Some(param) = ChokeParam::from_u8(cmd.param1) else {
                    log::warn!("command plane: invalid CHOKE param byte {}", cmd.param1);
                    return;
                };
                ChokeController::new(shared, time, self.quant, SET_PARAM_LOOKAHEAD)
                    .set_param_mode(param, mode);
            }
            TargetEffect::Freeze => {
                let Some(shared) = self.freeze else {
                    log::warn!("command plane: SET_PARAM for unregistered FREEZE");
                    return;
                };
                let Some(param) = FreezeParam::from_u8(cmd.param1) else {
                    log::warn!("command plane: invalid FREEZE param byte {}", cmd.param1);
                    return;
                };
                FreezeController::new(shared, time, self.quant, SET_PARAM_LOOKAHEAD)
                    .set_param_mode(param, mode);
            }
            TargetEffect::Stutter => {
                let Some(shared) = self.stutter else {
                    log::warn!("command plane: SET_PARAM for unregistered STUTTER");
                    return;
                };
                let Some(param) = StutterParam::from_u8(cmd.param1) else {
                    log::warn!("command plane: invalid STUTTER param byte {}", cmd.param1);
                    return;
                };
                StutterController::new(shared, time, self.quant, SET_PARAM_LOOKAHEAD)
                    .set_param_mode(param, mode);
            }
            TargetEffect::None | TargetEffect::Func => {
                log::warn!("command plane: SET_PARAM has no valid target {:?}", cmd.target());
            }
        }
    }
}
