//! Visual feedback layer (§4.8)
//!
//! A deterministic function from effect-engine state and "last-activated
//! effect" to a bitmap id and a per-key LED color. Grounded on
//! `engine/slicer.rs`'s `SlicerAtomics` (lock-free state exposed to a
//! display consumer) and `mesh-player`'s theme-by-state mapping idiom,
//! adapted from a GUI theme lookup to the OLED-bitmap-id / LED-color
//! mapping this spec calls for.

use crate::command::TargetEffect;
use crate::effects::stutter::StutterState;

/// Fixed bitmap registry (Glossary): default, one per engaged effect, one
/// per quantization selector, plus STUTTER's two wait-state images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapId {
    Default,
    ChokeActive,
    FreezeActive,
    StutterCapture,
    StutterPlay,
    StutterIdleWithLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Off,
    Green,
    Red,
    Blue,
    White,
    Cyan,
}

/// Per-key LED state: FREEZE, CHOKE, STUTTER, FUNC (§6 key order).
pub type LedState = [LedColor; 4];

const BLINK_PERIOD_MS: u64 = 250; // 4 Hz on/off (§4.6)

/// CC-owned visual state. Not shared with AC — exclusively driven by the
/// control loop's `updateVisualFeedback` pass (§4.6, §5).
pub struct VisualState {
    last_activated: Option<TargetEffect>,
}

impl VisualState {
    pub fn new() -> Self {
        Self {
            last_activated: None,
        }
    }

    /// Record that `effect` was just activated (used for bitmap precedence).
    pub fn note_activated(&mut self, effect: TargetEffect) {
        self.last_activated = Some(effect);
    }

    /// Compute the bitmap id and LED state for the current engine states.
    ///
    /// `now_ms` is a monotonic millisecond clock used to drive the STUTTER
    /// wait-state blink (§4.6: 4Hz, red in WAIT_CAPTURE_START, blue in
    /// WAIT_PLAYBACK_ONSET).
    pub fn update(
        &mut self,
        choke_engaged: bool,
        freeze_engaged: bool,
        stutter_state: StutterState,
        now_ms: u64,
    ) -> (BitmapId, LedState) {
        let blink_on = (now_ms / BLINK_PERIOD_MS).is_multiple_of(2);

        let stutter_led = match stutter_state {
            StutterState::Capturing | StutterState::WaitCaptureEnd => LedColor::Red,
            StutterState::Playing | StutterState::WaitPlaybackLength => LedColor::Blue,
            StutterState::IdleWithLoop => LedColor::White,
            StutterState::WaitCaptureStart => {
                if blink_on {
                    LedColor::Red
                } else {
                    LedColor::Off
                }
            }
            StutterState::WaitPlaybackOnset => {
                if blink_on {
                    LedColor::Blue
                } else {
                    LedColor::Off
                }
            }
            StutterState::IdleNoLoop => LedColor::Green,
        };

        let leds: LedState = [
            if freeze_engaged {
                LedColor::Cyan
            } else {
                LedColor::Green
            },
            if choke_engaged {
                LedColor::Red
            } else {
                LedColor::Green
            },
            stutter_led,
            LedColor::Green,
        ];

        let stutter_engaged = !matches!(stutter_state, StutterState::IdleNoLoop);

        // Last-activated wins; falls through to the next still-engaged
        // effect, then the default bitmap (§4.8).
        let engaged_bitmap = |effect: TargetEffect| -> Option<BitmapId> {
            match effect {
                TargetEffect::Choke if choke_engaged => Some(BitmapId::ChokeActive),
                TargetEffect::Freeze if freeze_engaged => Some(BitmapId::FreezeActive),
                TargetEffect::Stutter if stutter_engaged => Some(stutter_bitmap(stutter_state)),
                _ => None,
            }
        };

        let bitmap = self
            .last_activated
            .and_then(engaged_bitmap)
            .or_else(|| engaged_bitmap(TargetEffect::Choke))
            .or_else(|| engaged_bitmap(TargetEffect::Freeze))
            .or_else(|| engaged_bitmap(TargetEffect::Stutter))
            .unwrap_or(BitmapId::Default);

        (bitmap, leds)
    }
}

impl Default for VisualState {
    fn default() -> Self {
        Self::new()
    }
}

fn stutter_bitmap(state: StutterState) -> BitmapId {
    match state {
        StutterState::Capturing | StutterState::WaitCaptureEnd | StutterState::WaitCaptureStart => {
            BitmapId::StutterCapture
        }
        StutterState::Playing | StutterState::WaitPlaybackLength | StutterState::WaitPlaybackOnset => {
            BitmapId::StutterPlay
        }
        StutterState::IdleWithLoop => BitmapId::StutterIdleWithLoop,
        StutterState::IdleNoLoop => BitmapId::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bitmap_when_nothing_engaged() {
        let mut vs = VisualState::new();
        let (bitmap, leds) = vs.update(false, false, StutterState::IdleNoLoop, 0);
        assert_eq!(bitmap, BitmapId::Default);
        assert_eq!(leds[0], LedColor::Green);
    }

    #[test]
    fn test_last_activated_precedence() {
        let mut vs = VisualState::new();
        vs.note_activated(TargetEffect::Choke);
        let (bitmap, leds) = vs.update(true, true, StutterState::IdleNoLoop, 0);
        assert_eq!(bitmap, BitmapId::ChokeActive);
        assert_eq!(leds[1], LedColor::Red);
        assert_eq!(leds[0], LedColor::Cyan);
    }

    #[test]
    fn test_falls_through_when_last_activated_no_longer_engaged() {
        let mut vs = VisualState::new();
        vs.note_activated(TargetEffect::Choke);
        let (bitmap, _) = vs.update(false, true, StutterState::IdleNoLoop, 0);
        assert_eq!(bitmap, BitmapId::FreezeActive);
    }

    #[test]
    fn test_wait_capture_start_blinks() {
        let mut vs = VisualState::new();
        let (_, leds_on) = vs.update(false, false, StutterState::WaitCaptureStart, 0);
        let (_, leds_off) = vs.update(false, false, StutterState::WaitCaptureStart, 250);
        assert_eq!(leds_on[2], LedColor::Red);
        assert_eq!(leds_off[2], LedColor::Off);
    }
}
