//! FREEZE controller (§4.6) — same shape as the CHOKE controller.

use crate::control::{HandleResult, QuantSelector};
use crate::effects::{freeze::FreezeShared, OnsetMode};
use crate::time::TimeKeeper;

/// FREEZE's two independently-quantizable parameters (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeParam {
    Onset,
    Length,
}

impl FreezeParam {
    pub const ALL: [FreezeParam; 2] = [FreezeParam::Onset, FreezeParam::Length];

    /// Decode a `Command::param1` byte naming which parameter SET_PARAM targets.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(FreezeParam::Onset),
            1 => Some(FreezeParam::Length),
            _ => None,
        }
    }
}

pub struct FreezeController<'a> {
    shared: &'a FreezeShared,
    time: &'a TimeKeeper,
    quant: &'a QuantSelector,
    lookahead: u64,
}

impl<'a> FreezeController<'a> {
    pub fn new(
        shared: &'a FreezeShared,
        time: &'a TimeKeeper,
        quant: &'a QuantSelector,
        lookahead: u64,
    ) -> Self {
        Self {
            shared,
            time,
            quant,
            lookahead,
        }
    }

    /// SET_PARAM target (§4.7): set one of FREEZE's two parameters to FREE
    /// or QUANTIZED, decoded from a `Command`'s `param1`/`param2` bytes.
    pub fn set_param_mode(&self, param: FreezeParam, mode: OnsetMode) {
        match param {
            FreezeParam::Onset => self.shared.onset_mode.set(mode),
            FreezeParam::Length => self.shared.length_mode.set(mode),
        }
    }

    pub fn handle_button_press(&self) -> HandleResult {
        let now = self.time.sample_position();
        let onset_sample = match self.shared.onset_mode.get() {
            OnsetMode::Free => now.max(1),
            OnsetMode::Quantized => {
                let dur = self.quant.get().duration_samples(self.time.samples_per_beat());
                let raw = self.time.samples_to_next_subdivision(dur);
                let adjusted = raw.saturating_sub(self.lookahead);
                now + adjusted
            }
        };
        self.shared.scheduled_onset.set(onset_sample);

        if self.shared.length_mode.get() == OnsetMode::Quantized {
            let dur = self.quant.get().duration_samples(self.time.samples_per_beat());
            self.shared.scheduled_release.set(onset_sample + dur);
        }
        HandleResult::Handled
    }

    pub fn handle_button_release(&self) -> HandleResult {
        if self.shared.length_mode.get() == OnsetMode::Quantized {
            return HandleResult::Handled;
        }
        self.shared.scheduled_onset.set(0);
        self.shared
            .scheduled_release
            .set(self.time.sample_position().max(1));
        HandleResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_4_freeze_free_engages_immediately() {
        let shared = FreezeShared::default();
        let time = TimeKeeper::new();
        time.increment_samples(10_000);
        let quant = QuantSelector::default();

        let ctrl = FreezeController::new(&shared, &time, &quant, 128);
        ctrl.handle_button_press();

        assert_eq!(shared.scheduled_onset.get(), Some(10_000));
    }
}
