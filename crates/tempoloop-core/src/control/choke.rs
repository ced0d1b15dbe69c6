//! CHOKE controller (§4.6).

use crate::control::{HandleResult, QuantSelector};
use crate::effects::{choke::ChokeShared, OnsetMode};
use crate::time::TimeKeeper;

/// CHOKE's two independently-quantizable parameters (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChokeParam {
    Onset,
    Length,
}

impl ChokeParam {
    pub const ALL: [ChokeParam; 2] = [ChokeParam::Onset, ChokeParam::Length];

    /// Decode a `Command::param1` byte naming which parameter SET_PARAM targets.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ChokeParam::Onset),
            1 => Some(ChokeParam::Length),
            _ => None,
        }
    }
}

pub struct ChokeController<'a> {
    shared: &'a ChokeShared,
    time: &'a TimeKeeper,
    quant: &'a QuantSelector,
    lookahead: u64,
}

impl<'a> ChokeController<'a> {
    pub fn new(
        shared: &'a ChokeShared,
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

    /// SET_PARAM target (§4.7): set one of CHOKE's two parameters to FREE or
    /// QUANTIZED, decoded from a `Command`'s `param1`/`param2` bytes.
    pub fn set_param_mode(&self, param: ChokeParam, mode: OnsetMode) {
        match param {
            ChokeParam::Onset => self.shared.onset_mode.set(mode),
            ChokeParam::Length => self.shared.length_mode.set(mode),
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
            // Absorb: the release was already scheduled at press time.
            return HandleResult::Handled;
        }
        self.shared.scheduled_onset.set(0); // cancel if it hasn't fired yet
        self.shared
            .scheduled_release
            .set(self.time.sample_position().max(1));
        HandleResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::HandleResult;

    #[test]
    fn test_scenario_2_choke_free_onset_quantized_length() {
        let shared = ChokeShared::default();
        let time = TimeKeeper::new();
        time.increment_samples(1_000);
        shared.length_mode.set(OnsetMode::Quantized);
        let quant = QuantSelector::default();

        let ctrl = ChokeController::new(&shared, &time, &quant, 128);
        assert_eq!(ctrl.handle_button_press(), HandleResult::Handled);

        assert_eq!(shared.scheduled_onset.get(), Some(1_000));
        assert_eq!(shared.scheduled_release.get(), Some(1_000 + 5_512));
    }

    #[test]
    fn test_scenario_3_choke_quantized_onset() {
        let shared = ChokeShared::default();
        let time = TimeKeeper::new();
        time.increment_samples(1_000);
        shared.onset_mode.set(OnsetMode::Quantized);
        let quant = QuantSelector::default();

        let ctrl = ChokeController::new(&shared, &time, &quant, 128);
        ctrl.handle_button_press();

        assert_eq!(shared.scheduled_onset.get(), Some(5_384));
    }
}
