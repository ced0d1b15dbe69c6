//! TimeKeeper — the shared timing authority (§3, §4.2)
//!
//! Maps the external 24-PPQN beat clock onto the audio sample timeline and
//! offers the quantization math the effect controllers schedule onsets and
//! releases against. Every field is a per-word atomic: `sample_position` is
//! written only from the audio context (AC), the tempo/transport/beat-flag
//! fields only from the control context (CC). Both contexts may read any
//! field at any time — see the ordering notes on each accessor.
//!
//! Grounded on the atomic-field sharing pattern in `SharedMidiState`
//! (relaxed loads/stores behind an `Arc`), generalized here to cover a
//! 64-bit sample counter and the musical-time derived quantities.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Pulses per quarter note for the external beat clock. Fixed by the hardware contract.
pub const PPQN: u32 = 24;

/// Lower bound of the accepted samples-per-beat range (~330 BPM at 44.1kHz).
pub const MIN_SAMPLES_PER_BEAT: u32 = 8_000;

/// Upper bound of the accepted samples-per-beat range (~30 BPM at 44.1kHz).
pub const MAX_SAMPLES_PER_BEAT: u32 = 100_000;

/// Default samples-per-beat, corresponding to 120 BPM at 44.1kHz.
pub const DEFAULT_SAMPLES_PER_BEAT: u32 = 22_050;

/// On-time tolerance (samples) for `samples_to_next_beat` — see §4.2.
pub const ON_TIME_TOLERANCE: u64 = 16;

/// Quantization grid (§3): four subdivisions of a beat, expressed as a
/// fraction of the beat duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantization {
    /// 1/32 note => 1/8 of a beat.
    Quant32,
    /// 1/16 note => 1/4 of a beat.
    Quant16,
    /// 1/8 note => 1/2 of a beat.
    Quant8,
    /// 1/4 note => a full beat.
    Quant4,
}

impl Quantization {
    /// Duration of this subdivision in samples, given the current samples-per-beat.
    pub fn duration_samples(self, samples_per_beat: u32) -> u64 {
        let spb = samples_per_beat as u64;
        match self {
            Quantization::Quant32 => spb / 8,
            Quantization::Quant16 => spb / 4,
            Quantization::Quant8 => spb / 2,
            Quantization::Quant4 => spb,
        }
    }
}

/// Transport state, encoded as the `u32` values of [`crate::types::TransportState`].
use crate::types::TransportState;

/// The shared musical timeline. Process-long; owned by whichever component
/// bootstraps the engine and shared by reference with the audio callback and
/// the control loop.
#[derive(Debug)]
pub struct TimeKeeper {
    sample_position: AtomicU64,
    beat_number: AtomicU32,
    tick_in_beat: AtomicU32,
    samples_per_beat: AtomicU32,
    transport_state: AtomicU32,
    beat_flag: AtomicBool,
}

impl TimeKeeper {
    pub fn new() -> Self {
        Self {
            sample_position: AtomicU64::new(0),
            beat_number: AtomicU32::new(0),
            tick_in_beat: AtomicU32::new(0),
            samples_per_beat: AtomicU32::new(DEFAULT_SAMPLES_PER_BEAT),
            transport_state: AtomicU32::new(TransportState::Stopped as u32),
            beat_flag: AtomicBool::new(false),
        }
    }

    // -- AC-only writers --------------------------------------------------

    /// Advance the sample counter by a block's worth of frames. AC only.
    pub fn increment_samples(&self, n: u64) {
        self.sample_position.fetch_add(n, Ordering::Relaxed);
    }

    // -- CC-only writers ----------------------------------------------------

    /// Recompute samples-per-beat from an external clock tick period.
    /// Rejects and leaves state unchanged if the result falls outside
    /// `[MIN_SAMPLES_PER_BEAT, MAX_SAMPLES_PER_BEAT]`. CC only.
    pub fn sync_to_external_clock(&self, tick_period_micros: f64, sample_rate: u32) {
        let spb = (tick_period_micros * PPQN as f64 * sample_rate as f64) / 1_000_000.0;
        let spb = spb.round();
        if !(MIN_SAMPLES_PER_BEAT as f64..=MAX_SAMPLES_PER_BEAT as f64).contains(&spb) {
            return;
        }
        self.samples_per_beat.store(spb as u32, Ordering::Relaxed);
    }

    /// Advance the tick-in-beat counter; rolls over into beat_number and
    /// latches the beat flag every 24 ticks. CC only.
    pub fn increment_tick(&self) {
        let prev = self.tick_in_beat.fetch_add(1, Ordering::Relaxed);
        if prev + 1 >= PPQN {
            self.tick_in_beat.store(0, Ordering::Relaxed);
            self.beat_number.fetch_add(1, Ordering::Relaxed);
            self.beat_flag.store(true, Ordering::Release);
        }
    }

    pub fn set_transport_state(&self, state: TransportState) {
        self.transport_state.store(state as u32, Ordering::Release);
    }

    /// Zero the sample/beat/tick counters, restore default tempo, and stop
    /// the transport. CC only (but safe to call whenever both contexts are
    /// quiescent, e.g. at startup).
    pub fn reset(&self) {
        self.sample_position.store(0, Ordering::Relaxed);
        self.beat_number.store(0, Ordering::Relaxed);
        self.tick_in_beat.store(0, Ordering::Relaxed);
        self.samples_per_beat
            .store(DEFAULT_SAMPLES_PER_BEAT, Ordering::Relaxed);
        self.beat_flag.store(false, Ordering::Release);
        self.set_transport_state(TransportState::Stopped);
    }

    // -- readable from either context --------------------------------------

    pub fn sample_position(&self) -> u64 {
        self.sample_position.load(Ordering::Relaxed)
    }

    pub fn beat_number(&self) -> u32 {
        self.beat_number.load(Ordering::Relaxed)
    }

    pub fn tick_in_beat(&self) -> u32 {
        self.tick_in_beat.load(Ordering::Relaxed)
    }

    pub fn samples_per_beat(&self) -> u32 {
        self.samples_per_beat.load(Ordering::Relaxed)
    }

    pub fn transport_state(&self) -> TransportState {
        TransportState::from_u32(self.transport_state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.transport_state() == TransportState::Playing
            || self.transport_state() == TransportState::Recording
    }

    /// Atomic exchange to false; returns whether a beat boundary was
    /// crossed since the last poll. Guarantees at-least-once delivery.
    pub fn poll_beat_flag(&self) -> bool {
        self.beat_flag.swap(false, Ordering::AcqRel)
    }

    // -- quantization API ---------------------------------------------------

    /// Samples until the next beat boundary, clamped to 0 within the
    /// on-time tolerance (§4.2).
    pub fn samples_to_next_beat(&self) -> u64 {
        let spb = self.samples_per_beat() as u64;
        let pos = self.sample_position() % spb;
        if pos <= ON_TIME_TOLERANCE {
            return 0;
        }
        spb - pos
    }

    /// Samples until the next integer multiple of `subdivision_samples`
    /// within the current beat.
    ///
    /// Elapsed-in-beat is taken as `sample_position mod samples_per_beat`.
    /// See DESIGN.md: the tick-derived formula it replaces can't reproduce
    /// the worked example's exact sample counts against the same tempo.
    pub fn samples_to_next_subdivision(&self, subdivision_samples: u64) -> u64 {
        if subdivision_samples == 0 {
            return 0;
        }
        let spb = self.samples_per_beat() as u64;
        let elapsed = self.sample_position() % spb;
        let rem = elapsed % subdivision_samples;
        if rem == 0 {
            0
        } else {
            subdivision_samples - rem
        }
    }

    /// Samples until the next bar boundary (4 beats per bar).
    pub fn samples_to_next_bar(&self) -> u64 {
        let spb = self.samples_per_beat() as u64;
        let bar_samples = spb * 4;
        let pos = self.sample_position() % bar_samples;
        if pos == 0 {
            0
        } else {
            bar_samples - pos
        }
    }

    pub fn beat_to_sample(&self, beat: u64) -> u64 {
        beat * self.samples_per_beat() as u64
    }

    pub fn bar_to_sample(&self, bar: u64) -> u64 {
        bar * self.samples_per_beat() as u64 * 4
    }

    pub fn sample_to_beat(&self, position: u64) -> u64 {
        position / self.samples_per_beat() as u64
    }

    /// Whether `sample_position` is within `[beat_start, beat_start + block_len)`.
    pub fn is_on_beat_boundary(&self, block_len: u64) -> bool {
        let spb = self.samples_per_beat() as u64;
        let pos = self.sample_position();
        let beat_start = self.beat_number() as u64 * spb;
        pos >= beat_start && pos < beat_start + block_len
    }

    /// Like [`Self::is_on_beat_boundary`] but additionally requires beat-in-bar == 0.
    pub fn is_on_bar_boundary(&self, block_len: u64) -> bool {
        self.is_on_beat_boundary(block_len) && self.beat_number().is_multiple_of(4)
    }
}

impl Default for TimeKeeper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_tick_rolls_over_at_24() {
        let tk = TimeKeeper::new();
        for _ in 0..23 {
            tk.increment_tick();
        }
        assert_eq!(tk.tick_in_beat(), 23);
        assert_eq!(tk.beat_number(), 0);
        assert!(!tk.poll_beat_flag());

        tk.increment_tick();
        assert_eq!(tk.tick_in_beat(), 0);
        assert_eq!(tk.beat_number(), 1);
        assert!(tk.poll_beat_flag());
        assert!(!tk.poll_beat_flag(), "poll should clear the flag");
    }

    #[test]
    fn test_sync_to_external_clock_120_bpm() {
        let tk = TimeKeeper::new();
        // 20,833us period * 24 ticks/beat = one beat at ~120 BPM.
        tk.sync_to_external_clock(20_833.0, 44_100);
        let spb = tk.samples_per_beat();
        assert!((spb as i64 - 22_050).abs() <= 1, "spb={spb}");
    }

    #[test]
    fn test_sync_rejects_out_of_range() {
        let tk = TimeKeeper::new();
        let before = tk.samples_per_beat();
        tk.sync_to_external_clock(1.0, 44_100); // absurdly fast, spb far below min
        assert_eq!(tk.samples_per_beat(), before);
    }

    #[test]
    fn test_samples_to_next_beat_on_time_tolerance() {
        let tk = TimeKeeper::new(); // spb = 22050
        tk.increment_samples(22_050 * 3 + 10);
        assert_eq!(tk.samples_to_next_beat(), 0);

        tk.reset();
        tk.increment_samples(1_000);
        assert_eq!(tk.samples_to_next_beat(), 22_050 - 1_000);
    }

    #[test]
    fn test_samples_to_next_subdivision_scenario() {
        // Scenario 3 from spec: sp=1000 in-beat, quant=QUANT_16 => subdivision=5512.
        let tk = TimeKeeper::new();
        tk.increment_samples(1_000);
        let sub = Quantization::Quant16.duration_samples(tk.samples_per_beat());
        assert_eq!(sub, 5_512);
        assert_eq!(tk.samples_to_next_subdivision(sub), 4_512);
    }

    #[test]
    fn test_beat_sample_roundtrip() {
        let tk = TimeKeeper::new();
        let p = 50_000u64;
        let b = tk.sample_to_beat(p);
        assert!(tk.beat_to_sample(b) <= p);
        assert!(p < tk.beat_to_sample(b + 1));
    }

    #[test]
    fn test_reset_idempotent() {
        let tk = TimeKeeper::new();
        tk.increment_samples(5_000);
        tk.increment_tick();
        tk.reset();
        let snapshot = (
            tk.sample_position(),
            tk.beat_number(),
            tk.tick_in_beat(),
            tk.samples_per_beat(),
        );
        tk.reset();
        assert_eq!(
            snapshot,
            (
                tk.sample_position(),
                tk.beat_number(),
                tk.tick_in_beat(),
                tk.samples_per_beat()
            )
        );
    }
}
