//! Additive harmonic oscillator
//!
//! Sums sine partials at integer multiples of a base frequency. The phase is
//! an elapsed-time accumulator in seconds that is never wrapped, so every
//! partial derives from the same base phase and stays coherent.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;

use super::SignalSource;

/// Maximum number of partials in a [`HarmonicSet`]
pub const MAX_HARMONICS: usize = 32;

/// Lowest base frequency the oscillator will run at (Hz)
pub const MIN_BASE_FREQUENCY: f32 = 20.0;

/// Lowest pitch multiplier the oscillator will run at
pub const MIN_PITCH_FACTOR: f32 = 0.01;

/// One partial: a multiple of the base frequency and its amplitude
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Harmonic {
    pub number: u32,
    pub amplitude: f32,
}

impl Harmonic {
    pub const fn new(number: u32, amplitude: f32) -> Self {
        Self { number, amplitude }
    }

    /// Whether this partial contributes to the output
    pub fn is_audible(&self) -> bool {
        self.number > 0 && self.amplitude != 0.0 && self.amplitude.is_finite()
    }
}

/// A fixed-capacity, order-preserving list of partials.
///
/// The set is `Copy` so it can be handed to the audio thread by value and
/// replaced there in a single assignment.
#[derive(Clone, Copy, PartialEq)]
pub struct HarmonicSet {
    partials: [Harmonic; MAX_HARMONICS],
    len: usize,
}

impl HarmonicSet {
    pub const fn empty() -> Self {
        Self {
            partials: [Harmonic::new(0, 0.0); MAX_HARMONICS],
            len: 0,
        }
    }

    /// Build a set from a slice, keeping at most [`MAX_HARMONICS`] entries
    pub fn from_slice(harmonics: &[Harmonic]) -> Self {
        let mut set = Self::empty();
        for harmonic in harmonics.iter().take(MAX_HARMONICS) {
            set.push(*harmonic);
        }
        set
    }

    /// Append a partial. Returns false when the set is full.
    pub fn push(&mut self, harmonic: Harmonic) -> bool {
        if self.len == MAX_HARMONICS {
            return false;
        }
        self.partials[self.len] = harmonic;
        self.len += 1;
        true
    }

    pub fn as_slice(&self) -> &[Harmonic] {
        &self.partials[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Upper bound of the summed output: the sum of audible amplitude magnitudes
    pub fn peak(&self) -> f32 {
        self.as_slice()
            .iter()
            .filter(|h| h.is_audible())
            .map(|h| h.amplitude.abs())
            .sum()
    }
}

impl Default for HarmonicSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for HarmonicSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Combine base frequency and pitch multiplier, applying the lower floors.
pub fn effective_frequency(base_frequency: f32, pitch: f32) -> f64 {
    let base = if base_frequency.is_finite() {
        base_frequency.max(MIN_BASE_FREQUENCY)
    } else {
        MIN_BASE_FREQUENCY
    };
    let pitch = if pitch.is_finite() {
        pitch.max(MIN_PITCH_FACTOR)
    } else {
        1.0
    };
    base as f64 * pitch as f64
}

/// Additive oscillator driven by a [`HarmonicSet`]
pub struct HarmonicOscillator {
    harmonics: HarmonicSet,
    /// Seconds elapsed since the last reset
    phase: f64,
    frequency: f64,
    sample_rate: f64,
}

impl HarmonicOscillator {
    /// Create a new oscillator
    pub fn new(harmonics: HarmonicSet, frequency: f64, sample_rate: f64) -> Self {
        Self {
            harmonics,
            phase: 0.0,
            frequency,
            sample_rate,
        }
    }

    /// Get the current frequency
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Get the elapsed phase in seconds
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn harmonics(&self) -> &HarmonicSet {
        &self.harmonics
    }

    /// Evaluate the waveform at an arbitrary phase without advancing
    pub fn sample_at(&self, phase: f64) -> f32 {
        let omega = TAU * phase * self.frequency;
        let mut sum = 0.0f64;
        for harmonic in self.harmonics.as_slice() {
            if !harmonic.is_audible() {
                continue;
            }
            sum += harmonic.amplitude as f64 * (omega * harmonic.number as f64).sin();
        }
        sum as f32
    }
}

impl SignalSource for HarmonicOscillator {
    fn name(&self) -> &'static str {
        "harmonic"
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn set_frequency(&mut self, base_frequency: f32, pitch: f32) {
        self.frequency = effective_frequency(base_frequency, pitch);
    }

    fn load_harmonics(&mut self, harmonics: &HarmonicSet) {
        self.harmonics = *harmonics;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn generate(&mut self) -> f32 {
        let sample = self.sample_at(self.phase);
        if self.sample_rate > 0.0 {
            self.phase += 1.0 / self.sample_rate;
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(partials: &[(u32, f32)]) -> HarmonicSet {
        let harmonics: Vec<Harmonic> = partials
            .iter()
            .map(|&(number, amplitude)| Harmonic::new(number, amplitude))
            .collect();
        HarmonicSet::from_slice(&harmonics)
    }

    #[test]
    fn test_first_sample_is_zero() {
        let mut osc = HarmonicOscillator::new(set(&[(1, 1.0), (3, 0.5)]), 440.0, 48000.0);
        assert!(osc.generate().abs() < 1e-9);
    }

    #[test]
    fn test_single_partial_is_periodic() {
        let osc = HarmonicOscillator::new(set(&[(1, 1.0)]), 440.0, 48000.0);
        let start = osc.sample_at(0.0);
        let after_cycle = osc.sample_at(1.0 / 440.0);
        assert!((start - after_cycle).abs() < 1e-6);

        let quarter = osc.sample_at(0.25 / 440.0);
        assert!((quarter - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_generation_returns_to_start_after_whole_cycles() {
        let mut osc = HarmonicOscillator::new(set(&[(1, 1.0)]), 440.0, 48000.0);
        let first = osc.generate();
        // One second of audio is exactly 440 cycles
        for _ in 1..48000 {
            osc.generate();
        }
        let next = osc.generate();
        assert!((next - first).abs() < 1e-6, "drifted to {}", next);
    }

    #[test]
    fn test_output_bounded_by_amplitude_sum() {
        let harmonics = set(&[(1, 0.8), (2, -0.4), (5, 0.25), (7, 0.1)]);
        let bound = harmonics.peak();
        assert!((bound - 1.55).abs() < 1e-6);

        for &(base, pitch) in &[(55.0, 1.0), (440.0, 1.5), (1000.0, 0.3), (20.0, 0.01)] {
            let mut osc = HarmonicOscillator::new(harmonics, 0.0, 44100.0);
            osc.set_frequency(base, pitch);
            for _ in 0..5000 {
                let sample = osc.generate();
                assert!(sample.abs() <= bound + 1e-5, "overshoot {} > {}", sample, bound);
            }
        }
    }

    #[test]
    fn test_degenerate_partials_are_skipped() {
        let osc = HarmonicOscillator::new(set(&[(0, 1.0), (2, 0.0)]), 440.0, 48000.0);
        for i in 0..100 {
            assert_eq!(osc.sample_at(i as f64 / 48000.0), 0.0);
        }
        assert_eq!(osc.harmonics().peak(), 0.0);
    }

    #[test]
    fn test_frequency_floors() {
        assert_eq!(effective_frequency(0.0, 1.0), 20.0);
        assert_eq!(effective_frequency(-5.0, 2.0), 40.0);
        assert!((effective_frequency(100.0, 0.0) - 1.0).abs() < 1e-6);
        assert_eq!(effective_frequency(f32::NAN, f32::NAN), 20.0);
    }

    #[test]
    fn test_reset_rewinds_phase() {
        let mut osc = HarmonicOscillator::new(set(&[(1, 1.0)]), 440.0, 48000.0);
        for _ in 0..100 {
            osc.generate();
        }
        assert!(osc.phase() > 0.0);
        osc.reset();
        assert_eq!(osc.phase(), 0.0);
    }

    #[test]
    fn test_set_capacity() {
        let many: Vec<Harmonic> = (1..=40).map(|n| Harmonic::new(n, 0.01)).collect();
        let harmonics = HarmonicSet::from_slice(&many);
        assert_eq!(harmonics.len(), MAX_HARMONICS);
        assert_eq!(harmonics.as_slice()[0].number, 1);

        let mut full = harmonics;
        assert!(!full.push(Harmonic::new(41, 0.01)));
    }
}
