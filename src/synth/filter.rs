//! One-pole low-pass filter
//!
//! `y[n] = a * x[n] + (1 - a) * y[n-1]` with an independent `y[n-1]` per
//! channel. The coefficient follows a smoothed, normalized cutoff that is
//! mapped into a configured Hz range.

use std::f32::consts::TAU;

use super::Smoothed;

/// Maps a normalized cutoff onto Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutoffRange {
    pub min_hz: f32,
    pub max_hz: f32,
    /// Exponent applied to the output level when the cutoff tracks volume
    pub curve: f32,
}

impl CutoffRange {
    pub fn new(min_hz: f32, max_hz: f32, curve: f32) -> Self {
        Self { min_hz, max_hz, curve }
    }

    /// Convert a normalized cutoff (0-1) to Hz
    pub fn to_hz(&self, normalized: f32) -> f32 {
        let n = normalized.clamp(0.0, 1.0);
        self.min_hz + (self.max_hz - self.min_hz) * n
    }

    /// Normalized cutoff for a given output level: quieter is darker
    pub fn from_level(&self, level: f32) -> f32 {
        level.clamp(0.0, 1.0).powf(self.curve.max(0.0))
    }
}

impl Default for CutoffRange {
    fn default() -> Self {
        Self::new(400.0, 16000.0, 0.5)
    }
}

/// Exponential-stable one-pole coefficient for a cutoff in Hz
pub fn coefficient(cutoff_hz: f32, sample_rate: f32) -> f32 {
    if sample_rate <= 0.0 || !cutoff_hz.is_finite() {
        return 1.0;
    }
    let fc = cutoff_hz.clamp(0.0, sample_rate * 0.49);
    (1.0 - (-TAU * fc / sample_rate).exp()).clamp(0.0, 1.0)
}

/// Multi-channel one-pole low-pass filter
pub struct LowPassFilter {
    enabled: bool,
    range: CutoffRange,
    cutoff: Smoothed,
    alpha: f32,
    sample_rate: f32,
    state: Vec<f32>,
    channels: usize,
}

impl LowPassFilter {
    /// Create a filter; `cutoff` is the initial normalized cutoff
    pub fn new(range: CutoffRange, cutoff: f32, smoothing: f32) -> Self {
        Self {
            enabled: true,
            range,
            cutoff: Smoothed::new(cutoff.clamp(0.0, 1.0), smoothing),
            alpha: 1.0,
            sample_rate: 0.0,
            state: Vec::new(),
            channels: 0,
        }
    }

    /// Set the sample rate and size per-channel state.
    ///
    /// Reserves room for `max_channels` so later channel changes up to that
    /// count do not allocate.
    pub fn configure(&mut self, sample_rate: f32, channels: usize, max_channels: usize) {
        self.sample_rate = sample_rate;
        self.state = Vec::with_capacity(max_channels.max(channels));
        self.set_channels(channels);
        self.cutoff.snap();
        self.update_alpha();
    }

    /// Resize per-channel state. Existing history is cleared.
    pub fn set_channels(&mut self, channels: usize) {
        self.state.clear();
        self.state.resize(channels, 0.0);
        self.channels = channels;
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the normalized target cutoff (0-1)
    pub fn set_target_cutoff(&mut self, normalized: f32) {
        if normalized.is_finite() {
            self.cutoff.set_target(normalized.clamp(0.0, 1.0));
        }
    }

    /// Jump the smoothed cutoff to its target
    pub fn snap_cutoff(&mut self) {
        self.cutoff.snap();
        self.update_alpha();
    }

    /// Current normalized cutoff
    pub fn cutoff(&self) -> f32 {
        self.cutoff.current()
    }

    pub fn range(&self) -> CutoffRange {
        self.range
    }

    /// Advance cutoff smoothing by a buffer of `frames` and refresh the coefficient
    pub fn update(&mut self, frames: usize) {
        self.cutoff.advance(frames);
        self.update_alpha();
    }

    /// Effective coefficient; 1.0 when bypassed
    pub fn alpha(&self) -> f32 {
        if self.enabled {
            self.alpha
        } else {
            1.0
        }
    }

    fn update_alpha(&mut self) {
        self.alpha = coefficient(self.range.to_hz(self.cutoff.current()), self.sample_rate);
    }

    /// Filter one sample on `channel`
    pub fn process(&mut self, channel: usize, input: f32) -> f32 {
        let Some(last) = self.state.get_mut(channel) else {
            return input;
        };

        if !self.enabled {
            // Keep history current so re-enabling starts from the dry signal
            *last = input;
            return input;
        }

        let output = self.alpha * input + (1.0 - self.alpha) * *last;
        *last = output;
        output
    }

    /// Clear filter history
    pub fn reset(&mut self) {
        self.state.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn filter(cutoff: f32) -> LowPassFilter {
        let mut filter = LowPassFilter::new(CutoffRange::new(20.0, 20000.0, 1.0), cutoff, 1.0);
        filter.configure(44100.0, 1, 2);
        filter
    }

    #[test]
    fn test_coefficient_range() {
        assert_eq!(coefficient(0.0, 48000.0), 0.0);
        let a = coefficient(1000.0, 48000.0);
        assert!(a > 0.0 && a < 1.0);
        assert!(coefficient(1e9, 48000.0) <= 1.0);
        assert_eq!(coefficient(1000.0, 0.0), 1.0);
    }

    #[test]
    fn test_coefficient_matches_formula() {
        let expected = 1.0 - (-TAU * 500.0 / 48000.0).exp();
        assert!((coefficient(500.0, 48000.0) - expected).abs() < 1e-7);
    }

    #[test]
    fn test_bypass_is_lossless() {
        let mut filter = filter(0.0);
        filter.set_enabled(false);
        assert_eq!(filter.alpha(), 1.0);

        for i in 0..512 {
            let input = (i as f32 * 0.37).sin() * 0.9;
            assert_eq!(filter.process(0, input), input);
        }
    }

    #[test]
    fn test_reenable_resumes_from_dry_signal() {
        let mut filter = filter(0.01);
        filter.set_enabled(false);
        for _ in 0..10 {
            filter.process(0, 0.8);
        }
        filter.set_enabled(true);

        // History holds 0.8, so a constant 0.8 input stays at 0.8
        let out = filter.process(0, 0.8);
        assert!((out - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequencies() {
        let mut filter = filter(0.0);
        filter.set_target_cutoff(100.0 / 19980.0);
        filter.snap_cutoff();

        let freq = 5000.0;
        let mut max_output = 0.0f32;
        for i in 0..2000 {
            let t = i as f32 / 44100.0;
            let out = filter.process(0, (2.0 * PI * freq * t).sin());
            if i > 200 {
                max_output = max_output.max(out.abs());
            }
        }
        assert!(max_output < 0.1, "expected attenuation, got {}", max_output);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut filter = filter(0.05);
        filter.set_channels(2);
        for _ in 0..50 {
            filter.process(0, 1.0);
            filter.process(1, 0.0);
        }
        assert!(filter.process(0, 1.0) > 0.5);
        assert_eq!(filter.process(1, 0.0), 0.0);
    }

    #[test]
    fn test_cutoff_smoothing_is_gradual() {
        let mut filter = LowPassFilter::new(CutoffRange::default(), 1.0, 0.01);
        filter.configure(48000.0, 1, 1);
        filter.set_target_cutoff(0.0);
        filter.update(1);
        assert!(filter.cutoff() > 0.98);
        filter.update(10_000);
        assert_eq!(filter.cutoff(), 0.0);
    }

    #[test]
    fn test_level_mapping() {
        let range = CutoffRange::new(200.0, 10200.0, 2.0);
        assert_eq!(range.from_level(0.5), 0.25);
        assert_eq!(range.to_hz(0.25), 2700.0);
        assert_eq!(range.to_hz(2.0), 10200.0);
        assert_eq!(range.from_level(-1.0), 0.0);
    }

    #[test]
    fn test_unknown_channel_passes_through() {
        let mut filter = filter(0.5);
        assert_eq!(filter.process(7, 0.3), 0.3);
    }
}
