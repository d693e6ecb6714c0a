//! Feedback delay-line reverb
//!
//! One circular buffer per channel with a single feedback tap:
//!
//! ```text
//! delayed = line[read]
//! wet     = delayed * gain
//! line[write] = clamp(input + wet, -1, 1)
//! output  = input * (1 - mix) + wet * mix
//! ```
//!
//! The read index trails the write index by a `delay` fixed at
//! configuration time. Mix and gain are smoothed toward their targets once per
//! buffer. When disabled the dry input passes through untouched while the
//! buffer keeps being written, so re-enabling needs no special handling.

use super::Smoothed;

/// Reverb lengths and limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSettings {
    /// Buffer length in seconds
    pub max_delay_seconds: f32,
    /// Distance between write and read position in seconds
    pub delay_seconds: f32,
    /// Upper bound for the feedback gain
    pub max_feedback: f32,
    /// Per-sample smoothing factor for mix and gain
    pub smoothing: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            max_delay_seconds: 0.5,
            delay_seconds: 0.3,
            max_feedback: 0.95,
            smoothing: 0.002,
        }
    }
}

/// Multi-channel single-tap feedback delay
pub struct Reverb {
    settings: ReverbSettings,
    enabled: bool,
    lines: Vec<Vec<f32>>,
    channels: usize,
    capacity: usize,
    delay: usize,
    write: usize,
    read: usize,
    mix: Smoothed,
    gain: Smoothed,
}

impl Reverb {
    /// Create an unconfigured reverb; call [`Reverb::configure`] before use
    pub fn new(settings: ReverbSettings) -> Self {
        Self {
            settings,
            enabled: true,
            lines: Vec::new(),
            channels: 0,
            capacity: 0,
            delay: 0,
            write: 0,
            read: 0,
            mix: Smoothed::new(0.0, settings.smoothing),
            gain: Smoothed::new(0.0, settings.smoothing),
        }
    }

    /// Allocate delay lines for a sample rate and channel count
    pub fn configure(&mut self, sample_rate: f32, channels: usize) {
        self.capacity = ((sample_rate * self.settings.max_delay_seconds).round() as usize).max(2);
        self.delay = ((sample_rate * self.settings.delay_seconds).round() as usize)
            .clamp(1, self.capacity - 1);
        self.lines.clear();
        self.set_channels(channels);
    }

    /// Resize for a new channel count and clear every line.
    ///
    /// Lines are only allocated when the count grows past what was seen
    /// before.
    pub fn set_channels(&mut self, channels: usize) {
        while self.lines.len() < channels {
            self.lines.push(vec![0.0; self.capacity]);
        }
        for line in &mut self.lines {
            line.fill(0.0);
        }
        self.channels = channels;
        self.write = 0;
        self.read = self.capacity - self.delay;
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Buffer length in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read offset behind the write position in samples
    pub fn delay_samples(&self) -> usize {
        self.delay
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the wet/dry mix target (0-1)
    pub fn set_amount(&mut self, amount: f32) {
        if amount.is_finite() {
            self.mix.set_target(amount.clamp(0.0, 1.0));
        }
    }

    /// Set the feedback gain target (0-1, limited by `max_feedback`)
    pub fn set_decay(&mut self, decay: f32) {
        if decay.is_finite() {
            self.gain
                .set_target(decay.clamp(0.0, self.settings.max_feedback.clamp(0.0, 1.0)));
        }
    }

    pub fn mix(&self) -> f32 {
        self.mix.current()
    }

    pub fn gain(&self) -> f32 {
        self.gain.current()
    }

    /// Jump mix and gain to their targets
    pub fn snap(&mut self) {
        self.mix.snap();
        self.gain.snap();
    }

    /// Advance mix and gain smoothing by a buffer of `frames`
    pub fn update(&mut self, frames: usize) {
        self.mix.advance(frames);
        self.gain.advance(frames);
    }

    /// Process one interleaved frame in place and advance the delay position
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        if self.capacity == 0 {
            return;
        }

        let mix = self.mix.current();
        let gain = self.gain.current();

        for (line, sample) in self.lines.iter_mut().zip(frame.iter_mut()).take(self.channels) {
            let input = *sample;
            let wet = line[self.read] * gain;
            line[self.write] = (input + wet).clamp(-1.0, 1.0);

            if self.enabled && mix > 0.0 {
                *sample = input * (1.0 - mix) + wet * mix;
            }
        }

        self.write = (self.write + 1) % self.capacity;
        self.read = (self.read + 1) % self.capacity;
    }

    /// Clear all delay lines
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.fill(0.0);
        }
    }
}
