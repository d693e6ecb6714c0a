//! Configuration schema definitions

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::synth::{CutoffRange, Harmonic, ReverbSettings, MAX_HARMONICS};

/// Main configuration for Glide
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlideConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Signal source and initial control values
    #[serde(default)]
    pub synth: SynthConfig,

    /// Fade timing
    #[serde(default)]
    pub transition: TransitionConfig,

    /// Low-pass filter
    #[serde(default)]
    pub filter: FilterConfig,

    /// Feedback reverb
    #[serde(default)]
    pub reverb: ReverbConfig,

    /// Optional preset library (YAML or JSON)
    #[serde(default)]
    pub presets_file: Option<PathBuf>,
}

impl GlideConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Audio settings
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.buffer_size < 16 || self.audio.buffer_size > 8192 {
            bail!("Buffer size must be between 16 and 8192");
        }
        if self.audio.channels == 0 || self.audio.channels > self.audio.max_channels {
            bail!(
                "Channel count must be between 1 and max_channels ({})",
                self.audio.max_channels
            );
        }

        // Synth settings
        if !(self.synth.volume >= 0.0 && self.synth.volume <= 1.0) {
            bail!("Volume must be between 0.0 and 1.0");
        }
        if !(self.synth.base_frequency > 0.0) {
            bail!("Base frequency must be positive");
        }
        if !(self.synth.pitch > 0.0) {
            bail!("Pitch factor must be positive");
        }
        if self.synth.harmonics.len() > MAX_HARMONICS {
            bail!("At most {} harmonics are supported", MAX_HARMONICS);
        }

        // Transition timing
        let t = &self.transition;
        for (name, value) in [
            ("quick_fade_seconds", t.quick_fade_seconds),
            ("volume_fade_seconds", t.volume_fade_seconds),
            ("failsafe_grace_seconds", t.failsafe_grace_seconds),
        ] {
            if !(value >= 0.0) {
                bail!("transition.{} must not be negative", name);
            }
        }
        if !(t.max_fade_seconds > 0.0) {
            bail!("transition.max_fade_seconds must be positive");
        }

        // Filter
        if !(self.filter.min_cutoff_hz > 0.0 && self.filter.min_cutoff_hz < self.filter.max_cutoff_hz) {
            bail!("Filter cutoff range must satisfy 0 < min_cutoff_hz < max_cutoff_hz");
        }
        if !(self.filter.smoothing > 0.0 && self.filter.smoothing <= 1.0) {
            bail!("Filter smoothing must be in (0, 1]");
        }

        // Reverb
        if !(self.reverb.max_delay_seconds > 0.0) {
            bail!("reverb.max_delay_seconds must be positive");
        }
        if !(self.reverb.delay_seconds > 0.0 && self.reverb.delay_seconds < self.reverb.max_delay_seconds) {
            bail!("reverb.delay_seconds must be positive and below max_delay_seconds");
        }
        if !(self.reverb.max_feedback >= 0.0 && self.reverb.max_feedback < 1.0) {
            bail!("reverb.max_feedback must be in [0, 1)");
        }
        if !(self.reverb.smoothing > 0.0 && self.reverb.smoothing <= 1.0) {
            bail!("Reverb smoothing must be in (0, 1]");
        }

        Ok(())
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz for offline rendering (default: 48000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Frames per processing block when rendering offline (default: 512)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Channels for offline rendering (default: 2)
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Output device name (None = default device)
    #[serde(default)]
    pub device: Option<String>,

    /// Channel count the engine reserves state for up front (default: 8)
    #[serde(default = "default_max_channels")]
    pub max_channels: u16,
}

fn default_sample_rate() -> u32 { 48000 }
fn default_buffer_size() -> usize { 512 }
fn default_channels() -> u16 { 2 }
fn default_max_channels() -> u16 { 8 }

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            channels: default_channels(),
            device: None,
            max_channels: default_max_channels(),
        }
    }
}

/// Signal source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Base frequency in Hz (default: 220)
    #[serde(default = "default_base_frequency")]
    pub base_frequency: f32,

    /// Pitch multiplier (default: 1.0)
    #[serde(default = "default_pitch")]
    pub pitch: f32,

    /// Playback volume 0.0-1.0 (default: 0.7)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Harmonic preset name (default: organ)
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Explicit harmonics; overrides `preset` when not empty
    #[serde(default)]
    pub harmonics: Vec<Harmonic>,

    /// WAV clip to loop instead of the oscillator
    #[serde(default)]
    pub clip: Option<PathBuf>,
}

fn default_base_frequency() -> f32 { 220.0 }
fn default_pitch() -> f32 { 1.0 }
fn default_volume() -> f32 { 0.7 }
fn default_preset() -> String { "organ".to_string() }

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            base_frequency: default_base_frequency(),
            pitch: default_pitch(),
            volume: default_volume(),
            preset: default_preset(),
            harmonics: Vec::new(),
            clip: None,
        }
    }
}

/// Fade timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Forced fade-out before a restart or retune (default: 0.02)
    #[serde(default = "default_quick_fade")]
    pub quick_fade_seconds: f32,

    /// Fade applied to volume changes while playing (default: 0.05)
    #[serde(default = "default_volume_fade")]
    pub volume_fade_seconds: f32,

    /// Longest fade accepted (default: 30)
    #[serde(default = "default_max_fade")]
    pub max_fade_seconds: f32,

    /// Slack before a stuck transition is force-stopped (default: 0.5)
    #[serde(default = "default_failsafe_grace")]
    pub failsafe_grace_seconds: f32,
}

fn default_quick_fade() -> f32 { 0.02 }
fn default_volume_fade() -> f32 { 0.05 }
fn default_max_fade() -> f32 { 30.0 }
fn default_failsafe_grace() -> f32 { 0.5 }

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            quick_fade_seconds: default_quick_fade(),
            volume_fade_seconds: default_volume_fade(),
            max_fade_seconds: default_max_fade(),
            failsafe_grace_seconds: default_failsafe_grace(),
        }
    }
}

/// Low-pass filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Derive the cutoff from the output level (default: true)
    #[serde(default = "default_enabled")]
    pub track_volume: bool,

    /// Normalized cutoff used when not tracking volume (default: 1.0)
    #[serde(default = "default_cutoff")]
    pub cutoff: f32,

    #[serde(default = "default_min_cutoff")]
    pub min_cutoff_hz: f32,

    #[serde(default = "default_max_cutoff")]
    pub max_cutoff_hz: f32,

    /// Exponent applied to the level in volume-tracking mode (default: 0.5)
    #[serde(default = "default_curve")]
    pub curve: f32,

    /// Per-sample smoothing factor for cutoff changes (default: 0.002)
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

fn default_enabled() -> bool { true }
fn default_cutoff() -> f32 { 1.0 }
fn default_min_cutoff() -> f32 { 400.0 }
fn default_max_cutoff() -> f32 { 16000.0 }
fn default_curve() -> f32 { 0.5 }
fn default_smoothing() -> f32 { 0.002 }

impl FilterConfig {
    pub fn range(&self) -> CutoffRange {
        CutoffRange::new(self.min_cutoff_hz, self.max_cutoff_hz, self.curve)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            track_volume: true,
            cutoff: default_cutoff(),
            min_cutoff_hz: default_min_cutoff(),
            max_cutoff_hz: default_max_cutoff(),
            curve: default_curve(),
            smoothing: default_smoothing(),
        }
    }
}

/// Reverb settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverbConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Wet/dry mix 0.0-1.0 (default: 0.25)
    #[serde(default = "default_amount")]
    pub amount: f32,

    /// Feedback gain 0.0-1.0 (default: 0.4)
    #[serde(default = "default_decay")]
    pub decay: f32,

    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f32,

    #[serde(default = "default_delay")]
    pub delay_seconds: f32,

    #[serde(default = "default_max_feedback")]
    pub max_feedback: f32,

    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

fn default_amount() -> f32 { 0.25 }
fn default_decay() -> f32 { 0.4 }
fn default_max_delay() -> f32 { 0.5 }
fn default_delay() -> f32 { 0.3 }
fn default_max_feedback() -> f32 { 0.95 }

impl ReverbConfig {
    pub fn settings(&self) -> ReverbSettings {
        ReverbSettings {
            max_delay_seconds: self.max_delay_seconds,
            delay_seconds: self.delay_seconds,
            max_feedback: self.max_feedback,
            smoothing: self.smoothing,
        }
    }
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: default_amount(),
            decay: default_decay(),
            max_delay_seconds: default_max_delay(),
            delay_seconds: default_delay(),
            max_feedback: default_max_feedback(),
            smoothing: default_smoothing(),
        }
    }
}
