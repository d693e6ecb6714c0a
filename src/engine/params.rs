//! Parameters shared between the control and audio threads
//!
//! Continuous targets are lock-free atomic scalars written only by the
//! control side and read by the audio callback. Discrete requests travel
//! through an `rtrb` ring as [`Command`] values.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::GlideConfig;
use crate::synth::HarmonicSet;

/// An `f32` stored as raw bits in an [`AtomicU32`]
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Raw bit pattern, for cheap change detection
    pub fn bits(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Transport and timbre requests queued for the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Start playback, fading in over `fade_seconds` (0 = immediate)
    Play { fade_seconds: f32 },
    /// Stop playback, fading out over `fade_seconds` (0 = immediate)
    Stop { fade_seconds: f32 },
    /// Quick fade to silence without rewinding the timeline
    Pause,
    /// Fade to the current volume target over `fade_seconds`
    Volume { fade_seconds: f32 },
    /// Replace the harmonic set
    LoadHarmonics(HarmonicSet),
}

/// Scalar targets shared by [`Controller`](super::Controller) and [`Engine`](super::Engine)
#[derive(Debug)]
pub struct SharedParams {
    /// Set by the audio side once prepared; 0 means not ready
    pub sample_rate: AtomicF32,
    pub volume: AtomicF32,
    pub pitch: AtomicF32,
    pub base_frequency: AtomicF32,
    pub low_pass_enabled: AtomicBool,
    pub low_pass_cutoff: AtomicF32,
    /// Cutoff follows `low_pass_cutoff` instead of the output level
    pub low_pass_manual: AtomicBool,
    pub reverb_enabled: AtomicBool,
    pub reverb_amount: AtomicF32,
    pub reverb_decay: AtomicF32,
    /// Sticky hand-off: set by audio when a requested fade settles, cleared by control
    pub fade_complete: AtomicBool,
    /// Count of transport commands the audio side had received when it last
    /// raised `fade_complete`
    pub completed_request: AtomicU32,
}

impl SharedParams {
    pub fn new(config: &GlideConfig) -> Self {
        Self {
            sample_rate: AtomicF32::new(0.0),
            volume: AtomicF32::new(config.synth.volume.clamp(0.0, 1.0)),
            pitch: AtomicF32::new(config.synth.pitch),
            base_frequency: AtomicF32::new(config.synth.base_frequency),
            low_pass_enabled: AtomicBool::new(config.filter.enabled),
            low_pass_cutoff: AtomicF32::new(config.filter.cutoff.clamp(0.0, 1.0)),
            low_pass_manual: AtomicBool::new(!config.filter.track_volume),
            reverb_enabled: AtomicBool::new(config.reverb.enabled),
            reverb_amount: AtomicF32::new(config.reverb.amount.clamp(0.0, 1.0)),
            reverb_decay: AtomicF32::new(config.reverb.decay.clamp(0.0, 1.0)),
            fade_complete: AtomicBool::new(false),
            completed_request: AtomicU32::new(0),
        }
    }

    /// Whether the audio side has been prepared
    pub fn is_ready(&self) -> bool {
        self.sample_rate.load() > 0.0
    }

    pub fn signal_fade_complete(&self) {
        self.fade_complete.store(true, Ordering::Release);
    }

    /// Record which request finished, then raise the hand-off flag
    pub fn complete_request(&self, received: u32) {
        self.completed_request.store(received, Ordering::Release);
        self.signal_fade_complete();
    }

    /// Clear the hand-off flag, returning whether it was set
    pub fn take_fade_complete(&self) -> bool {
        self.fade_complete.swap(false, Ordering::AcqRel)
    }

    pub fn flag(flag: &AtomicBool) -> bool {
        flag.load(Ordering::Relaxed)
    }

    pub fn set_flag(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::Relaxed);
    }
}
