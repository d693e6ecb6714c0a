//! Signal generation and processing for the audio thread
//!
//! Contains the additive oscillator, the clip backend, volume transitions,
//! the low-pass filter and the feedback reverb.

mod clip;
mod filter;
mod oscillator;
mod reverb;
mod smoothing;
mod source;
mod transition;

pub use clip::{ClipError, ClipSource, MAX_CLIP_PITCH};
pub use filter::{coefficient, CutoffRange, LowPassFilter};
pub use oscillator::{
    effective_frequency, Harmonic, HarmonicOscillator, HarmonicSet, MAX_HARMONICS,
    MIN_BASE_FREQUENCY, MIN_PITCH_FACTOR,
};
pub use reverb::{Reverb, ReverbSettings};
pub use smoothing::Smoothed;
pub use source::SignalSource;
pub use transition::{
    fade_samples, smoothstep, FadeState, FadeTrajectory, PendingAction, Transition,
    TransitionEvent, SILENCE_EPSILON,
};
