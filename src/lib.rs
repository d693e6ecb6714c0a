//! Glide - click-free additive synthesis with real-time control
//!
//! A harmonic oscillator (or a looped clip) runs through a volume transition
//! state machine, a one-pole low-pass filter and a feedback reverb inside the
//! audio callback. The control thread talks to it only through atomics and a
//! wait-free command queue.

pub mod config;
pub mod engine;
pub mod presets;
pub mod synth;

pub use config::GlideConfig;
pub use engine::{Controller, Engine};
