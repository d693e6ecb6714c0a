//! Signal source trait for playback backends

use super::HarmonicSet;

/// A raw signal generator driven once per sample frame by the engine.
///
/// Implementations are chosen when the engine is built; the engine applies
/// fades, filtering, reverb and sanitizing on top of whatever they produce.
pub trait SignalSource: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Set the engine sample rate
    fn set_sample_rate(&mut self, sample_rate: f64);

    /// Apply a base frequency and pitch multiplier
    fn set_frequency(&mut self, base_frequency: f32, pitch: f32);

    /// Replace the timbre. Backends without a harmonic model ignore this.
    fn load_harmonics(&mut self, _harmonics: &HarmonicSet) {}

    /// Rewind the timeline to zero
    fn reset(&mut self);

    /// Generate the next sample
    fn generate(&mut self) -> f32;
}
