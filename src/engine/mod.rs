//! Audio engine for Glide
//!
//! [`channel`] splits the engine into a [`Controller`] for the control thread
//! and an [`Engine`] that lives inside the audio callback. Every frame runs
//! the same fixed chain:
//!
//! ```text
//! transition level -> source -> low-pass -> reverb -> volume -> clamp -> write
//! ```

mod control;
mod params;
mod player;
mod recorder;

pub use control::{Controller, PlaybackState};
pub use params::{AtomicF32, Command, SharedParams};
pub use player::{default_device_name, list_output_devices, Player};
pub use recorder::Recorder;

use anyhow::{Context, Result};
use rtrb::{Consumer, RingBuffer};
use std::sync::Arc;

use crate::config::{GlideConfig, TransitionConfig};
use crate::presets::PresetCatalog;
use crate::synth::{
    effective_frequency, fade_samples, ClipSource, FadeState, HarmonicOscillator, HarmonicSet,
    LowPassFilter, PendingAction, Reverb, SignalSource, Transition, TransitionEvent,
};

/// Capacity of the control-to-audio command queue
const COMMAND_CAPACITY: usize = 64;

/// Create a connected controller and engine around `source`
pub fn channel(config: &GlideConfig, source: Box<dyn SignalSource>) -> (Controller, Engine) {
    let shared = Arc::new(SharedParams::new(config));
    let (producer, consumer) = RingBuffer::new(COMMAND_CAPACITY);

    let controller = Controller::new(shared.clone(), producer, config.transition.clone());
    let engine = Engine::new(config, shared, consumer, source);
    (controller, engine)
}

/// Build the signal source described by the configuration.
///
/// A configured clip wins over the oscillator. Explicit harmonics win over
/// the preset name.
pub fn build_source(config: &GlideConfig, catalog: &dyn PresetCatalog) -> Result<Box<dyn SignalSource>> {
    if let Some(path) = &config.synth.clip {
        let clip = ClipSource::open(path).with_context(|| format!("failed to load clip {:?}", path))?;
        log::info!("Looping clip {:?} ({} samples)", path, clip.len());
        return Ok(Box::new(clip));
    }

    let harmonics = if config.synth.harmonics.is_empty() {
        let harmonics = catalog.harmonics(&config.synth.preset);
        if harmonics.is_empty() {
            log::warn!("Unknown preset '{}', starting silent", config.synth.preset);
        }
        harmonics
    } else {
        config.synth.harmonics.clone()
    };

    let oscillator = HarmonicOscillator::new(
        HarmonicSet::from_slice(&harmonics),
        effective_frequency(config.synth.base_frequency, config.synth.pitch),
        config.audio.sample_rate as f64,
    );
    Ok(Box::new(oscillator))
}

/// Audio-thread half of the engine
pub struct Engine {
    shared: Arc<SharedParams>,
    commands: Consumer<Command>,
    source: Box<dyn SignalSource>,
    transition: Transition,
    filter: LowPassFilter,
    reverb: Reverb,
    timing: TransitionConfig,
    max_channels: usize,
    sample_rate: f32,
    channels: usize,
    prepared: bool,
    generating: bool,

    // Last targets taken from the shared parameters
    volume: f32,
    volume_bits: u32,
    frequency_bits: (u32, u32),

    /// Transport commands received so far
    received: u32,
    /// A requested fade settled during this buffer
    signal_pending: bool,
}

impl Engine {
    fn new(
        config: &GlideConfig,
        shared: Arc<SharedParams>,
        commands: Consumer<Command>,
        source: Box<dyn SignalSource>,
    ) -> Self {
        let filter = LowPassFilter::new(
            config.filter.range(),
            config.filter.cutoff,
            config.filter.smoothing,
        );
        let volume_bits = shared.volume.bits();
        let frequency_bits = (shared.base_frequency.bits(), shared.pitch.bits());

        Self {
            commands,
            source,
            transition: Transition::default(),
            filter,
            reverb: Reverb::new(config.reverb.settings()),
            timing: config.transition.clone(),
            max_channels: config.audio.max_channels.max(1) as usize,
            sample_rate: 0.0,
            channels: 0,
            prepared: false,
            generating: false,
            volume: f32::from_bits(volume_bits),
            volume_bits,
            frequency_bits,
            received: 0,
            signal_pending: false,
            shared,
        }
    }

    /// Size all state for a sample rate and channel count.
    ///
    /// Allocates; call before the stream starts. Controller calls take
    /// effect only after this has run.
    pub fn prepare(&mut self, sample_rate: f32, channels: usize) {
        let channels = channels.max(1);
        let max_channels = self.max_channels.max(channels);

        self.sample_rate = sample_rate;
        self.channels = channels;
        self.filter.configure(sample_rate, channels, max_channels);
        self.reverb.configure(sample_rate, max_channels);
        self.reverb.set_channels(channels);
        self.source.set_sample_rate(sample_rate as f64);

        self.sync_params();
        self.restart_phase();
        let cutoff = self.cutoff_target();
        self.filter.set_target_cutoff(cutoff);
        self.filter.snap_cutoff();
        self.reverb.snap();

        self.prepared = true;
        self.shared.sample_rate.store(sample_rate);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Level applied to the most recent frame
    pub fn level(&self) -> f32 {
        self.transition.level()
    }

    pub fn fade_state(&self) -> FadeState {
        self.transition.state()
    }

    /// Whether the source is currently being run
    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Fill an interleaved buffer of `channels` channels in place
    pub fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 || buffer.is_empty() {
            return;
        }
        if !self.prepared {
            buffer.fill(0.0);
            return;
        }
        if channels != self.channels {
            self.set_channels(channels);
        }

        self.drain_commands();
        self.sync_params();

        let frames = buffer.len() / channels;
        let cutoff = self.cutoff_target();
        self.filter.set_target_cutoff(cutoff);
        self.filter.update(frames);
        self.reverb.update(frames);

        let mut chunks = buffer.chunks_exact_mut(channels);
        for frame in &mut chunks {
            let (level, event) = self.transition.next_level();
            if let Some(event) = event {
                self.handle_event(event);
            }

            let raw = if self.generating {
                self.source.generate()
            } else {
                0.0
            };

            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = self.filter.process(channel, raw);
            }
            self.reverb.process_frame(frame);

            for sample in frame.iter_mut() {
                let value = *sample * level;
                *sample = if value.is_finite() {
                    value.clamp(-1.0, 1.0)
                } else {
                    0.0
                };
            }
        }
        chunks.into_remainder().fill(0.0);

        if self.signal_pending {
            self.signal_pending = false;
            self.shared.complete_request(self.received);
        }
    }

    /// Reset per-channel state for a new channel layout
    fn set_channels(&mut self, channels: usize) {
        self.filter.set_channels(channels);
        self.reverb.set_channels(channels);
        self.channels = channels;
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            if let Command::LoadHarmonics(harmonics) = command {
                self.source.load_harmonics(&harmonics);
                continue;
            }

            self.received = self.received.wrapping_add(1);
            // A completion from an earlier request in this batch is stale
            self.signal_pending = false;
            self.refresh_volume();

            let event = match command {
                Command::Play { fade_seconds } => self.start_play(fade_seconds),
                Command::Stop { fade_seconds } => self.start_stop(fade_seconds),
                Command::Pause => {
                    let quick = self.quick_samples();
                    self.transition.fade_out_then(quick, PendingAction::Pause)
                }
                Command::Volume { fade_seconds } => {
                    let samples = self.samples(fade_seconds);
                    self.change_volume(samples)
                }
                Command::LoadHarmonics(_) => None,
            };
            if let Some(event) = event {
                self.handle_event(event);
            }
        }
    }

    /// Pick up scalar targets written by the controller
    fn sync_params(&mut self) {
        let shared = Arc::clone(&self.shared);
        self.filter
            .set_enabled(SharedParams::flag(&shared.low_pass_enabled));
        self.reverb
            .set_enabled(SharedParams::flag(&shared.reverb_enabled));
        self.reverb.set_amount(shared.reverb_amount.load());
        self.reverb.set_decay(shared.reverb_decay.load());

        if self.refresh_volume() {
            let samples = self.samples(self.timing.volume_fade_seconds);
            if let Some(event) = self.change_volume(samples) {
                self.handle_event(event);
            }
        }

        let frequency_bits = (shared.base_frequency.bits(), shared.pitch.bits());
        if frequency_bits != self.frequency_bits {
            self.frequency_bits = frequency_bits;
            self.retune();
        }
    }

    /// Take the latest volume target; returns whether it changed
    fn refresh_volume(&mut self) -> bool {
        let bits = self.shared.volume.bits();
        if bits == self.volume_bits {
            return false;
        }
        self.volume_bits = bits;
        let volume = f32::from_bits(bits);
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        }
        true
    }

    fn cutoff_target(&self) -> f32 {
        if SharedParams::flag(&self.shared.low_pass_manual) {
            self.shared.low_pass_cutoff.load()
        } else {
            self.filter.range().from_level(self.transition.level())
        }
    }

    fn start_play(&mut self, fade_seconds: f32) -> Option<TransitionEvent> {
        let samples = self.samples(fade_seconds);
        if self.transition.is_silent() {
            self.transition.reset();
            self.begin_playback();
            return self.transition.fade_to(self.volume, samples);
        }

        // Audible: get to silence before rewinding the timeline
        let action = PendingAction::Play {
            target: self.volume,
            fade_samples: samples,
        };
        let quick = self.quick_samples();
        self.transition.fade_out_then(quick, action)
    }

    fn start_stop(&mut self, fade_seconds: f32) -> Option<TransitionEvent> {
        let samples = self.samples(fade_seconds);
        if samples == 0 {
            self.transition.reset();
            self.finish_stop();
            return None;
        }
        self.transition.fade_out_then(samples, PendingAction::Stop)
    }

    fn change_volume(&mut self, samples: u32) -> Option<TransitionEvent> {
        match self.transition.pending() {
            Some(PendingAction::Play { fade_samples, .. }) => {
                self.transition.defer(PendingAction::Play {
                    target: self.volume,
                    fade_samples,
                });
                None
            }
            Some(PendingAction::Retune { fade_samples, .. }) => {
                self.transition.defer(PendingAction::Retune {
                    resume: self.volume,
                    fade_samples,
                });
                None
            }
            // Stopping or pausing; the value is used by the next play
            Some(_) => None,
            None if !self.generating => None,
            None if self.transition.state() == FadeState::FadingIn => {
                self.transition.retarget(self.volume)
            }
            None => self.transition.fade_to(self.volume, samples),
        }
    }

    /// Apply a base frequency or pitch change
    fn retune(&mut self) {
        if !self.generating || self.transition.pending().is_some() {
            // Picked up by the next phase reset
            return;
        }
        if self.transition.is_silent() {
            self.restart_phase();
            return;
        }

        let quick = self.quick_samples();
        let action = PendingAction::Retune {
            resume: self.volume,
            fade_samples: quick,
        };
        if let Some(event) = self.transition.fade_out_then(quick, action) {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: TransitionEvent) {
        let follow_up = match event {
            TransitionEvent::Settled { .. } => {
                self.signal_pending = true;
                None
            }
            TransitionEvent::Deferred(PendingAction::Play {
                target,
                fade_samples,
            }) => {
                self.begin_playback();
                self.transition.fade_to(target, fade_samples)
            }
            TransitionEvent::Deferred(PendingAction::Retune {
                resume,
                fade_samples,
            }) => {
                self.restart_phase();
                self.transition.fade_to(resume, fade_samples)
            }
            TransitionEvent::Deferred(PendingAction::Stop) => {
                self.finish_stop();
                self.signal_pending = true;
                None
            }
            TransitionEvent::Deferred(PendingAction::Pause) => {
                self.generating = false;
                self.signal_pending = true;
                None
            }
        };

        if let Some(event) = follow_up {
            self.handle_event(event);
        }
    }

    fn begin_playback(&mut self) {
        self.restart_phase();
        self.generating = true;
    }

    fn finish_stop(&mut self) {
        self.generating = false;
        self.restart_phase();
    }

    /// Rewind the source with the latest frequency
    fn restart_phase(&mut self) {
        let (base, pitch) = self.frequency_bits;
        self.source
            .set_frequency(f32::from_bits(base), f32::from_bits(pitch));
        self.source.reset();
    }

    fn samples(&self, seconds: f32) -> u32 {
        let max = fade_samples(self.timing.max_fade_seconds, self.sample_rate, u32::MAX);
        fade_samples(seconds, self.sample_rate, max)
    }

    fn quick_samples(&self) -> u32 {
        self.samples(self.timing.quick_fade_seconds).max(1)
    }
}
