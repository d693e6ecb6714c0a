//! Control-thread side of the engine
//!
//! The [`Controller`] writes targets into [`SharedParams`], queues transport
//! requests for the audio thread and tracks the coarse playback state. It is
//! meant to be driven from an application loop: call [`Controller::tick`]
//! regularly so finished fades are picked up and stuck ones are recovered.

use rtrb::Producer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::params::{Command, SharedParams};
use crate::config::TransitionConfig;
use crate::presets::PresetCatalog;
use crate::synth::{Harmonic, HarmonicSet, MAX_HARMONICS, MIN_BASE_FREQUENCY, MIN_PITCH_FACTOR};

/// Playback state as seen by the control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    /// A fade is running; see [`Controller::settles_to`]
    Transitioning,
}

/// Bookkeeping for an outstanding fade
#[derive(Debug, Clone, Copy)]
struct PendingFade {
    started: Instant,
    expected: Duration,
    settles_to: PlaybackState,
}

/// Control handle for an [`Engine`](super::Engine)
pub struct Controller {
    shared: Arc<SharedParams>,
    commands: Producer<Command>,
    timing: TransitionConfig,
    state: PlaybackState,
    fade: Option<PendingFade>,
    /// Transport commands queued so far
    sent: u32,
}

impl Controller {
    pub(super) fn new(
        shared: Arc<SharedParams>,
        commands: Producer<Command>,
        timing: TransitionConfig,
    ) -> Self {
        Self {
            shared,
            commands,
            timing,
            state: PlaybackState::Stopped,
            fade: None,
            sent: 0,
        }
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// State the running fade will settle into, if any
    pub fn settles_to(&self) -> Option<PlaybackState> {
        self.fade.map(|fade| fade.settles_to)
    }

    /// Playing or transitioning
    pub fn is_playing(&self) -> bool {
        self.state != PlaybackState::Stopped
    }

    /// Whether the audio side has been prepared
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Start playback immediately
    pub fn play(&mut self) {
        self.play_smooth(0.0);
    }

    /// Start playback with a fade-in.
    ///
    /// If sound is already playing it is quickly faded out first and the
    /// timeline restarts from zero.
    pub fn play_smooth(&mut self, fade_seconds: f32) {
        if !self.ready("play") {
            return;
        }
        let fade_seconds = sanitize_seconds(fade_seconds);
        if !self.send_transport(Command::Play { fade_seconds }) {
            return;
        }

        if fade_seconds == 0.0 && self.state == PlaybackState::Stopped {
            self.settle(PlaybackState::Playing);
            return;
        }

        let mut expected = self.fade_duration(fade_seconds);
        if self.state != PlaybackState::Stopped {
            expected += self.fade_duration(self.timing.quick_fade_seconds);
        }
        self.begin(PlaybackState::Playing, expected);
    }

    /// Quickly fade to silence without rewinding the timeline
    pub fn pause(&mut self) {
        if !self.ready("pause") || self.state == PlaybackState::Stopped {
            return;
        }
        if self.send_transport(Command::Pause) {
            let expected = self.fade_duration(self.timing.quick_fade_seconds);
            self.begin(PlaybackState::Stopped, expected);
        }
    }

    /// Stop immediately and rewind the timeline
    pub fn stop(&mut self) {
        if !self.ready("stop") {
            return;
        }
        if self.send_transport(Command::Stop { fade_seconds: 0.0 }) {
            self.settle(PlaybackState::Stopped);
        }
    }

    /// Fade out and then stop
    pub fn stop_smooth(&mut self, fade_seconds: f32) {
        let fade_seconds = sanitize_seconds(fade_seconds);
        if fade_seconds == 0.0 || self.state == PlaybackState::Stopped {
            self.stop();
            return;
        }
        if !self.ready("stop") {
            return;
        }
        if self.send_transport(Command::Stop { fade_seconds }) {
            let expected = self.fade_duration(fade_seconds);
            self.begin(PlaybackState::Stopped, expected);
        }
    }

    /// Set the playback volume (0-1); the engine fades to it briefly
    pub fn set_normalized_volume(&mut self, volume: f32) {
        if !self.ready("set volume") || volume.is_nan() {
            return;
        }
        self.shared.volume.store(volume.clamp(0.0, 1.0));
    }

    /// Set the playback volume and fade to it over `fade_seconds`
    pub fn set_volume_smooth(&mut self, volume: f32, fade_seconds: f32) {
        if !self.ready("set volume") || volume.is_nan() {
            return;
        }
        self.shared.volume.store(volume.clamp(0.0, 1.0));

        let heading_to_playing = self.state == PlaybackState::Playing
            || self.settles_to() == Some(PlaybackState::Playing);
        if !heading_to_playing {
            return;
        }

        let fade_seconds = sanitize_seconds(fade_seconds);
        if self.send_transport(Command::Volume { fade_seconds }) && self.state == PlaybackState::Playing {
            let expected = self.fade_duration(fade_seconds);
            self.begin(PlaybackState::Playing, expected);
        }
    }

    /// Set the pitch multiplier; floored at 0.01
    pub fn set_pitch_factor(&mut self, pitch: f32) {
        if !self.ready("set pitch") || pitch.is_nan() {
            return;
        }
        self.shared.pitch.store(pitch.max(MIN_PITCH_FACTOR));
    }

    /// Set the base frequency in Hz; floored at 20 Hz
    pub fn set_base_frequency(&mut self, hz: f32) {
        if !self.ready("set base frequency") || hz.is_nan() {
            return;
        }
        self.shared.base_frequency.store(hz.max(MIN_BASE_FREQUENCY));
    }

    pub fn set_low_pass_enabled(&mut self, enabled: bool) {
        if self.ready("set low-pass") {
            SharedParams::set_flag(&self.shared.low_pass_enabled, enabled);
        }
    }

    /// Set a fixed normalized cutoff (0-1). The cutoff stops tracking volume.
    pub fn set_low_pass_cutoff(&mut self, normalized: f32) {
        if !self.ready("set cutoff") || normalized.is_nan() {
            return;
        }
        self.shared.low_pass_cutoff.store(normalized.clamp(0.0, 1.0));
        SharedParams::set_flag(&self.shared.low_pass_manual, true);
    }

    /// Let the cutoff follow the output level again
    pub fn track_volume_cutoff(&mut self) {
        if self.ready("set cutoff") {
            SharedParams::set_flag(&self.shared.low_pass_manual, false);
        }
    }

    pub fn set_reverb_enabled(&mut self, enabled: bool) {
        if self.ready("set reverb") {
            SharedParams::set_flag(&self.shared.reverb_enabled, enabled);
        }
    }

    /// Wet/dry mix (0-1)
    pub fn set_reverb_amount(&mut self, amount: f32) {
        if !self.ready("set reverb amount") || amount.is_nan() {
            return;
        }
        self.shared.reverb_amount.store(amount.clamp(0.0, 1.0));
    }

    /// Feedback gain (0-1)
    pub fn set_reverb_decay(&mut self, decay: f32) {
        if !self.ready("set reverb decay") || decay.is_nan() {
            return;
        }
        self.shared.reverb_decay.store(decay.clamp(0.0, 1.0));
    }

    /// Replace the harmonic set; extra partials beyond the capacity are dropped
    pub fn load_harmonics(&mut self, harmonics: &[Harmonic]) {
        if !self.ready("load harmonics") {
            return;
        }
        if harmonics.len() > MAX_HARMONICS {
            log::warn!(
                "Keeping the first {} of {} harmonics",
                MAX_HARMONICS,
                harmonics.len()
            );
        }
        self.send(Command::LoadHarmonics(HarmonicSet::from_slice(harmonics)));
    }

    /// Load a preset by name. Unknown presets load silence.
    pub fn load_preset(&mut self, catalog: &dyn PresetCatalog, preset: &str) {
        let harmonics = catalog.harmonics(preset);
        if harmonics.is_empty() {
            log::warn!("Unknown or empty preset '{}'", preset);
        } else {
            log::debug!("Loading preset '{}' ({} harmonics)", preset, harmonics.len());
        }
        self.load_harmonics(&harmonics);
    }

    /// Pick up finished fades and recover from stuck transitions
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// [`Controller::tick`] with an explicit clock
    pub fn tick_at(&mut self, now: Instant) {
        let completed = self.shared.take_fade_complete();
        let Some(fade) = self.fade else {
            return;
        };

        if completed && self.shared.completed_request.load(Ordering::Acquire) == self.sent {
            log::debug!("Transition settled to {:?}", fade.settles_to);
            self.settle(fade.settles_to);
            return;
        }

        let limit = fade.expected + self.fade_duration(self.timing.failsafe_grace_seconds);
        if now.saturating_duration_since(fade.started) > limit {
            log::warn!(
                "Transition did not finish within {:?}; forcing stop",
                limit
            );
            // A full queue keeps the fade so the next tick retries
            if self.send_transport(Command::Stop { fade_seconds: 0.0 }) {
                self.settle(PlaybackState::Stopped);
            }
        }
    }

    fn ready(&self, operation: &str) -> bool {
        let ready = self.shared.is_ready();
        if !ready {
            log::debug!("Ignoring {}: engine not prepared", operation);
        }
        ready
    }

    fn send(&mut self, command: Command) -> bool {
        match self.commands.push(command) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Command queue full, dropping {:?}", command);
                false
            }
        }
    }

    /// Queue a command whose completion the audio side reports
    fn send_transport(&mut self, command: Command) -> bool {
        // Cleared before the push so audio can settle the new request at once
        let earlier = self.shared.take_fade_complete();
        if !self.send(command) {
            if earlier {
                self.shared.signal_fade_complete();
            }
            return false;
        }
        self.sent = self.sent.wrapping_add(1);
        true
    }

    fn begin(&mut self, settles_to: PlaybackState, expected: Duration) {
        self.state = PlaybackState::Transitioning;
        self.fade = Some(PendingFade {
            started: Instant::now(),
            expected,
            settles_to,
        });
    }

    fn settle(&mut self, state: PlaybackState) {
        self.state = state;
        self.fade = None;
    }

    fn fade_duration(&self, seconds: f32) -> Duration {
        let max = sanitize_seconds(self.timing.max_fade_seconds);
        Duration::from_secs_f32(sanitize_seconds(seconds).min(max))
    }
}

fn sanitize_seconds(seconds: f32) -> f32 {
    if seconds > 0.0 && seconds.is_finite() {
        seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::BuiltinPresets;
    use rtrb::{Consumer, RingBuffer};

    fn controller(ready: bool) -> (Controller, Consumer<Command>, Arc<SharedParams>) {
        let shared = Arc::new(SharedParams::new(&Default::default()));
        if ready {
            shared.sample_rate.store(48000.0);
        }
        let (producer, consumer) = RingBuffer::new(8);
        let controller = Controller::new(shared.clone(), producer, TransitionConfig::default());
        (controller, consumer, shared)
    }

    fn drain(consumer: &mut Consumer<Command>) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Ok(command) = consumer.pop() {
            commands.push(command);
        }
        commands
    }

    /// Pretend the audio side finished the latest request
    fn complete(controller: &Controller, shared: &SharedParams) {
        shared.complete_request(controller.sent);
    }

    #[test]
    fn test_calls_before_prepare_are_ignored() {
        let (mut controller, mut consumer, shared) = controller(false);
        let volume = shared.volume.load();

        controller.play_smooth(1.0);
        controller.set_normalized_volume(0.1);
        controller.set_pitch_factor(2.0);
        controller.load_preset(&BuiltinPresets, "sine");

        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(shared.volume.load(), volume);
        assert_eq!(shared.pitch.load(), 1.0);
        assert!(drain(&mut consumer).is_empty());
    }

    #[test]
    fn test_immediate_play_and_stop() {
        let (mut controller, mut consumer, _) = controller(true);
        controller.play();
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert!(controller.is_playing());

        controller.stop();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.is_playing());

        assert_eq!(
            drain(&mut consumer),
            vec![
                Command::Play { fade_seconds: 0.0 },
                Command::Stop { fade_seconds: 0.0 }
            ]
        );
    }

    #[test]
    fn test_smooth_play_settles_on_completion() {
        let (mut controller, _consumer, shared) = controller(true);
        controller.play_smooth(0.5);
        assert_eq!(controller.state(), PlaybackState::Transitioning);
        assert_eq!(controller.settles_to(), Some(PlaybackState::Playing));
        assert!(controller.is_playing());

        controller.tick();
        assert_eq!(controller.state(), PlaybackState::Transitioning);

        complete(&controller, &shared);
        controller.tick();
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert!(!shared.fade_complete.load(Ordering::Relaxed));
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let (mut controller, _consumer, shared) = controller(true);
        controller.play_smooth(0.5);
        complete(&controller, &shared);
        controller.stop_smooth(0.5);

        // A completion for the fade-in arriving after the stop was queued
        shared.complete_request(controller.sent - 1);

        controller.tick();
        assert_eq!(controller.state(), PlaybackState::Transitioning);
        assert_eq!(controller.settles_to(), Some(PlaybackState::Stopped));

        complete(&controller, &shared);
        controller.tick();
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_failsafe_forces_stop() {
        let (mut controller, mut consumer, _) = controller(true);
        controller.play_smooth(1.0);
        drain(&mut consumer);

        let started = controller.fade.unwrap().started;
        controller.tick_at(started + Duration::from_millis(1200));
        assert_eq!(controller.state(), PlaybackState::Transitioning);

        controller.tick_at(started + Duration::from_millis(1600));
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(
            drain(&mut consumer),
            vec![Command::Stop { fade_seconds: 0.0 }]
        );
    }

    #[test]
    fn test_failsafe_retries_when_queue_full() {
        let (mut controller, mut consumer, _) = controller(true);
        controller.play_smooth(1.0);
        for _ in 0..7 {
            controller.load_harmonics(&[Harmonic::new(1, 1.0)]);
        }

        let started = controller.fade.unwrap().started;
        controller.tick_at(started + Duration::from_secs(2));
        assert_eq!(controller.state(), PlaybackState::Transitioning);
        assert_eq!(controller.settles_to(), Some(PlaybackState::Playing));

        drain(&mut consumer);
        controller.tick_at(started + Duration::from_secs(3));
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(
            drain(&mut consumer),
            vec![Command::Stop { fade_seconds: 0.0 }]
        );
    }

    #[test]
    fn test_instant_volume_fade_settles() {
        let (mut controller, mut consumer, shared) = controller(true);
        controller.play();

        // A zero-length fade settles in the same buffer that pops it
        controller.set_volume_smooth(0.0, 0.0);
        assert_eq!(drain(&mut consumer).last(), Some(&Command::Volume { fade_seconds: 0.0 }));
        complete(&controller, &shared);

        controller.tick();
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_failed_send_keeps_earlier_completion() {
        let (mut controller, _consumer, shared) = controller(true);
        controller.play_smooth(0.5);
        complete(&controller, &shared);
        for _ in 0..7 {
            controller.load_harmonics(&[Harmonic::new(1, 1.0)]);
        }

        controller.stop_smooth(0.5);
        assert!(shared.fade_complete.load(Ordering::Relaxed));
        controller.tick();
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_pause_only_when_playing() {
        let (mut controller, mut consumer, shared) = controller(true);
        controller.pause();
        assert!(drain(&mut consumer).is_empty());

        controller.play();
        controller.pause();
        assert_eq!(controller.settles_to(), Some(PlaybackState::Stopped));
        complete(&controller, &shared);
        controller.tick();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(drain(&mut consumer).last(), Some(&Command::Pause));
    }

    #[test]
    fn test_volume_clamped_and_state_unchanged() {
        let (mut controller, mut consumer, shared) = controller(true);
        controller.set_normalized_volume(1.7);
        assert_eq!(shared.volume.load(), 1.0);
        controller.set_normalized_volume(-0.2);
        assert_eq!(shared.volume.load(), 0.0);
        assert_eq!(controller.state(), PlaybackState::Stopped);

        // Smooth volume changes only queue while playing
        controller.set_volume_smooth(0.5, 1.0);
        assert!(drain(&mut consumer).is_empty());

        controller.play();
        controller.set_volume_smooth(0.3, 1.0);
        assert_eq!(controller.state(), PlaybackState::Transitioning);
        assert_eq!(controller.settles_to(), Some(PlaybackState::Playing));
        assert_eq!(
            drain(&mut consumer).last(),
            Some(&Command::Volume { fade_seconds: 1.0 })
        );
    }

    #[test]
    fn test_parameter_floors() {
        let (mut controller, _consumer, shared) = controller(true);
        controller.set_pitch_factor(-1.0);
        assert_eq!(shared.pitch.load(), MIN_PITCH_FACTOR);
        controller.set_pitch_factor(f32::NAN);
        assert_eq!(shared.pitch.load(), MIN_PITCH_FACTOR);

        controller.set_base_frequency(0.0);
        assert_eq!(shared.base_frequency.load(), MIN_BASE_FREQUENCY);

        controller.set_low_pass_cutoff(4.0);
        assert_eq!(shared.low_pass_cutoff.load(), 1.0);
        assert!(SharedParams::flag(&shared.low_pass_manual));
        controller.track_volume_cutoff();
        assert!(!SharedParams::flag(&shared.low_pass_manual));

        controller.set_reverb_amount(2.0);
        controller.set_reverb_decay(-1.0);
        assert_eq!(shared.reverb_amount.load(), 1.0);
        assert_eq!(shared.reverb_decay.load(), 0.0);
    }

    #[test]
    fn test_full_queue_leaves_state_unchanged() {
        let (mut controller, _consumer, _) = controller(true);
        for _ in 0..8 {
            controller.load_harmonics(&[Harmonic::new(1, 1.0)]);
        }
        controller.play_smooth(1.0);
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_unknown_preset_loads_silence() {
        let (mut controller, mut consumer, _) = controller(true);
        controller.load_preset(&BuiltinPresets, "nope");
        match drain(&mut consumer).as_slice() {
            [Command::LoadHarmonics(set)] => assert!(set.is_empty()),
            other => panic!("unexpected commands {:?}", other),
        }
    }
}
