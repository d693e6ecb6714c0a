//! Click-free volume transitions
//!
//! Fade requests arrive in seconds and are converted to a whole number of
//! samples, so progress is frame-exact no matter how the host slices its
//! buffers. Each sample the level follows a smoothstep curve between the
//! trajectory's start and target:
//!
//! ```text
//! level(n) = start + (target - start) * s(n / total),  s(t) = t^2 (3 - 2t)
//! ```
//!
//! A new request always starts from the level of the last emitted sample, so
//! interrupting a fade never jumps. A forced fade-out can carry a
//! [`PendingAction`] that becomes due, exactly once, when silence is reached.

/// Level at or below which the output counts as silent
pub const SILENCE_EPSILON: f32 = 1e-4;

/// Convert a fade length in seconds to samples.
///
/// Returns 0 for immediate changes (non-positive or NaN seconds), otherwise a
/// value in `1..=max_samples`.
pub fn fade_samples(seconds: f32, sample_rate: f32, max_samples: u32) -> u32 {
    if !(seconds > 0.0) || sample_rate <= 0.0 {
        return 0;
    }
    let samples = (seconds as f64 * sample_rate as f64).round();
    samples.clamp(1.0, max_samples.max(1) as f64) as u32
}

/// Smoothstep easing, `t` clamped to 0-1
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Fine-grained fade state seen by the audio thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    Idle,
    FadingIn,
    FadingOut,
}

/// Start and target of one fade, measured in samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeTrajectory {
    pub start: f32,
    pub target: f32,
    pub total: u32,
    pub elapsed: u32,
}

impl FadeTrajectory {
    pub fn new(start: f32, target: f32, total: u32) -> Self {
        Self {
            start,
            target,
            total: total.max(1),
            elapsed: 0,
        }
    }

    /// A finished trajectory resting at `level`
    pub fn settled(level: f32) -> Self {
        Self {
            start: level,
            target: level,
            total: 1,
            elapsed: 1,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.total
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.elapsed)
    }

    /// Level at the current `elapsed` position
    pub fn level(&self) -> f32 {
        if self.is_complete() {
            return self.target;
        }
        let t = self.elapsed as f64 / self.total as f64;
        let start = self.start as f64;
        let target = self.target as f64;
        let level = start + (target - start) * smoothstep(t);
        (level as f32).clamp(self.start.min(self.target), self.start.max(self.target))
    }
}

/// Work deferred until a forced fade-out reaches silence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingAction {
    /// Restart playback from a reset timeline
    Play { target: f32, fade_samples: u32 },
    /// Reset the timeline with a new frequency, then fade back in
    Retune { resume: f32, fade_samples: u32 },
    /// Finish stopping: halt generation and reset the timeline
    Stop,
    /// Halt generation without touching the timeline
    Pause,
}

/// Emitted by [`Transition::next_level`] when a fade ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionEvent {
    /// A fade reached its target
    Settled { from: FadeState, level: f32 },
    /// A forced fade-out reached silence and its action is now due
    Deferred(PendingAction),
}

/// Per-sample volume state machine
#[derive(Debug, Clone)]
pub struct Transition {
    state: FadeState,
    level: f32,
    trajectory: FadeTrajectory,
    pending: Option<PendingAction>,
}

impl Transition {
    pub fn new(level: f32) -> Self {
        Self {
            state: FadeState::Idle,
            level,
            trajectory: FadeTrajectory::settled(level),
            pending: None,
        }
    }

    /// Level of the most recent sample
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn state(&self) -> FadeState {
        self.state
    }

    pub fn trajectory(&self) -> &FadeTrajectory {
        &self.trajectory
    }

    pub fn pending(&self) -> Option<PendingAction> {
        self.pending
    }

    pub fn is_active(&self) -> bool {
        self.state != FadeState::Idle
    }

    pub fn is_silent(&self) -> bool {
        self.level <= SILENCE_EPSILON
    }

    /// Drop all fade bookkeeping and rest at zero
    pub fn reset(&mut self) {
        self.state = FadeState::Idle;
        self.level = 0.0;
        self.trajectory = FadeTrajectory::settled(0.0);
        self.pending = None;
    }

    /// Set the level immediately, ending any fade. A pending action is kept.
    pub fn jump_to(&mut self, level: f32) {
        self.state = FadeState::Idle;
        self.level = level;
        self.trajectory = FadeTrajectory::settled(level);
    }

    /// Fade from the current level to `target` over `samples`.
    ///
    /// Zero samples, or a target equal to the current level, settles at once
    /// and returns the event immediately.
    pub fn fade_to(&mut self, target: f32, samples: u32) -> Option<TransitionEvent> {
        let from = self.state;
        if samples == 0 || target == self.level {
            self.jump_to(target);
            return Some(TransitionEvent::Settled { from, level: target });
        }

        self.trajectory = FadeTrajectory::new(self.level, target, samples);
        self.state = if target > self.level {
            FadeState::FadingIn
        } else {
            FadeState::FadingOut
        };
        None
    }

    /// Point the running fade at a new target over its remaining samples
    pub fn retarget(&mut self, target: f32) -> Option<TransitionEvent> {
        let remaining = if self.is_active() {
            self.trajectory.remaining().max(1)
        } else {
            0
        };
        self.fade_to(target, remaining)
    }

    /// Fade to silence, then hand back `action`.
    ///
    /// An ongoing fade to silence that would finish sooner keeps its pace.
    /// When already silent the action is returned right away.
    pub fn fade_out_then(&mut self, samples: u32, action: PendingAction) -> Option<TransitionEvent> {
        if self.is_silent() {
            self.jump_to(0.0);
            self.pending = None;
            return Some(TransitionEvent::Deferred(action));
        }

        let fading_to_silence = self.state == FadeState::FadingOut
            && self.trajectory.target <= SILENCE_EPSILON;
        let samples = if fading_to_silence {
            samples.max(1).min(self.trajectory.remaining().max(1))
        } else {
            samples.max(1)
        };

        self.trajectory = FadeTrajectory::new(self.level, 0.0, samples);
        self.state = FadeState::FadingOut;
        self.pending = Some(action);
        None
    }

    /// Replace the deferred action of the running fade-out
    pub fn defer(&mut self, action: PendingAction) {
        if self.pending.is_some() {
            self.pending = Some(action);
        }
    }

    /// Advance one sample and return its level
    pub fn next_level(&mut self) -> (f32, Option<TransitionEvent>) {
        if self.state == FadeState::Idle {
            return (self.level, None);
        }

        self.trajectory.elapsed = self.trajectory.elapsed.saturating_add(1);
        self.level = self.trajectory.level();

        if self.trajectory.is_complete() || self.level == self.trajectory.target {
            let from = self.state;
            // Snap onto the exact target to shed rounding error
            self.jump_to(self.trajectory.target);

            let event = match self.pending.take() {
                Some(action) => TransitionEvent::Deferred(action),
                None => TransitionEvent::Settled {
                    from,
                    level: self.level,
                },
            };
            return (self.level, Some(event));
        }

        (self.level, None)
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::new(0.0)
    }
}
