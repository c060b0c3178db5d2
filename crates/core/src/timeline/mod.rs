use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Wall-clock time between consecutive frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameTimer {
    last: Option<Instant>,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Seconds since the previous tick; the first tick reports zero.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let elapsed = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        elapsed
    }
}

/// Monotonic clock advanced by frame deltas.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f32,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f32) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }
}

/// Keyframed animation bundled with a model. Only the timing is tracked here;
/// evaluating tracks against the hierarchy belongs to the scene-graph library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub duration_seconds: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration_seconds: f32) -> Self {
        Self {
            name: name.into(),
            duration_seconds,
        }
    }
}

/// Looping playback state of one clip inside an [`AnimationDriver`].
#[derive(Debug, Clone)]
pub struct ClipAction {
    clip: AnimationClip,
    clock: PlaybackClock,
    playing: bool,
}

impl ClipAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            clock: PlaybackClock::default(),
            playing: false,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// Local time inside the clip, wrapped at the clip duration.
    pub fn time(&self) -> f32 {
        self.clock.time_seconds
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn advance(&mut self, delta: f32) {
        if !self.playing {
            return;
        }
        self.clock.advance(delta);
        let duration = self.clip.duration_seconds;
        if duration <= f32::EPSILON {
            self.clock.reset();
        } else {
            self.clock.time_seconds %= duration;
        }
    }
}

/// Mixer bound to one loaded hierarchy. Owns one action per bundled clip.
#[derive(Debug, Clone, Default)]
pub struct AnimationDriver {
    actions: Vec<ClipAction>,
    stopped: bool,
}

impl AnimationDriver {
    pub fn new(clips: Vec<AnimationClip>) -> Self {
        Self {
            actions: clips.into_iter().map(ClipAction::new).collect(),
            stopped: false,
        }
    }

    /// Starts every clip in continuous looping playback.
    pub fn play_all(&mut self) {
        for action in &mut self.actions {
            action.playing = true;
        }
        self.stopped = false;
    }

    /// Advances all playing clips by the frame's elapsed time.
    pub fn update(&mut self, delta_seconds: f32) {
        if self.stopped {
            return;
        }
        for action in &mut self.actions {
            action.advance(delta_seconds);
        }
    }

    /// Halts all playback permanently; later updates are ignored.
    pub fn stop(&mut self) {
        for action in &mut self.actions {
            action.playing = false;
        }
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }
}
