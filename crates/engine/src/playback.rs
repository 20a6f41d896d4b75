//! The playback clock.
//!
//! A small state machine over stopped / playing / paused with two orthogonal
//! flags (previewing, exporting). It never reads a clock itself; callers pass
//! wall-clock milliseconds in, so the same code runs live and under test.

use scenecast_common::config::PlaybackDefaults;
use serde::{Deserialize, Serialize};

/// Play state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What a tick did to the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing.
    Idle,
    Advanced { time: f64 },
    /// Passed the end and wrapped to the overshoot.
    Wrapped { time: f64 },
    /// Reached the end without looping; now paused.
    Finished { time: f64 },
}

impl TickOutcome {
    pub fn time(&self) -> Option<f64> {
        match *self {
            Self::Idle => None,
            Self::Advanced { time } | Self::Wrapped { time } | Self::Finished { time } => Some(time),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: PlaybackState,
    current_time: f64,
    total_duration: f64,
    looping: bool,
    previewing: bool,
    exporting: bool,
    /// Wall-clock reading at the previous tick.
    last_tick_ms: Option<f64>,
}

impl PlaybackClock {
    pub fn new(total_duration: f64, looping: bool) -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_time: 0.0,
            total_duration: sanitize_duration(total_duration),
            looping,
            previewing: false,
            exporting: false,
            last_tick_ms: None,
        }
    }

    pub fn from_config(playback: &PlaybackDefaults) -> Self {
        Self::new(playback.total_duration_ms, playback.looping)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Change the timeline length, pulling the cursor back inside it.
    pub fn set_total_duration(&mut self, total_duration: f64) {
        self.total_duration = sanitize_duration(total_duration);
        self.current_time = self.current_time.min(self.total_duration);
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_previewing(&self) -> bool {
        self.previewing
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    pub fn set_exporting(&mut self, exporting: bool) {
        self.exporting = exporting;
    }

    /// Whether the selection box should be hidden.
    pub fn suppresses_selection(&self) -> bool {
        self.previewing || self.exporting
    }

    /// Start playing. Rewinds first when parked at the end. Returns `false`
    /// if already playing.
    pub fn play(&mut self, now_ms: f64) -> bool {
        if self.is_playing() {
            return false;
        }
        if self.current_time >= self.total_duration {
            self.current_time = 0.0;
        }
        self.state = PlaybackState::Playing;
        self.last_tick_ms = Some(now_ms);
        tracing::debug!(time = self.current_time, "Playback started");
        true
    }

    /// Freeze the cursor. Also ends a preview. Returns `false` if nothing
    /// changed.
    pub fn pause(&mut self) -> bool {
        let was_previewing = std::mem::replace(&mut self.previewing, false);
        self.last_tick_ms = None;
        if self.is_playing() {
            self.state = PlaybackState::Paused;
            tracing::debug!(time = self.current_time, "Playback paused");
            return true;
        }
        was_previewing
    }

    /// Pin the cursor to zero.
    pub fn stop(&mut self) -> bool {
        let changed = self.state != PlaybackState::Stopped || self.current_time != 0.0 || self.previewing;
        self.state = PlaybackState::Stopped;
        self.current_time = 0.0;
        self.previewing = false;
        self.last_tick_ms = None;
        changed
    }

    pub fn toggle(&mut self, now_ms: f64) -> bool {
        if self.is_playing() {
            self.pause()
        } else {
            self.play(now_ms)
        }
    }

    /// Play the timeline once from the start with the selection hidden.
    /// Only allowed while stopped or paused.
    pub fn preview(&mut self, now_ms: f64) -> bool {
        if self.is_playing() {
            return false;
        }
        self.current_time = 0.0;
        self.previewing = true;
        self.play(now_ms)
    }

    /// Move the cursor to `time`, clamped into the timeline. Returns the
    /// time actually applied.
    ///
    /// A stopped clock becomes paused when moved off zero.
    pub fn seek(&mut self, time: f64) -> f64 {
        let clamped = if time.is_nan() {
            0.0
        } else {
            time.clamp(0.0, self.total_duration)
        };
        self.current_time = clamped;
        if self.state == PlaybackState::Stopped && clamped > 0.0 {
            self.state = PlaybackState::Paused;
        }
        clamped
    }

    /// Advance by the wall-clock time since the previous tick.
    pub fn tick(&mut self, now_ms: f64) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Idle;
        }
        let last = self.last_tick_ms.replace(now_ms).unwrap_or(now_ms);
        let delta = (now_ms - last).max(0.0);
        let next = self.current_time + delta;

        if next < self.total_duration {
            self.current_time = next;
            return TickOutcome::Advanced { time: next };
        }

        // A preview plays through once even on a looping timeline.
        if self.looping && !self.previewing {
            self.current_time = next.rem_euclid(self.total_duration);
            tracing::trace!(time = self.current_time, "Playback wrapped");
            return TickOutcome::Wrapped {
                time: self.current_time,
            };
        }

        self.current_time = self.total_duration;
        self.pause();
        TickOutcome::Finished {
            time: self.current_time,
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::from_config(&PlaybackDefaults::default())
    }
}

fn sanitize_duration(total_duration: f64) -> f64 {
    if total_duration.is_finite() && total_duration > 0.0 {
        total_duration
    } else {
        tracing::warn!(total_duration, "Invalid timeline length, using 1 ms");
        1.0
    }
}
