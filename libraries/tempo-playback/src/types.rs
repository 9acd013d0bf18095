//! Core types for playback management

use crate::error::AudioError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempo_core::Track;

/// Volume used when the settings store has no value
pub const DEFAULT_VOLUME: u8 = 30;

/// Navigation state of the player
///
/// Owned by the navigation engine; every other component works on snapshots.
/// `current_track_index` is either `None` or points at a playable track of the
/// engine's current list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Index into the track list (`None` = nothing selected)
    pub current_track_index: Option<usize>,

    /// Whether the user wants audio to be playing
    pub is_playing: bool,

    /// Traverse the list in shuffle order
    pub is_shuffled: bool,

    /// Wrap around at either end of the list
    pub is_looped: bool,

    /// Seed of the shuffle order; changing it forces a reshuffle
    pub shuffle_key: String,
}

/// Observable state of the audio controller
#[derive(Debug, Clone, PartialEq)]
pub struct AudioState {
    /// A source is assigned and has not become playable yet
    pub is_loading: bool,

    /// The source can be played
    pub is_ready: bool,

    /// Audio is audibly playing
    pub is_playing: bool,

    /// Source duration in seconds (0 until known)
    pub duration: f64,

    /// Playback position in seconds
    pub current_time: f64,

    /// Volume (0-100)
    pub volume: u8,

    /// Last failure of the current source
    pub error: Option<AudioError>,
}

impl Default for AudioState {
    fn default() -> Self {
        Self {
            is_loading: false,
            is_ready: false,
            is_playing: false,
            duration: 0.0,
            current_time: 0.0,
            volume: 100,
            error: None,
        }
    }
}

impl AudioState {
    /// Fresh state for a newly assigned source
    ///
    /// Everything is reset except the volume, and `is_loading` is set.
    pub fn loading(volume: u8) -> Self {
        Self {
            is_loading: true,
            volume,
            ..Self::default()
        }
    }

    /// `loadstart`: is_loading = true, is_ready = false
    pub fn mark_loading(&mut self) {
        self.is_loading = true;
        self.is_ready = false;
    }

    /// `canplay`: is_loading = false, is_ready = true
    pub fn mark_ready(&mut self) {
        self.is_loading = false;
        self.is_ready = true;
    }

    /// is_playing = `playing`
    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    /// current_time = `seconds`
    pub fn set_position(&mut self, seconds: f64) {
        self.current_time = seconds;
    }

    /// duration = `seconds` (non-finite values read as 0)
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = if seconds.is_finite() { seconds } else { 0.0 };
    }

    /// volume = `volume`
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
    }

    /// Load or stream failure: not loading, not ready, not playing, error set
    pub fn fail(&mut self, error: AudioError) {
        self.is_loading = false;
        self.is_ready = false;
        self.is_playing = false;
        self.error = Some(error);
    }

    /// Rejected play request: not playing, error set; the source stays ready
    pub fn reject(&mut self, error: AudioError) {
        self.is_playing = false;
        self.error = Some(error);
    }
}

/// What the audio controller needs to load a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub name: String,
    pub url: String,
}

impl TrackInfo {
    /// Build from a catalog track; `None` when the track has no preview
    pub fn from_track(track: &Track) -> Option<Self> {
        track.playable_url().map(|url| Self {
            name: track.name.clone(),
            url: url.to_string(),
        })
    }
}

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// User-visible message; a new notice replaces the previous one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
        }
    }
}

/// Configuration for the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Volume when nothing is stored (0-100, default: 30)
    #[serde(default = "default_volume")]
    pub default_volume: u8,

    /// Give up on a source that is not playable after this long
    /// (default: 30000 ms, `None` or 0 waits forever)
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: Option<u64>,

    /// Consecutive failures before playback is abandoned
    /// (default: `None` = number of tracks in the list)
    #[serde(default)]
    pub max_consecutive_failures: Option<usize>,
}

impl PlaybackConfig {
    /// Load timeout as a duration
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

fn default_volume() -> u8 {
    DEFAULT_VOLUME
}

#[allow(clippy::unnecessary_wraps)]
fn default_load_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            load_timeout_ms: default_load_timeout_ms(),
            max_consecutive_failures: None,
        }
    }
}
