//! Error types for playback management

use thiserror::Error;

/// Audio controller errors
///
/// `Load` and `Playback` are real failures and make the player skip ahead.
/// The remaining variants describe requests that were overtaken by newer ones
/// or by teardown and are not failures of the track itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// Resource failed before becoming playable
    #[error("Failed to load audio for {track}: {reason}")]
    Load { track: String, reason: String },

    /// Play request rejected after load
    #[error("Playback rejected for {track}: {reason}")]
    Playback { track: String, reason: String },

    /// A newer `setup_audio` replaced the request
    #[error("Superseded by a newer audio source")]
    Superseded,

    /// Nothing has been loaded yet
    #[error("No audio source loaded")]
    NoSource,

    /// Controller has been destroyed
    #[error("Audio controller destroyed")]
    Destroyed,
}

impl AudioError {
    /// True for errors that belong to the track (load or playback failure)
    pub fn is_track_failure(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Playback { .. })
    }
}

/// Settings store errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not a JSON object of strings
    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings file could not be watched
    #[error("Failed to watch settings file: {0}")]
    Watch(#[from] notify::Error),
}

/// Player errors
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The player task is no longer running
    #[error("Player has shut down")]
    Closed,
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;
