//! Tempo - Playback Engine
//!
//! Platform-agnostic playback core for the Tempo player.
//!
//! This crate provides:
//! - Seeded, reproducible shuffle order
//! - An audio controller driving one media element (load, play, pause, seek, volume)
//! - A track navigation engine (next/previous playable track, shuffle, loop)
//! - The [`Player`] orchestrator tying both together
//! - A settings store for the persisted volume
//!
//! # Architecture
//!
//! The platform supplies a [`MediaElement`] (browser audio tag, native player,
//! simulated element) and a [`SettingsStore`]. Everything else runs on Tokio:
//!
//! ```text
//! UI ──commands──> Player task ──> TrackNavigator (player state, current track)
//!                      │
//!                      └─────────> AudioController ──> MediaElement
//!                                        ▲                  │
//!                                        └────signals───────┘
//! ```
//!
//! State flows back out through `tokio::sync::watch` receivers: player state,
//! current track, audio progress, volume and the active notice.
//!
//! # Example: Shuffle Order
//!
//! ```rust
//! use tempo_playback::shuffled_indices;
//!
//! assert_eq!(shuffled_indices(5, "abc"), vec![0, 4, 3, 1, 2]);
//! ```

mod audio;
mod error;
mod media;
mod navigation;
mod player;
pub mod settings;
mod shuffle;
pub mod types;

#[cfg(test)]
mod testing;

// Public exports
pub use audio::{AudioController, Completion, ControllerEvent, PlaybackCommand};
pub use error::{AudioError, PlayerError, Result, SettingsError};
pub use media::{MediaElement, MediaEvent, MediaSignal, SourceId};
pub use navigation::TrackNavigator;
pub use player::{Player, END_OF_PLAYLIST, NO_PLAYABLE_TRACKS, NO_PREVIOUS_TRACK, PLAYBACK_ABANDONED};
pub use settings::{
    JsonFileSettings, MemorySettings, SettingChange, SettingsStore, SettingsWatcher, SETTING_VOLUME,
};
pub use shuffle::{generate_shuffle_key, hash_seed, shuffled_indices, SeededRandom};
pub use types::{AudioState, Notice, PlaybackConfig, PlayerState, Severity, TrackInfo, DEFAULT_VOLUME};
