//! Static catalog document
//!
//! The catalog is loaded once at startup and never reloaded. Its layout
//! follows the service's "home" payload: the user, a list of playlist names
//! and the Discover Weekly playlist with its tracks.

use crate::error::{CoreError, Result};
use crate::types::{Image, Track};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub display_name: String,

    #[serde(default)]
    pub images: Vec<Image>,
}

/// Playlist entry shown in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
struct PlaylistList {
    #[serde(default)]
    items: Vec<PlaylistSummary>,
}

/// One row of a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// When the track was added (as written in the catalog)
    #[serde(default)]
    pub added_at: Option<String>,

    pub track: Track,
}

/// Paged track listing of a playlist
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaylistTracks {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,

    /// Total number of tracks on the service (may exceed `items`)
    #[serde(default)]
    pub total: usize,
}

/// Playable playlist
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub images: Vec<Image>,

    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub tracks: PlaylistTracks,
}

/// Complete catalog document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub user: User,

    #[serde(default, rename = "playlists")]
    playlist_list: PlaylistList,

    #[serde(default)]
    pub discover_weekly: Playlist,
}

impl Catalog {
    /// Parse a catalog from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a catalog file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Playlist names for the sidebar
    pub fn playlists(&self) -> &[PlaylistSummary] {
        &self.playlist_list.items
    }

    /// All tracks of the playable playlist, in playlist order
    pub fn tracks(&self) -> Vec<Track> {
        self.discover_weekly
            .tracks
            .items
            .iter()
            .map(|item| item.track.clone())
            .collect()
    }

    /// Tracks that have a preview and can be played
    pub fn playable_tracks(&self) -> Vec<Track> {
        self.discover_weekly
            .tracks
            .items
            .iter()
            .filter(|item| item.track.is_playable())
            .map(|item| item.track.clone())
            .collect()
    }
}
