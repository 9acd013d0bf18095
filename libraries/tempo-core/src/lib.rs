//! Tempo Core
//!
//! Catalog domain types shared by the playback library and the applications.
//!
//! The catalog is a static, in-memory document supplied once at startup: the
//! signed-in user, their playlist names, and one playable playlist whose tracks
//! are handed to the playback engine.
//!
//! # Example
//!
//! ```rust
//! use tempo_core::Catalog;
//!
//! let json = r#"{
//!     "user": { "display_name": "Alice" },
//!     "playlists": { "items": [{ "name": "Morning" }] },
//!     "discover_weekly": {
//!         "name": "Discover Weekly",
//!         "tracks": { "items": [
//!             { "track": { "id": "t1", "name": "Song (Remastered)", "preview_url": "https://cdn/t1.mp3" } },
//!             { "track": { "id": "t2", "name": "Silent" } }
//!         ] }
//!     }
//! }"#;
//!
//! let catalog = Catalog::from_json(json).unwrap();
//! assert_eq!(catalog.tracks().len(), 2);
//! assert_eq!(catalog.playable_tracks().len(), 1);
//! assert_eq!(catalog.tracks()[0].display_name(), "Song");
//! ```

#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod types;

pub use catalog::{Catalog, Playlist, PlaylistItem, PlaylistSummary, PlaylistTracks, User};
pub use error::{CoreError, Result};
pub use types::{trim_track_name, Album, Artist, Image, Track};
