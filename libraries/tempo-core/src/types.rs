//! Catalog track types
//!
//! Tracks are immutable once loaded. Only the fields the player and the
//! surrounding UI read are modelled; everything else in the catalog document
//! is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Cover image of an album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image location
    pub url: String,

    /// Width in pixels (not always known)
    #[serde(default)]
    pub width: Option<u32>,

    /// Height in pixels (not always known)
    #[serde(default)]
    pub height: Option<u32>,
}

/// Artist credited on a track
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub uri: Option<String>,
}

/// Album metadata attached to a track
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub id: Option<String>,

    /// Album title
    #[serde(default)]
    pub name: String,

    /// Cover art, largest first
    #[serde(default)]
    pub images: Vec<Image>,

    /// Release date as written in the catalog (precision varies)
    #[serde(default)]
    pub release_date: Option<String>,
}

/// Catalog track
///
/// Identity is the `id` when present and the `uri` otherwise; both may be
/// missing for local files. A track without a preview URL is listed but can
/// never be played.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Track {
    /// Service identifier
    #[serde(default)]
    pub id: Option<String>,

    /// Service URI (identity fallback)
    #[serde(default)]
    pub uri: Option<String>,

    /// Display name as published
    pub name: String,

    /// Credited artists, in billing order
    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub album: Album,

    /// Short media preview; absent for unplayable tracks
    #[serde(default)]
    pub preview_url: Option<String>,

    /// Full track duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default)]
    pub explicit: bool,

    #[serde(default)]
    pub track_number: Option<u32>,
}

impl Track {
    /// Create a track with a name and an optional preview URL
    pub fn new(id: impl Into<String>, name: impl Into<String>, preview_url: Option<&str>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            preview_url: preview_url.map(str::to_string),
            ..Self::default()
        }
    }

    /// Stable identity: `id`, falling back to `uri`
    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref().or(self.uri.as_deref())
    }

    /// Whether this track can be handed to the audio controller
    pub fn is_playable(&self) -> bool {
        self.preview_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Preview URL, only when the track is playable
    pub fn playable_url(&self) -> Option<&str> {
        self.preview_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Name with parenthesised qualifiers removed ("Song (Remastered 2011)" -> "Song")
    pub fn display_name(&self) -> String {
        trim_track_name(&self.name)
    }

    /// Artist names joined for display
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// First album image, if any
    pub fn cover_url(&self) -> Option<&str> {
        self.album.images.first().map(|image| image.url.as_str())
    }
}

/// Remove every `(...)` segment together with the whitespace around it
///
/// Each segment runs from an opening parenthesis to the first closing one
/// after it. An opening parenthesis without a match is kept as-is.
pub fn trim_track_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };

        out.push_str(&rest[..open]);
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);

        rest = rest[open + close + 1..].trim_start();
    }

    out.push_str(rest);
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_falls_back_to_uri() {
        let mut track = Track::new("t1", "Song", None);
        assert_eq!(track.identity(), Some("t1"));

        track.id = None;
        track.uri = Some("spotify:track:t1".to_string());
        assert_eq!(track.identity(), Some("spotify:track:t1"));

        track.uri = None;
        assert_eq!(track.identity(), None);
    }

    #[test]
    fn playable_requires_non_empty_preview() {
        assert!(Track::new("a", "A", Some("https://cdn/a.mp3")).is_playable());
        assert!(!Track::new("b", "B", None).is_playable());
        assert!(!Track::new("c", "C", Some("")).is_playable());
        assert_eq!(Track::new("c", "C", Some("")).playable_url(), None);
    }

    #[test]
    fn trims_parenthesised_segments() {
        assert_eq!(trim_track_name("Song (Remastered 2011)"), "Song");
        assert_eq!(trim_track_name("  Song  "), "Song");
        assert_eq!(trim_track_name("A (feat. B) (Live)"), "A");
        assert_eq!(trim_track_name("Song (feat. X) - Live"), "Song- Live");
        assert_eq!(trim_track_name("Open (paren"), "Open (paren");
        assert_eq!(trim_track_name("((nested))"), ")");
        assert_eq!(trim_track_name("(Intro)"), "");
    }

    #[test]
    fn artist_names_joined() {
        let mut track = Track::new("t", "Song", None);
        track.artists = vec![
            Artist {
                name: "Daft Punk".to_string(),
                ..Artist::default()
            },
            Artist {
                name: "Pharrell Williams".to_string(),
                ..Artist::default()
            },
        ];
        assert_eq!(track.artist_names(), "Daft Punk, Pharrell Williams");
    }
}
