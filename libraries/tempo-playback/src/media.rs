//! Platform media element contract
//!
//! The audio controller drives exactly one media element: a browser audio
//! tag, a native player, or the CLI's simulated element. The element reports
//! what happens to its source through [`MediaSignal`]s. Every signal is tagged
//! with the [`SourceId`] passed to [`MediaElement::load`], which lets the
//! controller drop late signals that belong to a source it already replaced.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::broadcast;

/// Generation of a loaded source
///
/// Increases with every `setup_audio` call of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Native media notifications
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Source assignment accepted, fetching started
    LoadStart,

    /// Enough data to start playback
    CanPlay,

    /// Playback position moved (seconds)
    TimeUpdate(f64),

    /// Duration became known or changed (seconds)
    DurationChange(f64),

    /// Playback reached the end of the source
    Ended,

    /// Source failed to load or decode
    Error(String),
}

/// A [`MediaEvent`] for a specific source
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSignal {
    pub source: SourceId,
    pub event: MediaEvent,
}

impl MediaSignal {
    pub fn new(source: SourceId, event: MediaEvent) -> Self {
        Self { source, event }
    }
}

/// Platform media element
///
/// Implementations must emit every signal for the most recent `load` with
/// that call's `source` id, and never block in the synchronous methods.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Stop whatever is playing, assign `url` and start loading it
    fn load(&self, source: SourceId, url: &str);

    /// Start playback of the loaded source
    ///
    /// Resolves once audio is playing; `Err` carries the rejection reason
    /// (source unavailable, autoplay restriction, ...).
    async fn play(&self) -> std::result::Result<(), String>;

    /// Pause playback (no-op when nothing plays)
    fn pause(&self);

    /// Output volume in `0.0..=1.0`
    fn set_volume(&self, volume: f64);

    /// Jump to `position` seconds
    fn seek(&self, position: f64);

    /// Subscribe to signals
    fn subscribe(&self) -> broadcast::Receiver<MediaSignal>;
}
