//! Shared helpers for the player integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempo_core::Track;
use tempo_playback::{MediaElement, MediaEvent, MediaSignal, SourceId};
use tokio::sync::{broadcast, watch};

pub const WAIT: Duration = Duration::from_secs(2);

/// Element that becomes playable as soon as a source is assigned
///
/// URLs containing `broken` fail to load instead, and `play` is rejected for
/// URLs containing `blocked`. Tracks only end when a test calls
/// [`AutoElement::finish`].
pub struct AutoElement {
    signals: broadcast::Sender<MediaSignal>,
    loads: Mutex<Vec<String>>,
    current: Mutex<SourceId>,
    plays: Mutex<usize>,
    rejected: Mutex<usize>,
}

impl AutoElement {
    pub fn new() -> Arc<Self> {
        let (signals, _) = broadcast::channel(256);
        Arc::new(Self {
            signals,
            loads: Mutex::new(Vec::new()),
            current: Mutex::new(SourceId::default()),
            plays: Mutex::new(0),
            rejected: Mutex::new(0),
        })
    }

    /// URLs passed to `load`, oldest first
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }

    pub fn play_count(&self) -> usize {
        *self.plays.lock().unwrap()
    }

    /// Play requests refused for a `blocked` source
    pub fn rejected_count(&self) -> usize {
        *self.rejected.lock().unwrap()
    }

    /// Play the current source to its end
    pub fn finish(&self) {
        let source = *self.current.lock().unwrap();
        self.emit(source, MediaEvent::TimeUpdate(30.0));
        self.emit(source, MediaEvent::Ended);
    }

    fn emit(&self, source: SourceId, event: MediaEvent) {
        let _ = self.signals.send(MediaSignal::new(source, event));
    }

    /// Wait until `count` sources have been loaded
    pub async fn wait_loads(&self, count: usize) {
        eventually(|| self.loads().len() >= count).await;
    }
}

#[async_trait]
impl MediaElement for AutoElement {
    fn load(&self, source: SourceId, url: &str) {
        self.loads.lock().unwrap().push(url.to_string());
        *self.current.lock().unwrap() = source;

        self.emit(source, MediaEvent::LoadStart);
        if url.contains("broken") {
            self.emit(source, MediaEvent::Error("unsupported source".to_string()));
        } else {
            self.emit(source, MediaEvent::DurationChange(30.0));
            self.emit(source, MediaEvent::CanPlay);
        }
    }

    async fn play(&self) -> Result<(), String> {
        let blocked = self
            .loads
            .lock()
            .unwrap()
            .last()
            .is_some_and(|url| url.contains("blocked"));
        if blocked {
            *self.rejected.lock().unwrap() += 1;
            return Err("play() request was blocked".to_string());
        }

        *self.plays.lock().unwrap() += 1;
        Ok(())
    }

    fn pause(&self) {}

    fn set_volume(&self, _volume: f64) {}

    fn seek(&self, position: f64) {
        let source = *self.current.lock().unwrap();
        self.emit(source, MediaEvent::TimeUpdate(position));
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaSignal> {
        self.signals.subscribe()
    }
}

pub fn track(id: &str) -> Track {
    let url = format!("https://cdn/{id}.mp3");
    Track::new(id, id.to_uppercase(), Some(url.as_str()))
}

pub fn silent_track(id: &str) -> Track {
    Track::new(id, id.to_uppercase(), None)
}

pub fn url(id: &str) -> String {
    format!("https://cdn/{id}.mp3")
}

/// Poll `condition` until it holds or [`WAIT`] runs out
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached in time");
}

/// Wait until the stream's value satisfies `predicate`
pub async fn wait_for<T>(rx: &mut watch::Receiver<T>, predicate: impl FnMut(&T) -> bool) -> T
where
    T: Clone,
{
    within(rx.wait_for(predicate))
        .await
        .expect("stream closed")
        .clone()
}

pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future).await.expect("timed out")
}
