//! Scripted media element for unit tests

use crate::media::{MediaElement, MediaEvent, MediaSignal, SourceId};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Load(SourceId, String),
    Play,
    Pause,
    Volume(f64),
    Seek(f64),
}

/// Records every call; signals are only emitted when a test asks for them
pub(crate) struct MockElement {
    calls: Mutex<Vec<Call>>,
    signals: broadcast::Sender<MediaSignal>,
    reject_play: Mutex<Option<String>>,
}

impl MockElement {
    pub(crate) fn new() -> Arc<Self> {
        let (signals, _) = broadcast::channel(64);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            signals,
            reject_play: Mutex::new(None),
        })
    }

    pub(crate) fn emit(&self, source: SourceId, event: MediaEvent) {
        let _ = self.signals.send(MediaSignal::new(source, event));
    }

    /// Reject every following `play` with `reason`
    pub(crate) fn reject_play(&self, reason: &str) {
        *self.reject_play.lock().unwrap() = Some(reason.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn loaded_urls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Load(_, url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn last_source(&self) -> SourceId {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|call| match call {
                Call::Load(source, _) => Some(source),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaElement for MockElement {
    fn load(&self, source: SourceId, url: &str) {
        self.record(Call::Load(source, url.to_string()));
    }

    async fn play(&self) -> Result<(), String> {
        self.record(Call::Play);
        match self.reject_play.lock().unwrap().clone() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    fn pause(&self) {
        self.record(Call::Pause);
    }

    fn set_volume(&self, volume: f64) {
        self.record(Call::Volume(volume));
    }

    fn seek(&self, position: f64) {
        self.record(Call::Seek(position));
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaSignal> {
        self.signals.subscribe()
    }
}
