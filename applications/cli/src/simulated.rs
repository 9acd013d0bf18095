//! Simulated audio element
//!
//! Stands in for a real audio output: sources "load" after a delay, playback
//! advances a clock on a timer and reports the end of the clip. Sources
//! without an `http(s)` URL fail to load.

use crate::config::SimulationSettings;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tempo_playback::{MediaElement, MediaEvent, MediaSignal, SourceId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Default)]
struct Playback {
    source: Option<SourceId>,
    ready: bool,
    playing: bool,
    position: f64,
    volume: f64,
    loader: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl Playback {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

struct Shared {
    settings: SimulationSettings,
    signals: broadcast::Sender<MediaSignal>,
    playback: Mutex<Playback>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, source: SourceId, event: MediaEvent) {
        let _ = self.signals.send(MediaSignal::new(source, event));
    }

    async fn finish_loading(self: Arc<Self>, source: SourceId, url: String) {
        tokio::time::sleep(Duration::from_millis(self.settings.load_delay_ms)).await;

        let mut playback = self.lock();
        if playback.source != Some(source) {
            return;
        }
        playback.loader = None;

        if url.starts_with("http://") || url.starts_with("https://") {
            playback.ready = true;
            drop(playback);
            debug!(%source, url = %url, "Simulated source ready");
            self.emit(source, MediaEvent::DurationChange(self.settings.clip_seconds));
            self.emit(source, MediaEvent::CanPlay);
        } else {
            drop(playback);
            debug!(%source, url = %url, "Simulated source rejected");
            self.emit(source, MediaEvent::Error(format!("unsupported source: {url}")));
        }
    }

    async fn run_clock(self: Arc<Self>, source: SourceId) {
        let tick = Duration::from_millis(self.settings.tick_ms);
        let step = tick.as_secs_f64() * self.settings.speed;
        let mut interval = tokio::time::interval(tick);
        interval.tick().await;

        loop {
            interval.tick().await;

            let mut playback = self.lock();
            if playback.source != Some(source) || !playback.playing {
                break;
            }

            playback.position = (playback.position + step).min(self.settings.clip_seconds);
            let position = playback.position;
            let ended = position >= self.settings.clip_seconds;
            if ended {
                playback.playing = false;
                playback.ticker = None;
            }
            drop(playback);

            trace!(%source, position, "Tick");
            self.emit(source, MediaEvent::TimeUpdate(position));
            if ended {
                self.emit(source, MediaEvent::Ended);
                break;
            }
        }
    }
}

/// In-memory media element driven by Tokio timers
pub struct SimulatedElement {
    shared: Arc<Shared>,
}

impl SimulatedElement {
    pub fn new(settings: SimulationSettings) -> Self {
        let (signals, _) = broadcast::channel(256);
        Self {
            shared: Arc::new(Shared {
                settings,
                signals,
                playback: Mutex::new(Playback {
                    volume: 1.0,
                    ..Playback::default()
                }),
            }),
        }
    }

    /// Current output volume (`0.0..=1.0`)
    pub fn volume(&self) -> f64 {
        self.shared.lock().volume
    }
}

#[async_trait]
impl MediaElement for SimulatedElement {
    fn load(&self, source: SourceId, url: &str) {
        let mut playback = self.shared.lock();
        playback.stop_ticker();
        if let Some(loader) = playback.loader.take() {
            loader.abort();
        }

        playback.source = Some(source);
        playback.ready = false;
        playback.playing = false;
        playback.position = 0.0;
        playback.loader = Some(tokio::spawn(
            Arc::clone(&self.shared).finish_loading(source, url.to_string()),
        ));
        drop(playback);

        self.shared.emit(source, MediaEvent::LoadStart);
    }

    async fn play(&self) -> Result<(), String> {
        let mut playback = self.shared.lock();
        let source = match playback.source {
            Some(source) if playback.ready => source,
            _ => return Err("no playable source loaded".to_string()),
        };
        if playback.playing {
            return Ok(());
        }
        if playback.position >= self.shared.settings.clip_seconds {
            playback.position = 0.0;
        }

        playback.playing = true;
        playback.ticker = Some(tokio::spawn(Arc::clone(&self.shared).run_clock(source)));
        Ok(())
    }

    fn pause(&self) {
        let mut playback = self.shared.lock();
        playback.playing = false;
        playback.stop_ticker();
    }

    fn set_volume(&self, volume: f64) {
        self.shared.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn seek(&self, position: f64) {
        let mut playback = self.shared.lock();
        let Some(source) = playback.source.filter(|_| playback.ready) else {
            return;
        };
        playback.position = position.clamp(0.0, self.shared.settings.clip_seconds);
        let position = playback.position;
        drop(playback);

        self.shared.emit(source, MediaEvent::TimeUpdate(position));
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaSignal> {
        self.shared.signals.subscribe()
    }
}
