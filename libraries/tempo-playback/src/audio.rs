//! Audio playback controller
//!
//! Wraps one [`MediaElement`] and turns its signals into an [`AudioState`]
//! stream plus a small command surface (load, play, pause, seek, volume).
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Loading -> Ready -> Playing <-> Paused
//!            |                  |
//!            +----> Error <-----+
//! ```
//!
//! Every [`AudioController::setup_audio`] call starts a new source generation.
//! Signals, load completions and play requests that belong to an older
//! generation are discarded, so a slow source that finishes loading after the
//! user skipped past it cannot touch the state of the current one.
//!
//! Play and pause requests submitted through [`AudioController::request`] are
//! applied one at a time in submission order by a single worker task.

use crate::error::AudioError;
use crate::media::{MediaElement, MediaEvent, MediaSignal, SourceId};
use crate::types::{AudioState, TrackInfo};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

type AudioResult = std::result::Result<(), AudioError>;

/// Serialized play/pause requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// Start playback once the current source is ready
    Play,

    /// Pause playback
    Pause,
}

/// Notifications from the controller to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The current source played to its end
    Ended { source: SourceId },

    /// The current source failed after its load had already completed
    Failed { source: SourceId, error: AudioError },
}

/// One-shot completion of a load or a queued command
///
/// Resolves to `Err(AudioError::Destroyed)` if the controller goes away
/// before answering.
#[must_use = "completions do nothing unless awaited"]
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<AudioResult>,
}

impl Completion {
    fn resolved(result: AudioResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for Completion {
    type Output = AudioResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(AudioError::Destroyed)))
    }
}

/// Load progress of the current generation, used to park play requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    Idle,
    Loading(SourceId),
    Ready(SourceId),
    Failed(SourceId),
    Destroyed,
}

struct QueuedCommand {
    command: PlaybackCommand,
    respond: oneshot::Sender<AudioResult>,
}

/// Mutable bookkeeping, guarded by one lock
struct Session {
    source: SourceId,
    track: Option<TrackInfo>,
    pending_load: Option<oneshot::Sender<AudioResult>>,
    load_timer: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
    destroyed: bool,
}

impl Session {
    fn track_name(&self) -> String {
        self.track
            .as_ref()
            .map(|track| track.name.clone())
            .unwrap_or_default()
    }
}

struct Shared {
    element: Arc<dyn MediaElement>,
    state: watch::Sender<AudioState>,
    phase: watch::Sender<LoadPhase>,
    session: Mutex<Session>,
    events: mpsc::UnboundedSender<ControllerEvent>,
    load_timeout: Option<Duration>,
}

/// Controller for a single media element
///
/// Must be created inside a Tokio runtime: it spawns the signal pump and the
/// command worker. Dropping the controller destroys it.
pub struct AudioController {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<QueuedCommand>,
}

impl AudioController {
    /// Take ownership of `element`
    ///
    /// Returns the controller and the receiver for [`ControllerEvent`]s.
    /// `load_timeout` bounds how long a source may stay in the loading state
    /// before it counts as a load failure (`None` waits forever).
    pub fn new(
        element: Arc<dyn MediaElement>,
        load_timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let signals = element.subscribe();

        let shared = Arc::new(Shared {
            element,
            state: watch::Sender::new(AudioState::default()),
            phase: watch::Sender::new(LoadPhase::Idle),
            session: Mutex::new(Session {
                source: SourceId::default(),
                track: None,
                pending_load: None,
                load_timer: None,
                tasks: Vec::new(),
                destroyed: false,
            }),
            events,
            load_timeout,
        });

        let pump = tokio::spawn(Arc::clone(&shared).pump(signals));
        let worker = tokio::spawn(Arc::clone(&shared).run_commands(commands_rx));
        shared.lock_session().tasks = vec![pump, worker];

        (Self { shared, commands }, events_rx)
    }

    /// Subscribe to state changes (the current value is available immediately)
    pub fn subscribe(&self) -> watch::Receiver<AudioState> {
        self.shared.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AudioState {
        self.shared.state.borrow().clone()
    }

    /// Generation of the most recent `setup_audio`
    pub fn current_source(&self) -> SourceId {
        self.shared.lock_session().source
    }

    /// Replace the current source with `track`
    ///
    /// Any load or play still waiting on the previous source is cancelled
    /// (its completion resolves to [`AudioError::Superseded`]). The state is
    /// reset to loading with the given volume. The returned completion
    /// resolves once the element reports it can play, or fails with
    /// [`AudioError::Load`].
    pub fn setup_audio(&self, track: &TrackInfo, volume: u8) -> Completion {
        let shared = &self.shared;
        let mut session = shared.lock_session();
        if session.destroyed {
            return Completion::resolved(Err(AudioError::Destroyed));
        }

        if let Some(previous) = session.pending_load.take() {
            let _ = previous.send(Err(AudioError::Superseded));
        }
        if let Some(timer) = session.load_timer.take() {
            timer.abort();
        }

        session.source = SourceId(session.source.0 + 1);
        session.track = Some(track.clone());
        let source = session.source;

        debug!(%source, track = %track.name, url = %track.url, "Loading audio source");

        shared.state.send_replace(AudioState::loading(volume));
        shared.phase.send_replace(LoadPhase::Loading(source));
        shared.element.load(source, &track.url);
        shared.element.set_volume(volume_to_gain(volume));

        let (tx, rx) = oneshot::channel();
        session.pending_load = Some(tx);

        if let Some(timeout) = shared.load_timeout {
            let timer_shared = Arc::clone(shared);
            session.load_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                timer_shared.expire_load(source, timeout);
            }));
        }

        Completion { rx }
    }

    /// Start playback, waiting for the current source to become ready first
    ///
    /// Resolves once the element is actually playing.
    pub async fn play(&self) -> AudioResult {
        self.shared.play().await
    }

    /// Pause playback (idempotent, no-op when nothing is loaded)
    pub fn pause(&self) {
        self.shared.pause();
    }

    /// Queue a play or pause request behind earlier requests
    pub fn request(&self, command: PlaybackCommand) -> Completion {
        let (respond, rx) = oneshot::channel();
        // A closed queue drops `respond`, which resolves the completion as destroyed
        let _ = self.commands.send(QueuedCommand { command, respond });
        Completion { rx }
    }

    /// Set output volume (0-100)
    pub fn set_volume(&self, volume: u8) {
        let session = self.shared.lock_session();
        if session.destroyed {
            return;
        }

        let volume = volume.min(100);
        self.shared.element.set_volume(volume_to_gain(volume));
        self.shared.state.send_modify(|state| state.set_volume(volume));
    }

    /// Jump to `position` seconds of the current source
    pub fn seek_to(&self, position: f64) {
        let session = self.shared.lock_session();
        if session.destroyed || session.track.is_none() {
            return;
        }
        self.shared.element.seek(position);
    }

    /// Whether `destroy` has run
    pub fn is_destroyed(&self) -> bool {
        self.shared.lock_session().destroyed
    }

    /// Cancel everything and stop emitting state
    ///
    /// Pending loads and plays resolve to [`AudioError::Destroyed`], the
    /// signal pump, command worker and load timer are stopped. Terminal:
    /// calling it again returns `Err(AudioError::Destroyed)`.
    pub fn destroy(&self) -> AudioResult {
        let mut session = self.shared.lock_session();
        if session.destroyed {
            return Err(AudioError::Destroyed);
        }
        session.destroyed = true;

        if let Some(waiter) = session.pending_load.take() {
            let _ = waiter.send(Err(AudioError::Destroyed));
        }
        if let Some(timer) = session.load_timer.take() {
            timer.abort();
        }
        for task in session.tasks.drain(..) {
            task.abort();
        }

        self.shared.element.pause();
        self.shared.phase.send_replace(LoadPhase::Destroyed);

        debug!("Audio controller destroyed");
        Ok(())
    }
}

impl Drop for AudioController {
    fn drop(&mut self) {
        let _ = self.destroy();
    }
}

impl Shared {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pump(self: Arc<Self>, mut signals: broadcast::Receiver<MediaSignal>) {
        loop {
            match signals.recv().await {
                Ok(signal) => self.handle_signal(signal),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Media signals dropped, consumer too slow");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn run_commands(self: Arc<Self>, mut commands: mpsc::UnboundedReceiver<QueuedCommand>) {
        while let Some(QueuedCommand { command, respond }) = commands.recv().await {
            let result = match command {
                PlaybackCommand::Play => self.play().await,
                PlaybackCommand::Pause => {
                    self.pause();
                    Ok(())
                }
            };
            let _ = respond.send(result);
        }
    }

    fn handle_signal(&self, signal: MediaSignal) {
        let mut session = self.lock_session();
        if session.destroyed {
            return;
        }
        if signal.source != session.source {
            trace!(
                stale = %signal.source,
                current = %session.source,
                event = ?signal.event,
                "Dropping signal for replaced source"
            );
            return;
        }

        match signal.event {
            MediaEvent::LoadStart => self.state.send_modify(AudioState::mark_loading),
            MediaEvent::CanPlay => {
                self.state.send_modify(AudioState::mark_ready);
                self.phase.send_replace(LoadPhase::Ready(session.source));
                if let Some(timer) = session.load_timer.take() {
                    timer.abort();
                }
                if let Some(waiter) = session.pending_load.take() {
                    let _ = waiter.send(Ok(()));
                }
            }
            MediaEvent::TimeUpdate(position) => {
                self.state.send_modify(|state| state.set_position(position));
            }
            MediaEvent::DurationChange(duration) => {
                self.state.send_modify(|state| state.set_duration(duration));
            }
            MediaEvent::Ended => {
                debug!(source = %session.source, track = %session.track_name(), "Track ended");
                self.state.send_modify(|state| state.set_playing(false));
                let _ = self.events.send(ControllerEvent::Ended {
                    source: session.source,
                });
            }
            MediaEvent::Error(reason) => {
                let error = AudioError::Load {
                    track: session.track_name(),
                    reason,
                };
                self.fail(&mut session, error);
            }
        }
    }

    /// Record a failure of the current source and report it once
    fn fail(&self, session: &mut Session, error: AudioError) {
        warn!(source = %session.source, %error, "Audio source failed");

        self.state.send_modify(|state| state.fail(error.clone()));
        self.phase.send_replace(LoadPhase::Failed(session.source));
        if let Some(timer) = session.load_timer.take() {
            timer.abort();
        }

        match session.pending_load.take() {
            Some(waiter) => {
                let _ = waiter.send(Err(error));
            }
            None => {
                let _ = self.events.send(ControllerEvent::Failed {
                    source: session.source,
                    error,
                });
            }
        }
    }

    fn expire_load(&self, source: SourceId, timeout: Duration) {
        let mut session = self.lock_session();
        if session.destroyed
            || session.source != source
            || *self.phase.borrow() != LoadPhase::Loading(source)
        {
            return;
        }

        // Running inside the timer task itself
        session.load_timer = None;
        let error = AudioError::Load {
            track: session.track_name(),
            reason: format!("not playable after {} ms", timeout.as_millis()),
        };
        self.fail(&mut session, error);
    }

    async fn play(&self) -> AudioResult {
        let source = {
            let session = self.lock_session();
            if session.destroyed {
                return Err(AudioError::Destroyed);
            }
            if session.track.is_none() {
                return Err(AudioError::NoSource);
            }
            session.source
        };

        let mut phase = self.phase.subscribe();
        let reached = phase
            .wait_for(|phase| *phase != LoadPhase::Loading(source))
            .await
            .map(|phase| *phase);

        match reached {
            Ok(LoadPhase::Ready(ready)) if ready == source => {}
            Ok(LoadPhase::Failed(failed)) if failed == source => {
                let error = self.state.borrow().error.clone();
                return Err(error.unwrap_or(AudioError::Superseded));
            }
            Ok(LoadPhase::Destroyed) | Err(_) => return Err(AudioError::Destroyed),
            Ok(_) => return Err(AudioError::Superseded),
        }

        trace!(%source, "Issuing play");
        let outcome = self.element.play().await;

        let session = self.lock_session();
        if session.destroyed {
            return Err(AudioError::Destroyed);
        }
        if session.source != source {
            return Err(AudioError::Superseded);
        }

        match outcome {
            Ok(()) => {
                self.state.send_modify(|state| state.set_playing(true));
                debug!(%source, track = %session.track_name(), "Playback started");
                Ok(())
            }
            Err(reason) => {
                let error = AudioError::Playback {
                    track: session.track_name(),
                    reason,
                };
                warn!(%source, %error, "Play request rejected");
                self.state.send_modify(|state| state.reject(error.clone()));
                Err(error)
            }
        }
    }

    fn pause(&self) {
        let session = self.lock_session();
        if session.destroyed || session.track.is_none() {
            return;
        }
        self.element.pause();
        self.state.send_modify(|state| state.set_playing(false));
    }
}

/// Map 0-100 to the element's `0.0..=1.0`
fn volume_to_gain(volume: u8) -> f64 {
    f64::from(volume.min(100)) / 100.0
}
