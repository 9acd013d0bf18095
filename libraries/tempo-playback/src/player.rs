//! Playback orchestrator
//!
//! [`Player`] composes the navigation engine and the audio controller into
//! one player. It is a handle to a single task that owns every mutation:
//! user commands, load and play results, controller notifications and
//! settings changes are handled one at a time in arrival order.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tempo_playback::{MediaElement, MemorySettings, PlaybackConfig, Player};
//!
//! # async fn example(element: Arc<dyn MediaElement>, tracks: Vec<tempo_core::Track>) -> tempo_playback::Result<()> {
//! let player = Player::spawn(element, Arc::new(MemorySettings::new()), PlaybackConfig::default());
//! player.set_tracks(tracks).await?;
//! player.play_playlist().await?;
//!
//! let mut current = player.subscribe_current_track();
//! current.changed().await.ok();
//! println!("Now playing: {:?}", current.borrow().as_ref().map(|t| t.display_name()));
//! # Ok(())
//! # }
//! ```

use crate::audio::{AudioController, ControllerEvent, PlaybackCommand};
use crate::error::{AudioError, PlayerError, Result};
use crate::media::{MediaElement, SourceId};
use crate::navigation::TrackNavigator;
use crate::settings::{parse_volume, read_volume, SettingChange, SettingsStore, SETTING_VOLUME};
use crate::shuffle::generate_shuffle_key;
use crate::types::{AudioState, Notice, PlaybackConfig, PlayerState, TrackInfo};
use std::ops::ControlFlow;
use std::sync::Arc;
use tempo_core::Track;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Notice when navigation runs past the last track
pub const END_OF_PLAYLIST: &str = "End of playlist reached";

/// Notice when navigation runs past the first track
pub const NO_PREVIOUS_TRACK: &str = "No previous playable tracks";

/// Notice when the retry cap is reached
pub const PLAYBACK_ABANDONED: &str = "Unable to play any track in the playlist";

/// Notice when the list has nothing to play
pub const NO_PLAYABLE_TRACKS: &str = "No playable tracks in the playlist";

type AudioResult = std::result::Result<(), AudioError>;

enum PlayerCommand {
    SetTracks {
        tracks: Vec<Track>,
        respond: oneshot::Sender<usize>,
    },
    PlayPlaylist {
        respond: oneshot::Sender<Option<Track>>,
    },
    TogglePlay {
        respond: oneshot::Sender<bool>,
    },
    SelectTrack {
        track: Track,
        respond: oneshot::Sender<bool>,
    },
    NextTrack {
        respond: oneshot::Sender<Option<Track>>,
    },
    PreviousTrack {
        respond: oneshot::Sender<Option<Track>>,
    },
    ToggleShuffle {
        respond: oneshot::Sender<bool>,
    },
    ToggleLoop {
        respond: oneshot::Sender<bool>,
    },
    SetVolume {
        volume: f64,
        respond: oneshot::Sender<u8>,
    },
    SeekTo {
        position: f64,
        respond: oneshot::Sender<()>,
    },
    ClearError {
        respond: oneshot::Sender<()>,
    },
    Shutdown {
        respond: oneshot::Sender<()>,
    },
}

/// Completion of work the task started earlier
#[derive(Debug)]
enum Outcome {
    Loaded { token: u64, result: AudioResult },
    Played { token: u64, result: AudioResult },
}

/// Player handle
///
/// Commands are processed by the player task in the order they are sent.
/// Streams are `watch` receivers: they replay the latest value and are
/// unsubscribed by dropping them.
pub struct Player {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    navigator: Arc<TrackNavigator>,
    audio_state: watch::Receiver<AudioState>,
    volume: watch::Receiver<u8>,
    notice: watch::Receiver<Option<Notice>>,
    task: JoinHandle<()>,
}

impl Player {
    /// Start the player task
    ///
    /// The initial volume is read once from `settings` (`audio.volume`),
    /// falling back to `config.default_volume`.
    pub fn spawn(
        element: Arc<dyn MediaElement>,
        settings: Arc<dyn SettingsStore>,
        config: PlaybackConfig,
    ) -> Self {
        let navigator = Arc::new(TrackNavigator::new());
        let (audio, controller_events) = AudioController::new(element, config.load_timeout());

        let volume = read_volume(settings.as_ref(), config.default_volume);
        audio.set_volume(volume);
        info!(volume, "Player starting");

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (outcomes, outcomes_rx) = mpsc::unbounded_channel();
        let (volume_tx, volume_rx) = watch::channel(volume);
        let (notice_tx, notice_rx) = watch::channel(None);
        let audio_state = audio.subscribe();
        let setting_changes = settings.subscribe();

        let task = PlayerTask {
            navigator: Arc::clone(&navigator),
            audio,
            settings,
            config,
            volume: volume_tx,
            notice: notice_tx,
            outcomes,
            load_token: 0,
            live_source: None,
            loading: false,
            loaded: false,
            failures: 0,
        };
        let task = tokio::spawn(task.run(commands_rx, controller_events, outcomes_rx, setting_changes));

        Self {
            commands,
            navigator,
            audio_state,
            volume: volume_rx,
            notice: notice_rx,
            task,
        }
    }

    async fn call<R>(&self, command: impl FnOnce(oneshot::Sender<R>) -> PlayerCommand) -> Result<R> {
        let (respond, rx) = oneshot::channel();
        self.commands
            .send(command(respond))
            .map_err(|_| PlayerError::Closed)?;
        rx.await.map_err(|_| PlayerError::Closed)
    }

    /// Replace the track list
    ///
    /// Tracks without a preview are dropped. The current selection follows its
    /// track into the new list, or is cleared (and audio stopped) when the track
    /// is gone. Returns the number of tracks kept.
    pub async fn set_tracks(&self, tracks: Vec<Track>) -> Result<usize> {
        self.call(|respond| PlayerCommand::SetTracks { tracks, respond }).await
    }

    /// Start from the first playable track of the traversal order
    pub async fn play_playlist(&self) -> Result<Option<Track>> {
        self.call(|respond| PlayerCommand::PlayPlaylist { respond }).await
    }

    /// Flip play/pause; starts the playlist when nothing is selected
    ///
    /// Returns the new playback intent.
    pub async fn toggle_play(&self) -> Result<bool> {
        self.call(|respond| PlayerCommand::TogglePlay { respond }).await
    }

    /// Play `track`
    ///
    /// Returns `false` (and emits a warning notice) when the track has no
    /// preview or is not part of the list.
    pub async fn select_track(&self, track: Track) -> Result<bool> {
        self.call(|respond| PlayerCommand::SelectTrack { track, respond }).await
    }

    /// Skip to the next playable track
    pub async fn next_track(&self) -> Result<Option<Track>> {
        self.call(|respond| PlayerCommand::NextTrack { respond }).await
    }

    /// Go back to the previous playable track
    pub async fn previous_track(&self) -> Result<Option<Track>> {
        self.call(|respond| PlayerCommand::PreviousTrack { respond }).await
    }

    /// Flip shuffle; turning it on draws a fresh shuffle key
    pub async fn toggle_shuffle(&self) -> Result<bool> {
        self.call(|respond| PlayerCommand::ToggleShuffle { respond }).await
    }

    /// Flip loop
    pub async fn toggle_loop(&self) -> Result<bool> {
        self.call(|respond| PlayerCommand::ToggleLoop { respond }).await
    }

    /// Round, clamp to 0-100, apply and persist; returns the applied volume
    pub async fn set_volume(&self, volume: f64) -> Result<u8> {
        self.call(|respond| PlayerCommand::SetVolume { volume, respond }).await
    }

    /// Jump to `position` seconds of the current track
    pub async fn seek_to(&self, position: f64) -> Result<()> {
        self.call(|respond| PlayerCommand::SeekTo { position, respond }).await
    }

    /// Dismiss the active notice
    pub async fn clear_error(&self) -> Result<()> {
        self.call(|respond| PlayerCommand::ClearError { respond }).await
    }

    /// Stop the player task and destroy the audio controller
    pub async fn shutdown(self) -> Result<()> {
        self.call(|respond| PlayerCommand::Shutdown { respond }).await?;
        self.task.await.map_err(|_| PlayerError::Closed)
    }

    /// Player state stream
    pub fn subscribe_player_state(&self) -> watch::Receiver<PlayerState> {
        self.navigator.subscribe_player_state()
    }

    /// Current track stream (emits on identity change only)
    pub fn subscribe_current_track(&self) -> watch::Receiver<Option<Track>> {
        self.navigator.subscribe_current_track()
    }

    /// Audio progress stream
    pub fn subscribe_audio(&self) -> watch::Receiver<AudioState> {
        self.audio_state.clone()
    }

    /// Volume stream
    pub fn subscribe_volume(&self) -> watch::Receiver<u8> {
        self.volume.clone()
    }

    /// Notice stream (`None` when cleared)
    pub fn subscribe_notice(&self) -> watch::Receiver<Option<Notice>> {
        self.notice.clone()
    }

    pub fn player_state(&self) -> PlayerState {
        self.navigator.player_state()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.navigator.current_track()
    }

    pub fn tracks(&self) -> Arc<[Track]> {
        self.navigator.tracks()
    }

    pub fn audio_state(&self) -> AudioState {
        self.audio_state.borrow().clone()
    }

    pub fn volume(&self) -> u8 {
        *self.volume.borrow()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.borrow().clone()
    }
}

/// State owned by the player task
struct PlayerTask {
    navigator: Arc<TrackNavigator>,
    audio: AudioController,
    settings: Arc<dyn SettingsStore>,
    config: PlaybackConfig,
    volume: watch::Sender<u8>,
    notice: watch::Sender<Option<Notice>>,
    outcomes: mpsc::UnboundedSender<Outcome>,
    /// Identifies the most recent load; older results are ignored
    load_token: u64,
    /// Source whose end or failure moves the player on; `None` once stopped
    live_source: Option<SourceId>,
    loading: bool,
    loaded: bool,
    failures: usize,
}

impl PlayerTask {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PlayerCommand>,
        mut controller_events: mpsc::UnboundedReceiver<ControllerEvent>,
        mut outcomes: mpsc::UnboundedReceiver<Outcome>,
        mut setting_changes: broadcast::Receiver<SettingChange>,
    ) {
        let mut settings_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).is_break() {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = controller_events.recv() => self.handle_controller_event(event),
                Some(outcome) = outcomes.recv() => self.handle_outcome(outcome),
                change = setting_changes.recv(), if settings_open => match change {
                    Ok(change) => self.handle_setting_change(&change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Settings changes dropped, re-reading volume");
                        let volume = read_volume(self.settings.as_ref(), self.config.default_volume);
                        self.apply_volume(volume);
                    }
                    Err(broadcast::error::RecvError::Closed) => settings_open = false,
                },
            }
        }

        debug!("Player task stopped");
    }

    fn handle_command(&mut self, command: PlayerCommand) -> ControlFlow<()> {
        match command {
            PlayerCommand::SetTracks { tracks, respond } => {
                let _ = respond.send(self.set_tracks(tracks));
            }
            PlayerCommand::PlayPlaylist { respond } => {
                self.failures = 0;
                let _ = respond.send(self.play_playlist());
            }
            PlayerCommand::TogglePlay { respond } => {
                let _ = respond.send(self.toggle_play());
            }
            PlayerCommand::SelectTrack { track, respond } => {
                let _ = respond.send(self.select_track(&track));
            }
            PlayerCommand::NextTrack { respond } => {
                self.failures = 0;
                let track = self.navigator.next_track();
                match &track {
                    Some(track) => self.start_track(track),
                    None => self.notify(Notice::info(END_OF_PLAYLIST)),
                }
                let _ = respond.send(track);
            }
            PlayerCommand::PreviousTrack { respond } => {
                self.failures = 0;
                let track = self.navigator.previous_track();
                match &track {
                    Some(track) => self.start_track(track),
                    None => self.notify(Notice::info(NO_PREVIOUS_TRACK)),
                }
                let _ = respond.send(track);
            }
            PlayerCommand::ToggleShuffle { respond } => {
                let enabled = !self.navigator.player_state().is_shuffled;
                let key = if enabled {
                    generate_shuffle_key()
                } else {
                    String::new()
                };
                debug!(enabled, key = %key, "Shuffle toggled");
                self.navigator.set_shuffle(enabled, key);
                let _ = respond.send(enabled);
            }
            PlayerCommand::ToggleLoop { respond } => {
                let looped = !self.navigator.player_state().is_looped;
                debug!(looped, "Loop toggled");
                self.navigator.set_looped(looped);
                let _ = respond.send(looped);
            }
            PlayerCommand::SetVolume { volume, respond } => {
                let _ = respond.send(self.set_volume(volume));
            }
            PlayerCommand::SeekTo { position, respond } => {
                self.audio.seek_to(position);
                let _ = respond.send(());
            }
            PlayerCommand::ClearError { respond } => {
                self.notice.send_replace(None);
                let _ = respond.send(());
            }
            PlayerCommand::Shutdown { respond } => {
                self.shutdown();
                let _ = respond.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn set_tracks(&mut self, tracks: Vec<Track>) -> usize {
        let total = tracks.len();
        let playable: Vec<Track> = tracks.into_iter().filter(Track::is_playable).collect();
        let kept = playable.len();

        let had_selection = self.navigator.player_state().current_track_index.is_some();
        let index = self.navigator.replace_tracks(playable);
        if had_selection && index.is_none() {
            debug!("Current track left the playlist, stopping");
            self.stop_audio();
        }

        info!(total, playable = kept, "Tracks set");
        kept
    }

    fn play_playlist(&mut self) -> Option<Track> {
        let track = self.navigator.first_track();
        match &track {
            Some(track) => self.start_track(track),
            None => {
                self.navigator.set_playing(false);
                self.notify(Notice::warning(NO_PLAYABLE_TRACKS));
            }
        }
        track
    }

    fn toggle_play(&mut self) -> bool {
        let state = self.navigator.player_state();
        if state.current_track_index.is_none() {
            self.failures = 0;
            return self.play_playlist().is_some();
        }

        let playing = !state.is_playing;
        self.navigator.set_playing(playing);

        if !playing {
            // Queued behind any pending play request
            let _ = self.audio.request(PlaybackCommand::Pause);
        } else if self.loaded {
            self.request_play();
        } else if !self.loading {
            self.failures = 0;
            if let Some(track) = self.navigator.current_track() {
                self.start_track(&track);
            }
        }
        // Still loading: play starts when the load completes

        playing
    }

    fn select_track(&mut self, track: &Track) -> bool {
        if !track.is_playable() {
            self.notify(Notice::warning(format!(
                "No preview URL available for track: {}",
                track.name
            )));
            return false;
        }

        let selected = self
            .navigator
            .index_of(track)
            .and_then(|index| self.navigator.select_index(index));

        match selected {
            Some(selected) => {
                self.failures = 0;
                self.start_track(&selected);
                true
            }
            None => {
                self.notify(Notice::warning(format!(
                    "Track is not in the playlist: {}",
                    track.name
                )));
                false
            }
        }
    }

    fn set_volume(&mut self, requested: f64) -> u8 {
        let volume = if requested.is_nan() {
            *self.volume.borrow()
        } else {
            requested.round().clamp(0.0, 100.0) as u8
        };

        self.apply_volume(volume);
        if let Err(e) = self.settings.set(SETTING_VOLUME, &volume.to_string()) {
            warn!(error = %e, volume, "Failed to persist volume");
        }
        volume
    }

    fn apply_volume(&mut self, volume: u8) {
        self.volume.send_if_modified(|current| {
            if *current == volume {
                return false;
            }
            *current = volume;
            true
        });
        self.audio.set_volume(volume);
    }

    /// Reflect a stored volume change into the stream and the controller
    ///
    /// Notifications can arrive after newer writes, so the store is re-read
    /// and the value carried by the notification only serves as a fallback.
    fn handle_setting_change(&mut self, change: &SettingChange) {
        if change.key != SETTING_VOLUME {
            return;
        }
        let volume = match self.settings.get(SETTING_VOLUME) {
            Ok(stored) => parse_volume(stored.as_deref(), self.config.default_volume),
            Err(e) => {
                warn!(error = %e, "Failed to re-read volume");
                parse_volume(change.value.as_deref(), self.config.default_volume)
            }
        };
        trace!(volume, "Volume changed in settings");
        self.apply_volume(volume);
    }

    /// Stop the current source and load `track`
    fn start_track(&mut self, track: &Track) {
        let Some(info) = TrackInfo::from_track(track) else {
            warn!(track = %track.name, "Track has no preview, not loading");
            return;
        };

        self.audio.pause();
        self.load_token += 1;
        self.loading = true;
        self.loaded = false;

        let token = self.load_token;
        info!(track = %info.name, token, "Loading track");

        let completion = self.audio.setup_audio(&info, *self.volume.borrow());
        self.live_source = Some(self.audio.current_source());
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let result = completion.await;
            let _ = outcomes.send(Outcome::Loaded { token, result });
        });
    }

    fn request_play(&mut self) {
        let token = self.load_token;
        let completion = self.audio.request(PlaybackCommand::Play);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let result = completion.await;
            let _ = outcomes.send(Outcome::Played { token, result });
        });
    }

    /// Invalidate the current load and silence the element
    fn stop_audio(&mut self) {
        self.load_token += 1;
        self.live_source = None;
        self.loading = false;
        self.loaded = false;
        self.audio.pause();
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Loaded { token, result } if token == self.load_token => {
                self.loading = false;
                match result {
                    Ok(()) => {
                        self.loaded = true;
                        if self.navigator.player_state().is_playing {
                            self.request_play();
                        }
                    }
                    Err(e) if e.is_track_failure() => self.track_failed(&e),
                    Err(e) => debug!(error = %e, "Load did not complete"),
                }
            }
            Outcome::Played { token, result } if token == self.load_token => match result {
                Ok(()) => {
                    self.failures = 0;
                    debug!(token, "Playing");
                }
                Err(e) if e.is_track_failure() => self.track_failed(&e),
                Err(e) => debug!(error = %e, "Play did not complete"),
            },
            outcome => trace!(?outcome, current = self.load_token, "Ignoring outcome of replaced load"),
        }
    }

    fn handle_controller_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Ended { source } if self.live_source == Some(source) => {
                debug!(%source, "Track finished");
                self.loaded = false;
                self.advance();
            }
            ControllerEvent::Failed { source, error } if self.live_source == Some(source) => {
                self.loaded = false;
                self.track_failed(&error);
            }
            event => trace!(?event, live = ?self.live_source, "Ignoring event for inactive source"),
        }
    }

    /// A load or play failed; skip ahead until the retry cap is reached
    fn track_failed(&mut self, error: &AudioError) {
        self.failures += 1;
        let cap = self
            .config
            .max_consecutive_failures
            .unwrap_or_else(|| self.navigator.track_count())
            .max(1);

        error!(error = %error, failures = self.failures, cap, "Track failed");

        if self.failures >= cap {
            self.failures = 0;
            self.stop_audio();
            self.navigator.set_playing(false);
            self.notify(Notice::error(PLAYBACK_ABANDONED));
            return;
        }

        self.advance();
    }

    /// Automatic move to the next track after an end or a failure
    fn advance(&mut self) {
        if let Some(track) = self.navigator.next_track() {
            self.start_track(&track);
            return;
        }

        if self.navigator.player_state().is_looped {
            debug!("Restarting playlist");
            self.play_playlist();
        } else {
            info!("Playlist finished");
            self.stop_audio();
            self.navigator.set_playing(false);
            self.notify(Notice::info(END_OF_PLAYLIST));
        }
    }

    fn notify(&self, notice: Notice) {
        debug!(message = %notice.message, severity = ?notice.severity, "Notice");
        self.notice.send_replace(Some(notice));
    }

    fn shutdown(&mut self) {
        self.stop_audio();
        if self.audio.destroy().is_ok() {
            info!("Player shut down");
        }
    }
}
