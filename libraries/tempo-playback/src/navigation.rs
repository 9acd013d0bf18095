//! Track navigation engine
//!
//! Owns the active track list and the authoritative [`PlayerState`]. All
//! mutations run under one lock, so navigation requests are serialized and a
//! later request always observes the committed result of an earlier one.
//!
//! Traversal order is the natural list order, or the seeded shuffle
//! permutation when shuffle is on and a shuffle key is set. The permutation is
//! cached per `(list version, shuffle key)` and recomputed lazily.

use crate::shuffle::shuffled_indices;
use crate::types::PlayerState;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempo_core::Track;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Debug)]
struct ShuffleCache {
    list_version: u64,
    key: String,
    indices: Vec<usize>,
}

#[derive(Debug)]
struct Navigation {
    tracks: Arc<[Track]>,
    list_version: u64,
    state: PlayerState,
    shuffle: Option<ShuffleCache>,
}

impl Navigation {
    fn is_playable(&self, index: usize) -> bool {
        self.tracks.get(index).is_some_and(Track::is_playable)
    }

    fn current_track(&self) -> Option<Track> {
        self.state
            .current_track_index
            .and_then(|index| self.tracks.get(index))
            .cloned()
    }

    /// Indices in the order next/previous walk them
    fn traversal(&mut self) -> Vec<usize> {
        let length = self.tracks.len();
        if !self.state.is_shuffled || self.state.shuffle_key.is_empty() {
            return (0..length).collect();
        }

        let fresh = self.shuffle.as_ref().is_some_and(|cache| {
            cache.list_version == self.list_version && cache.key == self.state.shuffle_key
        });
        if !fresh {
            debug!(key = %self.state.shuffle_key, length, "Computing shuffle order");
            self.shuffle = Some(ShuffleCache {
                list_version: self.list_version,
                key: self.state.shuffle_key.clone(),
                indices: shuffled_indices(length, &self.state.shuffle_key),
            });
        }

        self.shuffle
            .as_ref()
            .map(|cache| cache.indices.clone())
            .unwrap_or_default()
    }

    fn commit(&mut self, index: usize) -> Option<Track> {
        self.state.current_track_index = Some(index);
        self.state.is_playing = true;
        self.tracks.get(index).cloned()
    }

    fn step(&mut self, direction: Direction) -> Option<Track> {
        let length = self.tracks.len();
        if length == 0 {
            return None;
        }

        let order = self.traversal();
        let position = self
            .state
            .current_track_index
            .and_then(|index| order.iter().position(|&entry| entry == index));

        let start = match (direction, position) {
            (Direction::Forward, Some(p)) if p + 1 < length => p + 1,
            (Direction::Forward, None) => 0,
            (Direction::Backward, Some(p)) if p > 0 => p - 1,
            // Stepped past either end
            _ if self.state.is_looped => match direction {
                Direction::Forward => 0,
                Direction::Backward => length - 1,
            },
            _ => return None,
        };

        self.scan(&order, start, direction)
    }

    /// Walk `order` from `start` to the first playable entry and commit it
    ///
    /// Wraps around only when looped; never visits more than `order.len()`
    /// entries.
    fn scan(&mut self, order: &[usize], start: usize, direction: Direction) -> Option<Track> {
        let length = order.len();
        let mut cursor = start;

        for _ in 0..length {
            let index = order[cursor];
            if self.is_playable(index) {
                return self.commit(index);
            }

            cursor = match direction {
                Direction::Forward => (cursor + 1) % length,
                Direction::Backward => (cursor + length - 1) % length,
            };

            let wrapped = match direction {
                Direction::Forward => cursor < start,
                Direction::Backward => cursor > start,
            };
            if wrapped && !self.state.is_looped {
                break;
            }
        }

        None
    }

    fn locate(&self, track: &Track) -> Option<usize> {
        self.tracks
            .iter()
            .position(|candidate| same_track(Some(candidate), Some(track)))
    }
}

/// Identity comparison used for current-track deduplication
///
/// Tracks compare by id/URI; tracks without either compare by value.
fn same_track(a: Option<&Track>, b: Option<&Track>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => match (a.identity(), b.identity()) {
            (Some(left), Some(right)) => left == right,
            (None, None) => a == b,
            _ => false,
        },
        _ => false,
    }
}

/// Navigation engine with reactive state
///
/// `TrackNavigator` is shared by reference (`Arc`) between the orchestrator and
/// read-only consumers; dropping the last reference closes its streams.
pub struct TrackNavigator {
    inner: Mutex<Navigation>,
    state_tx: watch::Sender<PlayerState>,
    current_tx: watch::Sender<Option<Track>>,
}

impl Default for TrackNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackNavigator {
    /// Empty list, nothing selected
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Navigation {
                tracks: Arc::from(Vec::new()),
                list_version: 0,
                state: PlayerState::default(),
                shuffle: None,
            }),
            state_tx: watch::Sender::new(PlayerState::default()),
            current_tx: watch::Sender::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Navigation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the committed state to subscribers
    fn publish(&self, nav: &Navigation) {
        let state = nav.state.clone();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });

        let track = nav.current_track();
        self.current_tx.send_if_modified(|current| {
            if same_track(current.as_ref(), track.as_ref()) {
                return false;
            }
            *current = track;
            true
        });
    }

    /// Run `f` against the locked state and publish the result
    fn update<R>(&self, f: impl FnOnce(&mut Navigation) -> R) -> R {
        let mut nav = self.lock();
        let result = f(&mut nav);
        self.publish(&nav);
        result
    }

    /// Replace the active list
    ///
    /// The current index is left as is; callers that need a consistent
    /// selection use [`replace_tracks`](Self::replace_tracks).
    pub fn set_tracks(&self, tracks: Vec<Track>) {
        self.update(|nav| {
            debug!(count = tracks.len(), "Track list replaced");
            nav.tracks = Arc::from(tracks);
            nav.list_version += 1;
            nav.shuffle = None;
        });
    }

    /// Replace the active list and re-derive the current index by identity
    ///
    /// The selection follows the current track into the new list; when the
    /// track is gone (or not playable there) nothing is selected and playback
    /// intent is cleared. Returns the new index.
    pub fn replace_tracks(&self, tracks: Vec<Track>) -> Option<usize> {
        self.update(|nav| {
            let current = nav.current_track();
            nav.tracks = Arc::from(tracks);
            nav.list_version += 1;
            nav.shuffle = None;

            let index = current
                .as_ref()
                .and_then(|track| nav.locate(track))
                .filter(|&index| nav.is_playable(index));
            nav.state.current_track_index = index;
            if index.is_none() {
                nav.state.is_playing = false;
            }

            debug!(count = nav.tracks.len(), index = ?index, "Track list replaced");
            index
        })
    }

    /// Shared handle to the active list
    pub fn tracks(&self) -> Arc<[Track]> {
        Arc::clone(&self.lock().tracks)
    }

    /// Number of tracks in the active list
    pub fn track_count(&self) -> usize {
        self.lock().tracks.len()
    }

    /// Position of `track` in the active list (by identity)
    pub fn index_of(&self, track: &Track) -> Option<usize> {
        self.lock().locate(track)
    }

    /// Current traversal order (shuffle permutation or natural order)
    pub fn traversal_order(&self) -> Vec<usize> {
        self.lock().traversal()
    }

    /// Replace the whole state
    ///
    /// An index that is out of range or points at an unplayable track is
    /// replaced with `None`. A changed shuffle key invalidates the cached
    /// permutation on next read.
    pub fn set_player_state(&self, mut state: PlayerState) {
        self.update(|nav| {
            if let Some(index) = state.current_track_index {
                if !nav.is_playable(index) {
                    warn!(index, count = nav.tracks.len(), "Ignoring index of missing or unplayable track");
                    state.current_track_index = None;
                }
            }
            nav.state = state;
        });
    }

    /// Snapshot of the player state
    pub fn player_state(&self) -> PlayerState {
        self.lock().state.clone()
    }

    /// Player state stream (replays the latest value)
    pub fn subscribe_player_state(&self) -> watch::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    /// Current track stream; only emits when the track identity changes
    pub fn subscribe_current_track(&self) -> watch::Receiver<Option<Track>> {
        self.current_tx.subscribe()
    }

    /// Track at the current index
    pub fn current_track(&self) -> Option<Track> {
        self.lock().current_track()
    }

    /// Advance to the next playable track
    ///
    /// Returns `None` when the end of the traversal is reached without loop,
    /// or when nothing in the list is playable; the state is unchanged then.
    pub fn next_track(&self) -> Option<Track> {
        let track = self.update(|nav| nav.step(Direction::Forward));
        debug!(track = ?track.as_ref().map(|t| &t.name), "Next track");
        track
    }

    /// Go back to the previous playable track
    pub fn previous_track(&self) -> Option<Track> {
        let track = self.update(|nav| nav.step(Direction::Backward));
        debug!(track = ?track.as_ref().map(|t| &t.name), "Previous track");
        track
    }

    /// Select the first playable track of the traversal order
    pub fn first_track(&self) -> Option<Track> {
        self.update(|nav| {
            let order = nav.traversal();
            if order.is_empty() {
                return None;
            }
            nav.scan(&order, 0, Direction::Forward)
        })
    }

    /// Select the track at `index` and mark the player as playing
    ///
    /// Returns `None` (and changes nothing) for unplayable or missing tracks.
    pub fn select_index(&self, index: usize) -> Option<Track> {
        self.update(|nav| {
            if !nav.is_playable(index) {
                return None;
            }
            nav.commit(index)
        })
    }

    /// Set playback intent
    pub fn set_playing(&self, playing: bool) {
        self.update(|nav| nav.state.is_playing = playing);
    }

    /// Turn shuffle on or off with the given key
    pub fn set_shuffle(&self, enabled: bool, key: impl Into<String>) {
        let key = key.into();
        self.update(|nav| {
            nav.state.is_shuffled = enabled;
            nav.state.shuffle_key = key;
        });
    }

    /// Turn looping on or off
    pub fn set_looped(&self, looped: bool) {
        self.update(|nav| nav.state.is_looped = looped);
    }
}
