//! Settings store
//!
//! Key-value preferences with change notifications. The player keeps only the
//! output volume here, under [`SETTING_VOLUME`]. Values are stored as strings
//! and every write, from any handle, is announced to all subscribers.
//!
//! # Example
//!
//! ```
//! use tempo_playback::settings::{read_volume, MemorySettings, SettingsStore, SETTING_VOLUME};
//!
//! let store = MemorySettings::new();
//! assert_eq!(read_volume(&store, 30), 30);
//!
//! store.set(SETTING_VOLUME, "55").unwrap();
//! assert_eq!(read_volume(&store, 30), 55);
//! ```

use crate::error::SettingsError;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Output volume (0-100)
pub const SETTING_VOLUME: &str = "audio.volume";

const CHANGE_CAPACITY: usize = 64;

type Result<T> = std::result::Result<T, SettingsError>;

/// A stored value changed (`value` is `None` when the key was removed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    pub key: String,
    pub value: Option<String>,
}

/// Persistent preferences
pub trait SettingsStore: Send + Sync {
    /// Stored value of `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` and notify subscribers
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Subscribe to changes
    fn subscribe(&self) -> broadcast::Receiver<SettingChange>;
}

/// Parse a stored volume
///
/// Numeric values are rounded and clamped to 0-100; missing or non-numeric
/// values give `default`.
pub fn parse_volume(value: Option<&str>, default: u8) -> u8 {
    value
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|volume| volume.is_finite())
        .map_or(default, |volume| volume.round().clamp(0.0, 100.0) as u8)
}

/// Read the stored volume, falling back to `default` on errors
pub fn read_volume(store: &dyn SettingsStore, default: u8) -> u8 {
    match store.get(SETTING_VOLUME) {
        Ok(value) => parse_volume(value.as_deref(), default),
        Err(e) => {
            warn!(error = %e, "Failed to read stored volume");
            default
        }
    }
}

/// In-process settings shared by every clone
///
/// Clones behave like browser tabs on one origin: a write through any of them
/// reaches every subscriber.
#[derive(Clone)]
pub struct MemorySettings {
    values: Arc<Mutex<HashMap<String, String>>>,
    changes: broadcast::Sender<SettingChange>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySettings {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            values: Arc::new(Mutex::new(HashMap::new())),
            changes,
        }
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        let _ = self.changes.send(SettingChange {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}

/// Settings kept in a JSON object file
///
/// The file is read on open and rewritten on every `set`. Writes made by other
/// processes become visible through [`reload`](Self::reload), either called
/// directly or by a [`watch`](Self::watch) on the file.
pub struct JsonFileSettings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
    changes: broadcast::Sender<SettingChange>,
}

impl JsonFileSettings {
    /// Open `path`; a missing file is an empty store
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = read_file(&path)?;
        debug!(path = %path.display(), count = values.len(), "Opened settings file");

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self {
            path,
            values: Mutex::new(values),
            changes,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and announce every key that changed
    ///
    /// Returns the number of changed keys.
    pub fn reload(&self) -> Result<usize> {
        let fresh = read_file(&self.path)?;
        let mut values = self.values();

        let mut changed: Vec<SettingChange> = fresh
            .iter()
            .filter(|(key, value)| values.get(*key) != Some(*value))
            .map(|(key, value)| SettingChange {
                key: key.clone(),
                value: Some(value.clone()),
            })
            .collect();
        changed.extend(
            values
                .keys()
                .filter(|key| !fresh.contains_key(*key))
                .map(|key| SettingChange {
                    key: key.clone(),
                    value: None,
                }),
        );

        *values = fresh;
        drop(values);

        debug!(path = %self.path.display(), changed = changed.len(), "Reloaded settings file");
        let count = changed.len();
        for change in changed {
            let _ = self.changes.send(change);
        }
        Ok(count)
    }

    /// Reload whenever the file changes on disk
    ///
    /// Events are debounced by `debounce`. The parent directory is watched so
    /// editors that replace the file are noticed too. Watching stops when the
    /// returned [`SettingsWatcher`] is dropped; it does not keep the store alive.
    pub fn watch(self: &Arc<Self>, debounce: Duration) -> Result<SettingsWatcher> {
        let directory = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        std::fs::create_dir_all(&directory)?;

        let file_name = self.path.file_name().map(ToOwned::to_owned);
        let store = Arc::downgrade(self);

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let touched = events.iter().any(|event| {
                        event
                            .event
                            .paths
                            .iter()
                            .any(|path| path.file_name() == file_name.as_deref())
                    });
                    if touched {
                        reload_from_watch(&store);
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!(error = %e, "Settings watcher error");
                    }
                }
            }
        })?;
        debouncer.watch(&directory, RecursiveMode::NonRecursive)?;

        info!(path = %self.path.display(), "Watching settings file");
        Ok(SettingsWatcher { debouncer })
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values();
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*values)?;
        std::fs::write(&self.path, json)?;
        drop(values);

        let _ = self.changes.send(SettingChange {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}

/// Active watch on a [`JsonFileSettings`] file
pub struct SettingsWatcher {
    // Owns the OS watcher; dropping it ends the watch
    #[allow(dead_code)]
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

fn reload_from_watch(store: &Weak<JsonFileSettings>) {
    let Some(store) = store.upgrade() else {
        return;
    };
    match store.reload() {
        Ok(0) => {}
        Ok(changed) => debug!(changed, "Settings file changed on disk"),
        // Half-written files parse again once the writer finishes
        Err(e) => warn!(error = %e, path = %store.path.display(), "Failed to reload settings file"),
    }
}

fn read_file(path: &Path) -> Result<BTreeMap<String, String>> {
    match std::fs::read_to_string(path) {
        Ok(json) => Ok(serde_json::from_str(&json)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}
