//! CLI configuration
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempo_playback::PlaybackConfig;

const DEFAULT_CONFIG_FILE: &str = "tempo.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    /// JSON file holding the persisted volume
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// Reload the settings file when another process edits it
    #[serde(default = "default_watch_settings")]
    pub watch_settings: bool,

    /// Debounce window for settings file events
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

/// Behaviour of the simulated audio element
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Time between assigning a source and it becoming playable
    #[serde(default = "default_load_delay_ms")]
    pub load_delay_ms: u64,

    /// Interval between position updates
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Length of every preview clip in seconds
    #[serde(default = "default_clip_seconds")]
    pub clip_seconds: f64,

    /// Playback speed relative to real time
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("tempo-settings.json")
}

fn default_watch_settings() -> bool {
    true
}

fn default_watch_debounce_ms() -> u64 {
    200
}

fn default_load_delay_ms() -> u64 {
    150
}

fn default_tick_ms() -> u64 {
    250
}

fn default_clip_seconds() -> f64 {
    30.0
}

fn default_speed() -> f64 {
    10.0
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            watch_settings: default_watch_settings(),
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            load_delay_ms: default_load_delay_ms(),
            tick_ms: default_tick_ms(),
            clip_seconds: default_clip_seconds(),
            speed: default_speed(),
        }
    }
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// Reads `path` (required when given) or `tempo.toml` in the working
    /// directory (optional), then applies `TEMPO_*` environment overrides with
    /// `__` between nesting levels, e.g. `TEMPO_PLAYBACK__DEFAULT_VOLUME=50`.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("TEMPO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        settings.build()?.try_deserialize()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.playback.default_volume > 100 {
            return Err(format!(
                "playback.default_volume must be 0-100, got {}",
                self.playback.default_volume
            ));
        }
        if self.simulation.tick_ms == 0 {
            return Err("simulation.tick_ms must be greater than zero".to_string());
        }
        if !(self.simulation.speed.is_finite() && self.simulation.speed > 0.0) {
            return Err(format!(
                "simulation.speed must be a positive number, got {}",
                self.simulation.speed
            ));
        }
        if !(self.simulation.clip_seconds.is_finite() && self.simulation.clip_seconds > 0.0) {
            return Err(format!(
                "simulation.clip_seconds must be a positive number, got {}",
                self.simulation.clip_seconds
            ));
        }
        Ok(())
    }
}
