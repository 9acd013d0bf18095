//! Tempo CLI - drive the playback engine from the terminal

mod config;
mod simulated;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use crate::config::CliConfig;
use crate::simulated::SimulatedElement;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{Catalog, Track};
use tempo_playback::{
    shuffled_indices, JsonFileSettings, Player, Severity, END_OF_PLAYLIST,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tempo-cli")]
#[command(about = "Tempo playback engine on a simulated audio device", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./tempo.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play the catalog's playlist until it ends or Ctrl-C
    Play {
        /// Catalog JSON file
        catalog: PathBuf,
        /// Start with shuffle on
        #[arg(long)]
        shuffle: bool,
        /// Start with loop on
        #[arg(long = "loop")]
        looped: bool,
        /// Start at the track with this id or URI
        #[arg(long)]
        track: Option<String>,
        /// Set and persist the volume (0-100) before playing
        #[arg(long)]
        volume: Option<f64>,
    },
    /// List the playlist's tracks
    Tracks {
        /// Catalog JSON file
        catalog: PathBuf,
    },
    /// Print the seeded shuffle order for a list length
    Shuffle {
        /// Number of tracks
        length: usize,
        /// Shuffle key
        seed: String,
    },
}

struct PlayOptions {
    shuffle: bool,
    looped: bool,
    track: Option<String>,
    volume: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempo_cli=info,tempo_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            catalog,
            shuffle,
            looped,
            track,
            volume,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let options = PlayOptions {
                shuffle,
                looped,
                track,
                volume,
            };
            play(config, &catalog, options).await?;
        }
        Commands::Tracks { catalog } => {
            list_tracks(&catalog)?;
        }
        Commands::Shuffle { length, seed } => {
            let order: Vec<String> = shuffled_indices(length, &seed)
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("{}", order.join(" "));
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CliConfig> {
    let config = CliConfig::load(path).context("Failed to load configuration")?;
    config.validate().map_err(|e| anyhow!("Invalid configuration: {e}"))?;
    Ok(config)
}

fn load_catalog(path: &Path) -> anyhow::Result<Catalog> {
    Catalog::from_path(path).with_context(|| format!("Failed to load catalog {}", path.display()))
}

fn list_tracks(path: &Path) -> anyhow::Result<()> {
    let catalog = load_catalog(path)?;
    let playlist = &catalog.discover_weekly;

    println!("{} ({} tracks)", playlist.name, playlist.tracks.items.len());
    for (position, track) in catalog.tracks().iter().enumerate() {
        let marker = if track.is_playable() { ' ' } else { '-' };
        println!(
            "{marker} {:>3}. {} - {} [{}]",
            position + 1,
            track.display_name(),
            track.artist_names(),
            track.identity().unwrap_or("?")
        );
    }
    println!("Tracks marked '-' have no preview and are skipped.");

    Ok(())
}

async fn play(config: CliConfig, catalog_path: &Path, options: PlayOptions) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog_path)?;
    tracing::info!(
        user = %catalog.user.display_name,
        playlist = %catalog.discover_weekly.name,
        "Catalog loaded"
    );

    let settings = Arc::new(
        JsonFileSettings::open(&config.storage.settings_path).with_context(|| {
            format!(
                "Failed to open settings {}",
                config.storage.settings_path.display()
            )
        })?,
    );
    // Held until playback ends; dropping it stops the watch
    let _watcher = if config.storage.watch_settings {
        let debounce = Duration::from_millis(config.storage.watch_debounce_ms);
        Some(settings.watch(debounce).context("Failed to watch settings file")?)
    } else {
        None
    };

    let element = Arc::new(SimulatedElement::new(config.simulation.clone()));
    let player = Player::spawn(element, settings, config.playback.clone());

    let kept = player.set_tracks(catalog.tracks()).await?;
    if kept == 0 {
        bail!("{} has no playable tracks", catalog.discover_weekly.name);
    }

    if options.shuffle {
        player.toggle_shuffle().await?;
    }
    if options.looped {
        player.toggle_loop().await?;
    }
    if let Some(volume) = options.volume {
        let applied = player.set_volume(volume).await?;
        tracing::info!(volume = applied, "Volume set");
    }

    match options.track {
        Some(id) => {
            let track = find_track(&catalog, &id)?;
            if !player.select_track(track).await? {
                bail!("Track {id} cannot be played");
            }
        }
        None => {
            player.play_playlist().await?;
        }
    }

    let result = watch_playback(&player).await;
    player.shutdown().await?;
    result
}

fn find_track(catalog: &Catalog, id: &str) -> anyhow::Result<Track> {
    catalog
        .tracks()
        .into_iter()
        .find(|track| track.identity() == Some(id))
        .ok_or_else(|| anyhow!("No track with id {id} in the catalog"))
}

/// Print what the player does until the playlist ends, fails or Ctrl-C
async fn watch_playback(player: &Player) -> anyhow::Result<()> {
    let mut current = player.subscribe_current_track();
    let mut notices = player.subscribe_notice();
    let mut audio = player.subscribe_audio();
    let mut volume = player.subscribe_volume();

    if let Some(track) = current.borrow_and_update().as_ref() {
        print_track(track, *volume.borrow());
    }
    let mut last_second = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            Ok(()) = current.changed() => {
                if let Some(track) = current.borrow_and_update().as_ref() {
                    print_track(track, *volume.borrow());
                }
                last_second = 0;
            }
            Ok(()) = audio.changed() => {
                let state = audio.borrow_and_update().clone();
                let second = state.current_time as u64;
                if state.is_playing && second >= last_second + 5 {
                    last_second = second;
                    println!("    {:>5.1}s / {:.1}s", state.current_time, state.duration);
                }
            }
            Ok(()) = volume.changed() => {
                println!("    volume {}", *volume.borrow_and_update());
            }
            Ok(()) = notices.changed() => {
                let Some(notice) = notices.borrow_and_update().clone() else {
                    continue;
                };
                println!("[{:?}] {}", notice.severity, notice.message);

                match notice.severity {
                    Severity::Error => bail!("{}", notice.message),
                    Severity::Info if notice.message == END_OF_PLAYLIST => break,
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

fn print_track(track: &Track, volume: u8) {
    println!(
        "> {} - {} (vol {volume})",
        track.display_name(),
        track.artist_names()
    );
}
