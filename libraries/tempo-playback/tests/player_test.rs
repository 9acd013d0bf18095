//! Integration tests for the player
//!
//! Each test drives a real `Player` task against an element that loads
//! instantly, and checks what the UI would observe through the streams.

mod common;

use common::{eventually, silent_track, track, url, wait_for, within, AutoElement};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempo_playback::{
    JsonFileSettings, MemorySettings, PlaybackConfig, Player, SettingsStore, Severity,
    END_OF_PLAYLIST, NO_PREVIOUS_TRACK, PLAYBACK_ABANDONED, SETTING_VOLUME,
};

// ===== Test Helpers =====

fn config() -> PlaybackConfig {
    PlaybackConfig {
        load_timeout_ms: None,
        ..PlaybackConfig::default()
    }
}

fn start(element: &Arc<AutoElement>) -> (Player, MemorySettings) {
    let settings = MemorySettings::new();
    let player = Player::spawn(element.clone(), Arc::new(settings.clone()), config());
    (player, settings)
}

async fn wait_playing(player: &Player) {
    let mut audio = player.subscribe_audio();
    wait_for(&mut audio, |state| state.is_playing).await;
}

// ===== Track List =====

#[tokio::test]
async fn set_tracks_keeps_only_playable_tracks() {
    let element = AutoElement::new();
    let (player, _) = start(&element);

    let kept = player
        .set_tracks(vec![track("a"), silent_track("b"), track("c")])
        .await
        .unwrap();

    assert_eq!(kept, 2);
    let ids: Vec<_> = player.tracks().iter().map(|t| t.id.clone().unwrap()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn replacing_list_without_current_track_stops_playback() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a"), track("b")]).await.unwrap();
    player.play_playlist().await.unwrap();
    wait_playing(&player).await;

    player.set_tracks(vec![track("x")]).await.unwrap();

    let state = player.player_state();
    assert_eq!(state.current_track_index, None);
    assert!(!state.is_playing);
    assert!(player.current_track().is_none());
}

// ===== Playback Flow =====

#[tokio::test]
async fn playlist_starts_at_first_track() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a"), track("b")]).await.unwrap();
    let mut current = player.subscribe_current_track();

    let first = player.play_playlist().await.unwrap().unwrap();
    assert_eq!(first.id.as_deref(), Some("a"));

    let shown = wait_for(&mut current, Option::is_some).await;
    assert_eq!(shown.unwrap().id.as_deref(), Some("a"));

    wait_playing(&player).await;
    assert_eq!(element.loads(), vec![url("a")]);
    assert_eq!(player.audio_state().duration, 30.0);
}

#[tokio::test]
async fn end_of_playlist_stops_with_notice() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a"), track("c")]).await.unwrap();
    let mut notices = player.subscribe_notice();

    player.play_playlist().await.unwrap();
    eventually(|| element.play_count() == 1).await;
    element.finish();

    eventually(|| element.play_count() == 2).await;
    assert_eq!(element.loads(), vec![url("a"), url("c")]);
    element.finish();

    let notice = wait_for(&mut notices, Option::is_some).await.unwrap();
    assert_eq!(notice.message, END_OF_PLAYLIST);
    assert_eq!(notice.severity, Severity::Info);

    let state = player.player_state();
    assert!(!state.is_playing);
    assert_eq!(state.current_track_index, Some(1));
}

#[tokio::test]
async fn looped_playlist_wraps_after_last_track() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a"), track("c")]).await.unwrap();
    assert!(player.toggle_loop().await.unwrap());

    player.play_playlist().await.unwrap();
    for played in 1..=2 {
        eventually(|| element.play_count() == played).await;
        element.finish();
    }

    element.wait_loads(3).await;
    assert_eq!(element.loads(), vec![url("a"), url("c"), url("a")]);
    assert_eq!(player.player_state().current_track_index, Some(0));
    assert!(player.notice().is_none());
}

#[tokio::test]
async fn toggle_play_pauses_and_resumes_without_reloading() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a"), track("b")]).await.unwrap();
    let mut audio = player.subscribe_audio();

    // Nothing selected: starts the playlist
    assert!(player.toggle_play().await.unwrap());
    wait_for(&mut audio, |s| s.is_playing).await;

    assert!(!player.toggle_play().await.unwrap());
    wait_for(&mut audio, |s| !s.is_playing).await;
    assert!(!player.player_state().is_playing);

    assert!(player.toggle_play().await.unwrap());
    wait_for(&mut audio, |s| s.is_playing).await;
    assert_eq!(element.loads(), vec![url("a")]);
}

#[tokio::test]
async fn seek_moves_position() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a")]).await.unwrap();
    player.play_playlist().await.unwrap();
    wait_playing(&player).await;

    player.seek_to(12.5).await.unwrap();

    let mut audio = player.subscribe_audio();
    wait_for(&mut audio, |s| s.current_time == 12.5).await;
}

// ===== Selection and Navigation =====

#[tokio::test]
async fn selecting_track_uses_position_among_playable_tracks() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player
        .set_tracks(vec![track("a"), silent_track("b"), track("c")])
        .await
        .unwrap();

    assert!(player.select_track(track("c")).await.unwrap());

    let state = player.player_state();
    assert_eq!(state.current_track_index, Some(1));
    assert!(state.is_playing);
    wait_playing(&player).await;
    assert_eq!(element.loads(), vec![url("c")]);
}

#[tokio::test]
async fn selecting_unplayable_track_warns_and_keeps_index() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a"), track("c")]).await.unwrap();
    player.select_track(track("a")).await.unwrap();

    assert!(!player.select_track(silent_track("b")).await.unwrap());

    let notice = player.notice().unwrap();
    assert_eq!(notice.severity, Severity::Warning);
    assert_eq!(notice.message, "No preview URL available for track: B");
    assert_eq!(player.player_state().current_track_index, Some(0));
}

#[tokio::test]
async fn navigation_past_either_end_emits_info() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a")]).await.unwrap();
    player.select_track(track("a")).await.unwrap();

    assert!(player.next_track().await.unwrap().is_none());
    assert_eq!(player.notice().unwrap().message, END_OF_PLAYLIST);

    assert!(player.previous_track().await.unwrap().is_none());
    let notice = player.notice().unwrap();
    assert_eq!(notice.message, NO_PREVIOUS_TRACK);
    assert_eq!(notice.severity, Severity::Info);

    player.clear_error().await.unwrap();
    assert!(player.notice().is_none());
    assert_eq!(player.player_state().current_track_index, Some(0));
}

#[tokio::test]
async fn shuffle_toggle_draws_fresh_key() {
    let element = AutoElement::new();
    let (player, _) = start(&element);

    assert!(player.toggle_shuffle().await.unwrap());
    let first_key = player.player_state().shuffle_key;
    assert_eq!(first_key.len(), 16);

    assert!(!player.toggle_shuffle().await.unwrap());
    assert_eq!(player.player_state().shuffle_key, "");

    player.toggle_shuffle().await.unwrap();
    assert_ne!(player.player_state().shuffle_key, first_key);
}

#[tokio::test]
async fn shuffled_loop_visits_each_track_once() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    let ids = ["a", "b", "c", "d", "e", "f"];
    player
        .set_tracks(ids.iter().map(|id| track(id)).collect())
        .await
        .unwrap();
    player.toggle_shuffle().await.unwrap();
    player.toggle_loop().await.unwrap();

    let mut visited = Vec::new();
    for _ in 0..ids.len() {
        let next = player.next_track().await.unwrap().unwrap();
        visited.push(next.id.unwrap());
    }

    let unique: HashSet<_> = visited.iter().collect();
    assert_eq!(unique.len(), ids.len());
}

// ===== Error Recovery =====

#[tokio::test]
async fn failed_track_is_skipped() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player
        .set_tracks(vec![track("broken-1"), track("a")])
        .await
        .unwrap();

    player.play_playlist().await.unwrap();

    eventually(|| element.play_count() == 1).await;
    assert_eq!(element.loads(), vec![url("broken-1"), url("a")]);
    assert_eq!(player.player_state().current_track_index, Some(1));
    assert!(player.notice().is_none());
}

#[tokio::test]
async fn playback_is_abandoned_after_every_track_failed() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player
        .set_tracks(vec![track("broken-1"), track("broken-2"), track("broken-3")])
        .await
        .unwrap();
    player.toggle_loop().await.unwrap();
    let mut notices = player.subscribe_notice();

    player.play_playlist().await.unwrap();

    let notice = wait_for(&mut notices, Option::is_some).await.unwrap();
    assert_eq!(notice.message, PLAYBACK_ABANDONED);
    assert_eq!(notice.severity, Severity::Error);
    assert!(!player.player_state().is_playing);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(element.loads().len(), 3);
    assert_eq!(element.play_count(), 0);
}

#[tokio::test]
async fn configured_failure_cap_is_respected() {
    let element = AutoElement::new();
    let player = Player::spawn(
        element.clone(),
        Arc::new(MemorySettings::new()),
        PlaybackConfig {
            max_consecutive_failures: Some(1),
            ..config()
        },
    );
    player
        .set_tracks(vec![track("broken-1"), track("a")])
        .await
        .unwrap();
    let mut notices = player.subscribe_notice();

    player.play_playlist().await.unwrap();

    let notice = wait_for(&mut notices, Option::is_some).await.unwrap();
    assert_eq!(notice.message, PLAYBACK_ABANDONED);
    assert_eq!(element.loads(), vec![url("broken-1")]);
}

#[tokio::test]
async fn rejected_play_skips_to_next_track() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player
        .set_tracks(vec![track("blocked-1"), track("a")])
        .await
        .unwrap();

    player.play_playlist().await.unwrap();

    eventually(|| element.play_count() == 1).await;
    assert_eq!(element.rejected_count(), 1);
    assert_eq!(element.loads(), vec![url("blocked-1"), url("a")]);
    assert_eq!(player.player_state().current_track_index, Some(1));
    assert!(player.player_state().is_playing);
    assert!(player.notice().is_none());
}

#[tokio::test]
async fn playback_is_abandoned_when_every_play_is_rejected() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player
        .set_tracks(vec![track("blocked-1"), track("blocked-2")])
        .await
        .unwrap();
    player.toggle_loop().await.unwrap();
    let mut notices = player.subscribe_notice();

    player.play_playlist().await.unwrap();

    let notice = wait_for(&mut notices, Option::is_some).await.unwrap();
    assert_eq!(notice.message, PLAYBACK_ABANDONED);
    assert_eq!(notice.severity, Severity::Error);
    assert!(!player.player_state().is_playing);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(element.loads(), vec![url("blocked-1"), url("blocked-2")]);
    assert_eq!(element.rejected_count(), 2);
    assert_eq!(element.play_count(), 0);
}

// ===== Volume =====

#[tokio::test]
async fn volume_is_clamped_and_persisted() {
    let element = AutoElement::new();
    let (player, settings) = start(&element);
    assert_eq!(player.volume(), 30);

    assert_eq!(player.set_volume(150.0).await.unwrap(), 100);
    assert_eq!(settings.get(SETTING_VOLUME).unwrap().as_deref(), Some("100"));

    assert_eq!(player.set_volume(-5.0).await.unwrap(), 0);
    assert_eq!(settings.get(SETTING_VOLUME).unwrap().as_deref(), Some("0"));

    assert_eq!(player.set_volume(42.6).await.unwrap(), 43);

    // Let the store's own change notifications drain
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(player.volume(), 43);
    assert_eq!(player.audio_state().volume, 43);
}

#[tokio::test]
async fn stored_volume_is_read_at_startup() {
    let element = AutoElement::new();
    let settings = MemorySettings::new();
    settings.set(SETTING_VOLUME, "80").unwrap();

    let player = Player::spawn(element.clone(), Arc::new(settings), config());

    assert_eq!(player.volume(), 80);
    assert_eq!(player.audio_state().volume, 80);
}

#[tokio::test]
async fn volume_changed_elsewhere_is_observed() {
    let element = AutoElement::new();
    let (player, settings) = start(&element);
    let mut volume = player.subscribe_volume();
    let other_tab = settings.clone();

    other_tab.set(SETTING_VOLUME, "64").unwrap();
    wait_for(&mut volume, |v| *v == 64).await;

    other_tab.set(SETTING_VOLUME, "not a number").unwrap();
    wait_for(&mut volume, |v| *v == 30).await;
}

#[tokio::test]
async fn volume_file_edits_are_picked_up_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let settings = Arc::new(JsonFileSettings::open(&path).unwrap());

    let element = AutoElement::new();
    let player = Player::spawn(element.clone(), settings.clone(), config());
    let mut volume = player.subscribe_volume();

    assert_eq!(player.set_volume(55.0).await.unwrap(), 55);
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("\"55\""));

    std::fs::write(&path, r#"{ "audio.volume": "12" }"#).unwrap();
    assert_eq!(settings.reload().unwrap(), 1);
    wait_for(&mut volume, |v| *v == 12).await;
}

#[tokio::test]
async fn watched_volume_file_edits_reach_the_player() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let settings = Arc::new(JsonFileSettings::open(&path).unwrap());
    let _watcher = settings.watch(Duration::from_millis(50)).unwrap();

    let element = AutoElement::new();
    let player = Player::spawn(element.clone(), settings.clone(), config());
    let mut volume = player.subscribe_volume();

    std::fs::write(&path, r#"{ "audio.volume": "64" }"#).unwrap();

    let observed = tokio::time::timeout(Duration::from_secs(10), volume.wait_for(|v| *v == 64))
        .await
        .expect("edit not observed")
        .is_ok();
    assert!(observed);
}

// ===== Lifecycle =====

#[tokio::test]
async fn shutdown_closes_streams() {
    let element = AutoElement::new();
    let (player, _) = start(&element);
    player.set_tracks(vec![track("a")]).await.unwrap();
    let mut notices = player.subscribe_notice();

    within(player.shutdown()).await.unwrap();

    assert!(within(notices.changed()).await.is_err());
}
