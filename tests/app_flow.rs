// App orchestration in visual-only mode: segment install, timed advance,
// stale-event guards, toggles, pause, keybindings and overlays.

use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use emoviz::action::Action;
use emoviz::app::{App, AppOptions};
use emoviz::config::Config;
use emoviz::data::{SegmentRecord, SegmentSet};
use emoviz::player::slot::SlotState;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn test_app() -> App {
    let options = AppOptions {
        visual_only: true,
        seed: Some(11),
        ..Default::default()
    };
    App::new(Config::default(), options).unwrap()
}

fn record(file: &str, speaker: usize, emotions: &[&str], duration_ms: u64) -> SegmentRecord {
    SegmentRecord {
        file: file.to_string(),
        speaker: Some(speaker),
        emotions: emotions.iter().map(|s| s.to_string()).collect(),
        duration_ms: Some(duration_ms),
        ..Default::default()
    }
}

fn three_segments() -> SegmentSet {
    SegmentSet::new(vec![
        record("1.mp3", 0, &["joy"], 500),
        record("2.mp3", 1, &["fear", "anger"], 500),
        record("3.mp3", 0, &["sadness"], 500),
    ])
}

/// App with three segments loaded and the first one playing.
async fn loaded_app() -> App {
    let mut app = test_app();
    app.handle_action(Action::SegmentsLoaded {
        load_id: 0,
        set: three_segments(),
    })
    .await
    .unwrap();
    app.flush_actions().await;
    app
}

fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
}

async fn press(app: &mut App, c: char) {
    app.handle_key(key(c)).unwrap();
    app.flush_actions().await;
}

// ── Segment install & sequencing ────────────────────────────────────────────

#[tokio::test]
async fn test_visual_only_app_has_no_player() {
    let app = test_app();
    assert!(app.is_visual_only());
    assert!(app.is_running());
    assert_eq!(app.slot.state(), SlotState::Idle);
}

#[tokio::test]
async fn test_loaded_segments_start_first_segment() {
    let app = loaded_app().await;
    assert_eq!(app.queue.len(), 3);
    assert_eq!(app.queue.current_index(), Some(0));
    assert_eq!(app.slot.state(), SlotState::Playing);

    let active = app.session.segment().unwrap();
    assert_eq!(active.id, app.slot.segment_id());
    assert_eq!(active.record.file, "1.mp3");
    assert_eq!(app.session.blobs()[0].emotions, vec!["joy"]);
}

#[tokio::test]
async fn test_stale_segment_load_is_dropped() {
    let mut app = test_app();
    app.handle_action(Action::SegmentsLoaded {
        load_id: 7,
        set: three_segments(),
    })
    .await
    .unwrap();
    assert!(app.queue.is_empty());
    assert!(app.session.segment().is_none());
}

#[tokio::test]
async fn test_next_and_prev_segment() {
    let mut app = loaded_app().await;
    app.handle_action(Action::NextSegment).await.unwrap();
    app.flush_actions().await;
    assert_eq!(app.queue.current_index(), Some(1));
    assert_eq!(app.session.blobs()[1].emotions, vec!["fear", "anger"]);

    app.handle_action(Action::PrevSegment).await.unwrap();
    app.flush_actions().await;
    assert_eq!(app.queue.current_index(), Some(0));
}

#[tokio::test]
async fn test_finish_from_replaced_segment_is_ignored() {
    let mut app = loaded_app().await;
    let first = app.slot.segment_id();
    app.handle_action(Action::NextSegment).await.unwrap();
    app.flush_actions().await;

    app.handle_action(Action::PlaybackFinished { segment_id: first })
        .await
        .unwrap();
    assert_eq!(app.queue.current_index(), Some(1));
    assert_eq!(app.slot.state(), SlotState::Playing);
}

#[tokio::test]
async fn test_audio_levels_for_replaced_segment_are_ignored() {
    let mut app = loaded_app().await;
    let first = app.slot.segment_id();
    app.handle_action(Action::NextSegment).await.unwrap();
    app.flush_actions().await;

    app.handle_action(Action::AudioLevels {
        segment_id: first,
        rms: 1.0,
        peak: 1.0,
        zero_crossing_rate: 0.1,
    })
    .await
    .unwrap();
    assert!(app.session.blobs().iter().all(|b| b.audio_level() == 0.0));
}

#[tokio::test(start_paused = true)]
async fn test_timed_segment_advances_after_duration() {
    let mut app = loaded_app().await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    app.flush_actions().await;
    assert_eq!(app.queue.current_index(), Some(1));
    assert_eq!(app.slot.state(), SlotState::Playing);
}

#[tokio::test]
async fn test_failed_segment_is_marked_and_skipped() {
    let mut app = loaded_app().await;
    let id = app.slot.segment_id();
    app.handle_action(Action::PlaybackFailed {
        segment_id: id,
        error: "no such file".to_string(),
    })
    .await
    .unwrap();
    app.flush_actions().await;

    assert!(app.queue.is_failed(0));
    assert_eq!(app.queue.current_index(), Some(1));
    assert_eq!(app.error_message.as_deref(), Some("no such file"));
}

// ── Toggles & pause ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toggles_survive_segment_changes() {
    let mut app = loaded_app().await;
    assert!(!app.session.connect_blobs());
    press(&mut app, 'c').await;
    assert!(app.session.connect_blobs());

    press(&mut app, 'v').await;
    assert!(!app.session.volume_effects());

    press(&mut app, 'n').await;
    assert_eq!(app.queue.current_index(), Some(1));
    assert!(app.session.connect_blobs());
    assert!(!app.session.volume_effects());
}

#[tokio::test]
async fn test_emotion_amount_steps_and_clamps() {
    let mut app = loaded_app().await;
    assert_eq!(app.session.emotion_char_amount(), 50.0);
    press(&mut app, '+').await;
    assert_eq!(app.session.emotion_char_amount(), 75.0);
    for _ in 0..10 {
        press(&mut app, '=').await;
    }
    assert_eq!(app.session.emotion_char_amount(), 200.0);
    for _ in 0..10 {
        press(&mut app, '-').await;
    }
    assert_eq!(app.session.emotion_char_amount(), 0.0);
}

#[tokio::test]
async fn test_audio_grid_toggle() {
    let mut app = loaded_app().await;
    assert!(!app.session.audio_driven_grid());
    press(&mut app, 'g').await;
    assert!(app.session.audio_driven_grid());
}

#[tokio::test]
async fn test_pause_freezes_ticks_and_navigation_unpauses() {
    let mut app = loaded_app().await;
    press(&mut app, ' ').await;
    assert!(app.session.is_paused());

    let ticks = app.session.tick_count();
    app.handle_action(Action::Tick).await.unwrap();
    assert_eq!(app.session.tick_count(), ticks);

    press(&mut app, 'n').await;
    assert!(!app.session.is_paused());
    app.handle_action(Action::Tick).await.unwrap();
    assert_eq!(app.session.tick_count(), ticks + 1);
}

// ── External updates ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_parameter_push_applies_to_active_segment() {
    let mut app = loaded_app().await;
    let set = serde_json::from_str(r#"{"blobStrength": 640}"#).unwrap();
    app.handle_action(Action::ParametersChanged(set)).await.unwrap();
    assert_eq!(app.session.blobs()[0].base.strength, 640.0);
}

#[tokio::test]
async fn test_emotion_update_recolors_speaker() {
    let mut app = loaded_app().await;
    let update = emoviz::viz::emotion::EmotionConfigUpdate::from_json(
        r#"{"emotionColorMap": {"joy": [9, 8, 7]}}"#,
    )
    .unwrap();
    app.handle_action(Action::EmotionConfigChanged(update))
        .await
        .unwrap();
    assert_eq!(app.session.blobs()[0].display_colors, vec![[9, 8, 7]]);
}

// ── Keys, help & errors ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_help_overlay_swallows_next_key() {
    let mut app = test_app();
    press(&mut app, '?').await;
    assert!(app.show_help);

    press(&mut app, 'q').await;
    assert!(!app.show_help);
    assert!(app.is_running());
}

#[tokio::test]
async fn test_quit_key_stops_app() {
    let mut app = test_app();
    press(&mut app, 'q').await;
    assert!(!app.is_running());
}

#[tokio::test]
async fn test_ctrl_c_quits() {
    let mut app = test_app();
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
        .unwrap();
    app.flush_actions().await;
    assert!(!app.is_running());
}

#[tokio::test]
async fn test_error_shown_and_cleared_with_esc() {
    let mut app = test_app();
    app.action_sender()
        .send(Action::ShowError("boom".to_string()))
        .unwrap();
    app.flush_actions().await;
    assert_eq!(app.error_message.as_deref(), Some("boom"));

    app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE))
        .unwrap();
    app.flush_actions().await;
    assert!(app.error_message.is_none());
}

#[tokio::test]
async fn test_reload_without_emotions_config_reports_error() {
    let mut app = test_app();
    press(&mut app, 'r').await;
    assert!(app.error_message.is_some());
}
