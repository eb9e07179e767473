// Playback slot state machine, segment queue sequencing and player process
// lifecycle.

use std::time::Duration;

use emoviz::action::Action;
use emoviz::data::{SegmentRecord, SegmentSet};
use emoviz::player::MpvPlayer;
use emoviz::player::queue::SegmentQueue;
use emoviz::player::slot::{PlaybackSlot, SlotEvent, SlotState, TransitionError};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn set(n: usize) -> SegmentSet {
    SegmentSet::new(
        (1..=n)
            .map(|i| SegmentRecord::fallback(&format!("{}.mp3", i)))
            .collect(),
    )
}

fn queue(n: usize, repeat: bool) -> SegmentQueue {
    let mut q = SegmentQueue::new();
    q.set_repeat(repeat);
    q.load(set(n));
    q
}

// ── Slot ────────────────────────────────────────────────────────────────────

#[test]
fn test_slot_full_lifecycle() {
    let mut slot = PlaybackSlot::new();
    assert_eq!(slot.state(), SlotState::Idle);

    let id = slot.begin();
    assert_eq!(slot.state(), SlotState::Loading);
    assert_eq!(slot.handle(id, SlotEvent::Loaded), Ok(SlotState::Ready));
    assert_eq!(slot.handle(id, SlotEvent::Started), Ok(SlotState::Playing));
    assert_eq!(slot.handle(id, SlotEvent::Finished), Ok(SlotState::Ended));
    assert!(slot.state().is_terminal());
}

#[test]
fn test_slot_events_for_replaced_segment_are_stale() {
    let mut slot = PlaybackSlot::new();
    let old = slot.begin();
    let new = slot.begin();
    assert_eq!(
        slot.handle(old, SlotEvent::Finished),
        Err(TransitionError::Stale { got: old, current: new })
    );
    assert_eq!(slot.state(), SlotState::Loading);
    assert!(!slot.is_current(old));
    assert!(slot.is_current(new));
}

#[test]
fn test_slot_rejects_out_of_order_events() {
    let mut slot = PlaybackSlot::new();
    let id = slot.begin();
    assert!(matches!(
        slot.handle(id, SlotEvent::Finished),
        Err(TransitionError::Invalid { from: SlotState::Loading, .. })
    ));
    slot.handle(id, SlotEvent::Failed).unwrap();
    assert!(matches!(
        slot.handle(id, SlotEvent::Started),
        Err(TransitionError::Invalid { from: SlotState::Failed, .. })
    ));
}

#[test]
fn test_slot_reset_invalidates_in_flight_segment() {
    let mut slot = PlaybackSlot::new();
    let id = slot.begin();
    slot.reset();
    assert_eq!(slot.state(), SlotState::Idle);
    assert!(slot.handle(id, SlotEvent::Loaded).is_err());
}

// ── Queue ───────────────────────────────────────────────────────────────────

#[test]
fn test_queue_starts_at_first_segment() {
    let q = queue(3, false);
    assert_eq!(q.current_index(), Some(0));
    assert_eq!(q.current().map(|r| r.file.as_str()), Some("1.mp3"));
}

#[test]
fn test_queue_stops_at_end_without_repeat() {
    let mut q = queue(2, false);
    assert!(q.advance().is_some());
    assert!(q.advance().is_none());
    assert_eq!(q.current_index(), Some(1));
}

#[test]
fn test_queue_wraps_with_repeat() {
    let mut q = queue(2, true);
    q.advance();
    assert_eq!(q.advance().map(|r| r.file.as_str()), Some("1.mp3"));
}

#[test]
fn test_queue_skips_failed_segments_both_ways() {
    let mut q = queue(4, false);
    q.mark_failed(1);
    q.mark_failed(2);
    assert_eq!(q.advance().map(|r| r.file.as_str()), Some("4.mp3"));
    assert_eq!(q.prev().map(|r| r.file.as_str()), Some("1.mp3"));
    assert!(q.prev().is_none());
}

#[test]
fn test_queue_all_failed_stops() {
    let mut q = queue(3, true);
    for i in 0..3 {
        q.mark_failed(i);
    }
    assert!(q.advance().is_none());
}

#[test]
fn test_queue_load_clears_failures() {
    let mut q = queue(2, false);
    q.mark_failed(1);
    q.load(set(2));
    assert!(!q.is_failed(1));
    assert_eq!(q.jump(1).map(|r| r.file.as_str()), Some("2.mp3"));
    assert!(q.jump(5).is_none());
}

// ── Player process ──────────────────────────────────────────────────────────

/// A stand-in for mpv that ignores its arguments and exits cleanly after a
/// second.
#[cfg(unix)]
fn fake_player(dir: &std::path::Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-mpv");
    std::fs::write(&path, "#!/bin/sh\nsleep 1\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn test_back_to_back_segments_report_only_the_last_exit() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_player(dir.path());
    let audio = dir.path().join("1.mp3");
    std::fs::write(&audio, b"").unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut player = MpvPlayer::new(&binary.to_string_lossy());
    player.socket_path = dir.path().join("mpv.sock");
    player.set_action_tx(tx);

    // Long enough between starts for earlier exit monitors to poll the
    // next segment's process.
    for segment_id in 1..=4 {
        player.play(segment_id, &audio).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let exits = tokio::time::timeout(Duration::from_secs(5), async {
        let mut exits = Vec::new();
        while let Some(action) = rx.recv().await {
            let id = match action {
                Action::PlaybackFinished { segment_id } => segment_id,
                Action::PlaybackFailed { segment_id, .. } => segment_id,
                _ => continue,
            };
            exits.push(id);
            if id == 4 {
                break;
            }
        }
        exits
    })
    .await
    .expect("last segment never reported its exit");
    assert_eq!(exits, vec![4]);
    player.stop().await.unwrap();
}
