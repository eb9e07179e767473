// Visual-only playback: a segment "plays" for its annotated duration and then
// finishes, with no audio and no level feed.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::action::Action;

#[derive(Debug, Default)]
pub struct SegmentTimer {
    handle: Option<JoinHandle<()>>,
    remaining: Option<(u64, Duration)>,
    started: Option<(u64, tokio::time::Instant, Duration)>,
}

impl SegmentTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any running timer with one that finishes `segment_id` after
    /// `duration`.
    pub fn start(&mut self, segment_id: u64, duration: Duration, tx: mpsc::UnboundedSender<Action>) {
        self.cancel();
        self.started = Some((segment_id, tokio::time::Instant::now(), duration));
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            tx.send(Action::PlaybackFinished { segment_id }).ok();
        }));
    }

    /// Freeze the countdown, remembering how much was left.
    pub fn pause(&mut self) {
        if let Some((segment_id, at, duration)) = self.started.take() {
            let left = duration.saturating_sub(at.elapsed());
            self.remaining = Some((segment_id, left));
            if let Some(handle) = self.handle.take() {
                handle.abort();
            }
        }
    }

    pub fn resume(&mut self, tx: mpsc::UnboundedSender<Action>) {
        if let Some((segment_id, left)) = self.remaining.take() {
            self.start(segment_id, left, tx);
        }
    }

    /// A segment is being timed, running or paused.
    pub fn is_active(&self) -> bool {
        self.started.is_some() || self.remaining.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.started = None;
        self.remaining = None;
    }
}

impl Drop for SegmentTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
