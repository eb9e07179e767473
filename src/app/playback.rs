// Segment playback: install a segment's visuals, start its audio (or its
// timer in visual-only mode), move through the queue, pause and resume.

use std::path::PathBuf;
use std::time::Duration;

use crate::action::Action;
use crate::app::App;
use crate::data::{audio_path, SegmentRecord};
use crate::player::queue::SegmentQueue;
use crate::player::slot::{SlotEvent, SlotState};

impl App {
    /// Start the queue's current segment. Visual parameters, emotions and
    /// highlights are installed before any playback event can arrive.
    pub(super) async fn start_current_segment(&mut self) -> anyhow::Result<()> {
        let Some(record) = self.queue.current().cloned() else {
            return Ok(());
        };
        let index = self.queue.current_index();
        let segment_id = self.slot.begin();
        self.timer.cancel();

        if self.session.is_paused() {
            self.session.set_paused(false);
            self.play_controls.set_paused(false);
        }
        self.session.apply_segment_parameters(segment_id, &record);
        self.transcript.set_current(index);
        self.play_controls.set_loading(Some(record.file.clone()));
        self.sync_play_controls();

        let path = audio_path(&record, &self.audio_dir());
        match (self.player.as_mut(), path) {
            (Some(player), Some(path)) => {
                if let Err(e) = player.play(segment_id, &path).await {
                    self.action_tx.send(Action::PlaybackFailed {
                        segment_id,
                        error: e.to_string(),
                    })?;
                } else {
                    self.slot.handle(segment_id, SlotEvent::Loaded).ok();
                }
            }
            _ => self.start_timed_segment(segment_id, &record).await?,
        }
        tracing::debug!(segment_id, file = %record.file, "segment started");
        Ok(())
    }

    /// Visual-only playback: no audio, finish after the annotated duration.
    async fn start_timed_segment(&mut self, segment_id: u64, record: &SegmentRecord) -> anyhow::Result<()> {
        if let Some(player) = &self.player {
            // A segment without audio must not leave the previous one playing.
            player.stop().await?;
        }
        self.slot.handle(segment_id, SlotEvent::Loaded).ok();
        self.action_tx.send(Action::PlaybackStarted { segment_id })?;
        let duration = record
            .duration_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(self.config.playback.default_segment_ms));
        self.timer
            .start(segment_id, duration, self.action_tx.clone());
        Ok(())
    }

    /// Move through the queue and start the segment landed on. At the end of
    /// a non-repeating queue the slot stays ended and the visuals keep idling.
    pub(super) async fn play_queue_segment(
        &mut self,
        step: fn(&mut SegmentQueue) -> Option<&SegmentRecord>,
    ) -> anyhow::Result<()> {
        if step(&mut self.queue).is_some() {
            self.start_current_segment().await?;
        } else if self.slot.state().is_terminal() {
            tracing::info!("reached the end of the segment queue");
        }
        Ok(())
    }

    pub(super) async fn toggle_pause(&mut self) -> anyhow::Result<()> {
        let paused = !self.session.is_paused();
        self.session.set_paused(paused);
        self.play_controls.set_paused(paused);
        if let Some(player) = self.player.as_mut() {
            if let Err(e) = player.set_paused(paused).await {
                tracing::warn!(error = %e, "failed to toggle mpv pause");
            }
        }
        if paused {
            self.timer.pause();
        } else {
            self.timer.resume(self.action_tx.clone());
        }
        Ok(())
    }

    /// True while a live level feed is reaching the session.
    pub(super) fn audio_feed_active(&self) -> bool {
        self.player.is_some()
            && !self.timer.is_active()
            && self.slot.state() == SlotState::Playing
            && !self.session.is_paused()
    }

    pub(super) fn current_speaker(&self) -> Option<usize> {
        self.session
            .segment()
            .filter(|s| !s.record.is_silent)
            .and_then(|s| s.record.speaker)
    }

    /// Explicit `--audio-dir`, else the directory of a local segments file.
    pub(super) fn audio_dir(&self) -> PathBuf {
        if let Some(dir) = &self.options.audio_dir {
            return dir.clone();
        }
        self.options
            .source
            .as_deref()
            .filter(|s| !is_remote(s))
            .and_then(|s| std::path::Path::new(s).parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub(super) fn sync_play_controls(&mut self) {
        self.play_controls
            .set_queue_info(self.queue.current_index(), self.queue.len());
    }
}

pub(super) fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
