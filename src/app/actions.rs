// Action dispatch: routes each Action variant to the session, the playback
// slot or the components. Results of background work are checked against the
// current segment/load id first and dropped when stale.

use crate::action::Action;
use crate::app::App;
use crate::components::Component;
use crate::player::queue::SegmentQueue;
use crate::player::slot::{SlotEvent, TransitionError};
use crate::viz::audio::FrequencyBands;
use crate::viz::params::VisualParameterSet;

const CHAR_AMOUNT_STEP: f64 = 25.0;
const ERROR_DISPLAY_SECS: u64 = 5;

impl App {
    pub async fn handle_action(&mut self, action: Action) -> anyhow::Result<()> {
        match action {
            // Lifecycle
            Action::Quit => {
                self.timer.cancel();
                if let Some(player) = &self.player {
                    let _ = player.stop().await;
                }
                self.running = false;
            }
            Action::Tick => {
                if !self.audio_feed_active() {
                    for slot in 0..self.session.blobs().len() {
                        self.session.set_audio_level(slot, 0.0);
                    }
                }
                self.session.tick();
                self.play_controls.update(&action)?;
                self.needs_redraw = true;
            }
            Action::Resize => self.needs_redraw = true,

            // Segment loading
            Action::LoadSegments => self.spawn_load_segments(),
            Action::SegmentsLoaded { load_id, set } => {
                if load_id != self.load_id {
                    tracing::debug!(load_id, current = self.load_id, "dropping stale segment load");
                    return Ok(());
                }
                tracing::info!(segments = set.len(), "segments loaded");
                self.transcript.set_segments(&set);
                self.queue.load(set);
                self.start_current_segment().await?;
            }

            // Playback
            Action::TogglePause => self.toggle_pause().await?,
            Action::NextSegment => self.play_queue_segment(SegmentQueue::advance).await?,
            Action::PrevSegment => self.play_queue_segment(SegmentQueue::prev).await?,
            Action::PlaybackStarted { segment_id } => {
                if self.slot_event(segment_id, SlotEvent::Started) {
                    self.play_controls.update(&action)?;
                }
            }
            Action::PlaybackFinished { segment_id } => {
                if self.slot_event(segment_id, SlotEvent::Finished) {
                    self.play_controls.update(&action)?;
                    self.play_queue_segment(SegmentQueue::advance).await?;
                }
            }
            Action::PlaybackFailed {
                segment_id,
                ref error,
            } => {
                if self.slot_event(segment_id, SlotEvent::Failed) {
                    tracing::warn!(segment_id, error = %error, "segment failed, skipping");
                    if let Some(index) = self.queue.current_index() {
                        self.queue.mark_failed(index);
                        self.transcript.mark_failed(index);
                    }
                    self.play_controls.update(&action)?;
                    self.action_tx.send(Action::ShowError(error.clone()))?;
                    self.play_queue_segment(SegmentQueue::advance).await?;
                }
            }
            Action::AudioLevels {
                segment_id,
                rms,
                peak,
                zero_crossing_rate,
            } => {
                if !self.slot.is_current(segment_id) {
                    return Ok(());
                }
                let speaker = self.current_speaker();
                let raw = 0.7 * rms + 0.3 * peak;
                for slot in 0..self.session.blobs().len() {
                    if Some(slot) == speaker {
                        self.session.set_audio_level(slot, raw);
                        self.session.set_frequency_response(
                            slot,
                            FrequencyBands::estimate(raw, zero_crossing_rate),
                        );
                    } else {
                        self.session.set_audio_level(slot, 0.0);
                    }
                }
            }

            // Display toggles. Pushed as live overrides so they outlast
            // segment changes.
            Action::ToggleConnections => {
                let enabled = !self.session.connect_blobs();
                self.session.apply_parameter_push(&VisualParameterSet {
                    connect_blobs: Some(enabled),
                    ..Default::default()
                });
            }
            Action::ToggleVolumeEffects => {
                let enabled = !self.session.volume_effects();
                self.session.apply_parameter_push(&VisualParameterSet {
                    volume_effects: Some(enabled),
                    ..Default::default()
                });
            }
            Action::ToggleAudioGrid => {
                let enabled = !self.session.audio_driven_grid();
                self.session.set_audio_driven_grid(enabled);
            }
            Action::EmotionAmountUp => self.step_char_amount(CHAR_AMOUNT_STEP),
            Action::EmotionAmountDown => self.step_char_amount(-CHAR_AMOUNT_STEP),

            // External configuration
            Action::ReloadEmotions => self.reload_emotions()?,
            Action::EmotionConfigChanged(update) => {
                self.session.apply_emotion_update(&update);
            }
            Action::ParametersChanged(set) => {
                tracing::debug!("applying live parameter push");
                self.session.apply_parameter_push(&set);
            }

            // Errors & help
            Action::ShowError(msg) => {
                self.error_message = Some(msg);
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(tokio::time::Duration::from_secs(ERROR_DISPLAY_SECS)).await;
                    tx.send(Action::ClearError).ok();
                });
            }
            Action::ClearError => self.error_message = None,
            Action::ShowHelp => self.show_help = true,
            Action::HideHelp => self.show_help = false,
        }
        Ok(())
    }

    /// Feed `event` to the slot. False when the event is stale or invalid.
    fn slot_event(&mut self, segment_id: u64, event: SlotEvent) -> bool {
        match self.slot.handle(segment_id, event) {
            Ok(state) => {
                tracing::debug!(segment_id, %state, "playback slot transition");
                true
            }
            Err(e @ TransitionError::Stale { .. }) => {
                tracing::trace!(error = %e, "ignoring stale playback event");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "unexpected playback event");
                false
            }
        }
    }

    fn step_char_amount(&mut self, delta: f64) {
        let amount = (self.session.emotion_char_amount() + delta).clamp(0.0, 200.0);
        self.session.apply_parameter_push(&VisualParameterSet {
            emotion_char_amount: Some(amount),
            ..Default::default()
        });
    }
}
