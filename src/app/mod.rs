// Central coordinator: owns the visualization session, the segment queue, the
// playback slot and every component. Runs the event loop
// (key → Action → handle_action → session/component updates → draw).

mod actions;
mod fetch;
mod input;
mod playback;
mod watch;

pub use fetch::load_segments;
pub use watch::{parse_emotions_file, parse_parameters_file};

use std::path::PathBuf;
use std::time::Duration;

use ratatui::layout::Rect;
use tokio::sync::mpsc;

use crate::action::Action;
use crate::components::play_controls::PlayControls;
use crate::components::side_panel::SidePanel;
use crate::components::stage::Stage;
use crate::components::transcript::Transcript;
use crate::config::Config;
use crate::player::queue::SegmentQueue;
use crate::player::slot::PlaybackSlot;
use crate::player::timer::SegmentTimer;
use crate::player::MpvPlayer;
use crate::theme::Theme;
use crate::tui::{Tui, TuiEvent};
use crate::ui;
use crate::viz::emotion::EmotionConfigUpdate;
use crate::viz::VisualizationSession;

// Canvas size used until the first frame reports the real stage area.
const INITIAL_CANVAS: (f64, f64) = (960.0, 576.0);

/// Command-line choices layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Segments file path or http(s) URL.
    pub source: Option<String>,
    /// Directory holding the segment audio files.
    pub audio_dir: Option<PathBuf>,
    /// Animate on timers without starting an audio player.
    pub visual_only: bool,
    pub seed: Option<u64>,
    /// Emotions config file, overriding `[emotions] config_file`.
    pub emotions_config: Option<PathBuf>,
}

/// Top-level coordinator: owns every component, the session, and the player.
pub struct App {
    running: bool,
    needs_redraw: bool,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,

    // Components
    pub(crate) stage: Stage,
    pub(crate) side_panel: SidePanel,
    pub(crate) transcript: Transcript,
    pub(crate) play_controls: PlayControls,

    // State
    pub session: VisualizationSession,
    pub queue: SegmentQueue,
    pub slot: PlaybackSlot,
    player: Option<MpvPlayer>,
    timer: SegmentTimer,
    pub(crate) config: Config,
    pub(crate) options: AppOptions,
    theme: Theme,
    pub show_help: bool,
    pub error_message: Option<String>,
    pub(crate) load_id: u64,
}

impl App {
    pub fn new(config: Config, options: AppOptions) -> anyhow::Result<Self> {
        let (action_tx, action_rx) = mpsc::unbounded_channel();

        let seed = options
            .seed
            .or(config.general.seed)
            .unwrap_or_else(rand::random);
        let mut session = VisualizationSession::new(
            config.session_config(),
            INITIAL_CANVAS.0,
            INITIAL_CANVAS.1,
            seed,
        );
        if !config.emotions.colors.is_empty() {
            session.apply_emotion_update(&EmotionConfigUpdate::ColorMap {
                emotion_color_map: config.emotions.colors.clone(),
            });
        }

        let player = if options.visual_only {
            None
        } else {
            let mut player = MpvPlayer::new(&config.playback.player);
            player.set_action_tx(action_tx.clone());
            Some(player)
        };

        let mut side_panel = SidePanel::new();
        side_panel.set_visual_only(player.is_none());

        let mut queue = SegmentQueue::new();
        queue.set_repeat(config.playback.repeat);

        tracing::info!(seed, visual_only = player.is_none(), "starting session");

        Ok(Self {
            running: true,
            needs_redraw: true,
            action_tx,
            action_rx,
            stage: Stage::new(),
            side_panel,
            transcript: Transcript::new(),
            play_controls: PlayControls::new(),
            session,
            queue,
            slot: PlaybackSlot::new(),
            player,
            timer: SegmentTimer::new(),
            theme: Theme::from_name(&config.general.theme),
            config,
            options,
            show_help: false,
            error_message: None,
            load_id: 0,
        })
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut tui = Tui::new(self.config.general.frame_rate)?;
        tui.enter()?;

        self.action_tx.send(Action::LoadSegments)?;
        self.start_watchers();

        while self.running {
            if self.needs_redraw {
                self.draw(&mut tui)?;
                self.needs_redraw = false;
            }

            tokio::select! {
                Some(event) = tui.event_rx.recv() => {
                    match event {
                        TuiEvent::Key(key) => {
                            self.handle_key(key)?;
                            self.needs_redraw = true;
                        }
                        TuiEvent::Resize => { self.action_tx.send(Action::Resize)?; }
                        TuiEvent::Tick => { self.action_tx.send(Action::Tick)?; }
                    }
                }
                Some(action) = self.action_rx.recv() => {
                    self.handle_action(action).await?;
                }
            }
        }

        tui.exit()?;
        Ok(())
    }

    fn draw(&mut self, tui: &mut Tui) -> anyhow::Result<()> {
        let (width, height) = tui.size()?;
        let regions = ui::regions(
            Rect::new(0, 0, width, height),
            self.error_message.is_some(),
        );
        self.stage.capture(&mut self.session, regions.stage);
        self.sync_side_panel();

        let state = ui::DrawState {
            stage: &self.stage,
            side_panel: &self.side_panel,
            transcript: &self.transcript,
            play_controls: &self.play_controls,
            error_message: &self.error_message,
            show_help: self.show_help,
            theme: &self.theme,
        };
        tui.draw(|frame| ui::draw(frame, &state))
    }

    pub(crate) fn sync_side_panel(&mut self) {
        let position = self.queue.current_index().map(|i| (i, self.queue.len()));
        self.side_panel
            .sync(&self.session, self.slot.state(), position);
    }

    fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.config.playback.watch_interval_ms.max(100))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_visual_only(&self) -> bool {
        self.player.is_none()
    }

    /// Handle everything already queued, including follow-ups it produces.
    pub async fn flush_actions(&mut self) {
        while let Ok(action) = self.action_rx.try_recv() {
            let _ = self.handle_action(action).await;
        }
    }

    /// Sender for injecting actions from tests or background tasks.
    pub fn action_sender(&self) -> mpsc::UnboundedSender<Action> {
        self.action_tx.clone()
    }
}
