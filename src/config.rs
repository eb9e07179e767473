// User configuration loaded from ~/.config/emoviz/config.toml.
// Falls back to sensible defaults when the file or any field is missing.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::viz::emotion::ColorValue;
use crate::viz::field::{Thresholds, DRAW_THRESHOLD, FINAL_DRAW_THRESHOLD, PLACEMENT_RELAX};
use crate::viz::highlight::{DEFAULT_CHAR_AMOUNT, DEFAULT_MAX_ATTEMPTS};
use crate::viz::params::VisualParameterSet;
use crate::viz::session::SessionConfig;

/// Application configuration, deserialized from `~/.config/emoviz/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub emotions: EmotionsConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Target TUI refresh rate in frames per second (default: 30).
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Seed for blob placement, noise and highlight search. Random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            seed: None,
            theme: default_theme(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_true")]
    pub volume_effects: bool,
    #[serde(default)]
    pub connect_blobs: bool,
    /// Emotion character amount in percent (50 = unscaled).
    #[serde(default = "default_char_amount")]
    pub emotion_char_amount: f64,
    /// Field grid cell size in canvas pixels.
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
    #[serde(default)]
    pub audio_driven_grid: bool,
    #[serde(default = "default_max_attempts")]
    pub max_placement_attempts: usize,
    #[serde(default = "default_draw_threshold")]
    pub draw_threshold: f64,
    #[serde(default = "default_final_draw_threshold")]
    pub final_draw_threshold: f64,
    #[serde(default = "default_placement_relax")]
    pub placement_relax: f64,
    /// Parameter overrides applied under every segment.
    #[serde(default)]
    pub defaults: VisualParameterSet,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            volume_effects: true,
            connect_blobs: false,
            emotion_char_amount: default_char_amount(),
            grid_size: default_grid_size(),
            audio_driven_grid: false,
            max_placement_attempts: default_max_attempts(),
            draw_threshold: default_draw_threshold(),
            final_draw_threshold: default_final_draw_threshold(),
            placement_relax: default_placement_relax(),
            defaults: VisualParameterSet::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmotionsConfig {
    /// Admin-panel emotions file, polled for color and charset changes.
    #[serde(default)]
    pub config_file: Option<PathBuf>,
    /// Visualization parameters file, polled for live tuning.
    #[serde(default)]
    pub parameters_file: Option<PathBuf>,
    /// Inline label → color overrides (hex string or `[r, g, b]`).
    #[serde(default)]
    pub colors: HashMap<String, ColorValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Audio player binary.
    #[serde(default = "default_player")]
    pub player: String,
    /// How often the emotions and parameters files are checked.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    /// Start over after the last segment.
    #[serde(default = "default_true")]
    pub repeat: bool,
    /// Segment length in visual-only mode when the record has no duration.
    #[serde(default = "default_segment_ms")]
    pub default_segment_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            player: default_player(),
            watch_interval_ms: default_watch_interval_ms(),
            repeat: true,
            default_segment_ms: default_segment_ms(),
        }
    }
}

fn default_frame_rate() -> f64 {
    30.0
}

fn default_theme() -> String {
    crate::theme::THEME_DARK.to_string()
}

fn default_true() -> bool {
    true
}

fn default_char_amount() -> f64 {
    DEFAULT_CHAR_AMOUNT
}

fn default_grid_size() -> f64 {
    12.0
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_draw_threshold() -> f64 {
    DRAW_THRESHOLD
}

fn default_final_draw_threshold() -> f64 {
    FINAL_DRAW_THRESHOLD
}

fn default_placement_relax() -> f64 {
    PLACEMENT_RELAX
}

fn default_player() -> String {
    "mpv".to_string()
}

fn default_watch_interval_ms() -> u64 {
    1000
}

fn default_segment_ms() -> u64 {
    20_000
}

impl Config {
    /// Read config from disk, or return defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emoviz")
            .join("config.toml")
    }

    /// Session settings derived from `[general]` and `[visual]`. Out-of-range
    /// thresholds fall back to the built-in ones.
    pub fn session_config(&self) -> SessionConfig {
        let v = &self.visual;
        let thresholds = Thresholds::new(v.draw_threshold, v.final_draw_threshold, v.placement_relax);
        SessionConfig {
            frame_rate: if self.general.frame_rate > 0.0 {
                self.general.frame_rate
            } else {
                default_frame_rate()
            },
            volume_effects: v.volume_effects,
            connect_blobs: v.connect_blobs,
            emotion_char_amount: v.emotion_char_amount,
            grid_size: v.grid_size,
            audio_driven_grid: v.audio_driven_grid,
            max_placement_attempts: v.max_placement_attempts,
            thresholds,
            defaults: v.defaults.clone(),
            ..SessionConfig::default()
        }
    }
}
