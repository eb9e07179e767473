// Per-speaker blob state. Only `BlobSimulator` moves blobs; the session
// re-seeds their targets and emotions on every segment change.

use super::audio::{FrequencyBands, LevelSmoother};
use super::emotion::Rgb;
use super::params::{HomeRegion, VisualParams};

/// One animated metaball agent.
#[derive(Debug, Clone)]
pub struct Blob {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub home_region: HomeRegion,
    /// Segment-resolved parameters before audio modulation.
    pub base: VisualParams,
    pub target: VisualParams,
    pub current: VisualParams,
    pub smoother: LevelSmoother,
    pub bands: FrequencyBands,
    pub emotions: Vec<String>,
    pub display_colors: Vec<Rgb>,
    /// Phase offset for breathing and motion so blobs never pulse in lockstep.
    pub time_offset: f64,
    /// Offset into the noise field so blob outlines differ.
    pub noise_seed: f64,
    pub cached_strength: f64,
    /// True while another visible blob is inside this blob's spacing radius.
    pub spacing_constrained: bool,
}

impl Blob {
    pub fn new(id: usize, home_region: HomeRegion, time_offset: f64, noise_seed: f64) -> Self {
        let params = VisualParams::default();
        Self {
            id,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            home_region,
            base: params.clone(),
            target: params.clone(),
            current: params,
            smoother: LevelSmoother::new(),
            bands: FrequencyBands::default(),
            emotions: Vec::new(),
            display_colors: Vec::new(),
            time_offset,
            noise_seed,
            cached_strength: 0.0,
            spacing_constrained: false,
        }
    }

    pub fn audio_level(&self) -> f64 {
        self.smoother.level()
    }

    pub fn is_visible(&self) -> bool {
        self.current.visible
    }

    pub fn home(&self, width: f64, height: f64) -> (f64, f64) {
        self.home_region.anchor(width, height)
    }

    /// Place the blob at its home anchor with zero velocity.
    pub fn reset_position(&mut self, width: f64, height: f64) {
        let (hx, hy) = self.home(width, height);
        self.x = hx;
        self.y = hy;
        self.vx = 0.0;
        self.vy = 0.0;
    }

    pub fn distance_to(&self, other: &Blob) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// First display color, used for connection lines.
    pub fn primary_color(&self) -> Rgb {
        self.display_colors.first().copied().unwrap_or([255, 255, 255])
    }

    /// Index of `label` in the current emotion list, compared by `key`.
    pub fn emotion_index(&self, label: &str, key: impl Fn(&str) -> String) -> Option<usize> {
        let wanted = key(label);
        self.emotions.iter().position(|e| key(e.as_str()) == wanted)
    }
}
