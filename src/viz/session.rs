// The visualization session owns every piece of mutable visual state: blobs,
// emotion palette, highlights, grid resolution, toggles and the active
// segment. The app's tick loop is its only owner; external inputs (segments,
// audio levels, config pushes) arrive as method calls.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::audio::FrequencyBands;
use super::blob::Blob;
use super::connection::connections;
use super::emotion::{EmotionConfigUpdate, EmotionPalette, Rgb};
use super::field::{Grid, GridSizer, Thresholds};
use super::highlight::{
    activity_base, target_count, EmotionHighlight, EmotionHighlightPlacer, PlacementRequest,
    DEFAULT_CHAR_AMOUNT, DEFAULT_MAX_ATTEMPTS, MAX_CHAR_AMOUNT,
};
use super::noise::Perlin;
use super::params::{HomeRegion, VisualParameterSet, VisualParams};
use super::render::{FieldRenderer, RenderStyle, RenderSurface};
use super::simulator::BlobSimulator;
use crate::data::SegmentRecord;

/// Base glyph size in canvas units before per-segment multipliers.
pub const BASE_GLYPH_SIZE: f64 = 12.0;
const DEFAULT_HIGHLIGHT_SCALE: f64 = 1.2;
const LEVEL_BUCKETS: f64 = 4.0;
// A newly installed speaker is re-placed once its size and strength are
// within this fraction of their targets, or after `SETTLE_MAX_TICKS`.
const SETTLE_TOLERANCE: f64 = 0.02;
const SETTLE_MAX_TICKS: u32 = 90;

/// Startup settings for a session, normally built from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub blob_count: usize,
    pub frame_rate: f64,
    pub volume_effects: bool,
    pub connect_blobs: bool,
    pub emotion_char_amount: f64,
    pub grid_size: f64,
    pub audio_driven_grid: bool,
    pub max_placement_attempts: usize,
    pub thresholds: Thresholds,
    /// Overrides applied under every segment.
    pub defaults: VisualParameterSet,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            blob_count: 2,
            frame_rate: 30.0,
            volume_effects: true,
            connect_blobs: false,
            emotion_char_amount: DEFAULT_CHAR_AMOUNT,
            grid_size: 12.0,
            audio_driven_grid: false,
            max_placement_attempts: DEFAULT_MAX_ATTEMPTS,
            thresholds: Thresholds::default(),
            defaults: VisualParameterSet::default(),
        }
    }
}

/// The segment whose parameters are currently installed.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSegment {
    pub id: u64,
    pub record: SegmentRecord,
}

/// Per-blob bookkeeping that decides when highlights are recomputed.
#[derive(Debug, Clone, Default)]
struct HighlightBudget {
    /// Fixed base from `circlesPerEmotion`; `None` follows the audio level.
    fixed_base: Option<usize>,
    level_bucket: i64,
    /// Ticks since the segment was installed while its geometry still eases.
    settle_ticks: Option<u32>,
}

pub struct VisualizationSession {
    config: SessionConfig,
    simulator: BlobSimulator,
    palette: EmotionPalette,
    noise: Perlin,
    placer: EmotionHighlightPlacer,
    rng: StdRng,
    seed: u64,
    grid: GridSizer,
    highlights: Vec<Vec<EmotionHighlight>>,
    budgets: Vec<HighlightBudget>,
    segment_colors: Vec<HashMap<String, Rgb>>,
    segment: Option<ActiveSegment>,
    live: VisualParameterSet,
    style: RenderStyle,
    connect_blobs: bool,
    emotion_char_amount: f64,
    paused: bool,
    tick: u64,
    time: f64,
}

impl VisualizationSession {
    pub fn new(config: SessionConfig, width: f64, height: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut simulator = BlobSimulator::new(config.blob_count.max(1), width, height, &mut rng);
        simulator.set_volume_effects(config.volume_effects);
        let count = simulator.blobs().len();

        let mut session = Self {
            simulator,
            palette: EmotionPalette::new(),
            noise: Perlin::new(seed),
            placer: EmotionHighlightPlacer::new(config.max_placement_attempts),
            rng,
            seed,
            grid: GridSizer::new(config.grid_size, config.audio_driven_grid),
            highlights: vec![Vec::new(); count],
            budgets: vec![HighlightBudget::default(); count],
            segment_colors: vec![HashMap::new(); count],
            segment: None,
            live: VisualParameterSet::default(),
            style: RenderStyle::default(),
            connect_blobs: config.connect_blobs,
            emotion_char_amount: config.emotion_char_amount,
            paused: false,
            tick: 0,
            time: 0.0,
            config,
        };
        session.install_idle_defaults();
        session.simulator.refresh_strength(0.0);
        session
    }

    // ── Inputs ──────────────────────────────────────────────────────────────

    pub fn resize(&mut self, width: f64, height: f64) {
        if (width, height) == self.simulator.size() {
            return;
        }
        self.simulator.resize(width, height);
        self.recompute_all_highlights();
    }

    pub fn set_audio_level(&mut self, slot: usize, raw: f64) {
        self.simulator.set_audio_level(slot, raw);
    }

    pub fn set_frequency_response(&mut self, slot: usize, bands: FrequencyBands) {
        self.simulator.set_frequency_response(slot, bands);
    }

    /// Install a segment: speaking blob gets the record's visuals, emotions,
    /// colors and fresh highlights; the others fall back to idle visuals.
    /// Everything is assigned before returning, so the next tick sees either
    /// the old segment or the new one in full.
    pub fn apply_segment_parameters(&mut self, segment_id: u64, record: &SegmentRecord) {
        let set = self.resolved_overrides(Some(&record.visuals));
        let defaults = VisualParams::default();
        let resolved = defaults.with_overrides(&set);
        let idle = defaults
            .with_overrides(&self.resolved_overrides(None))
            .idle();
        let speaker = if record.is_silent {
            None
        } else {
            record.speaker.filter(|s| *s < self.simulator.blobs().len())
        };

        for id in 0..self.simulator.blobs().len() {
            let params = match speaker {
                Some(s) if s == id => resolved.clone(),
                Some(_) => idle.clone(),
                None => resolved.idle(),
            };
            self.simulator.set_base_params(id, params);
            if Some(id) == speaker {
                let colors = self.palette.resolve_colors(&record.emotions, &record.emotion_colors);
                if let Some(blob) = self.simulator.blob_mut(id) {
                    blob.home_region = set.home_region.unwrap_or_else(|| HomeRegion::for_slot(id));
                    blob.emotions = record.emotions.clone();
                    blob.display_colors = colors;
                }
                self.segment_colors[id] = record.emotion_colors.clone();
                self.budgets[id].fixed_base = set
                    .circles_per_emotion
                    .filter(|c| *c >= 0.0)
                    .map(|c| c.floor() as usize);
            }
        }

        self.apply_toggles(&set);
        self.segment = Some(ActiveSegment {
            id: segment_id,
            record: record.clone(),
        });
        self.budgets.iter_mut().for_each(|b| b.settle_ticks = None);
        match speaker {
            Some(id) => {
                self.simulator.refresh_strength(self.time);
                self.recompute_highlights(id);
                self.budgets[id].settle_ticks = Some(0);
            }
            None => self.highlights.iter_mut().for_each(Vec::clear),
        }
        tracing::debug!(
            segment = segment_id,
            speaker = ?speaker,
            emotions = ?record.emotions,
            "installed segment parameters"
        );
    }

    /// Merge an external color/charset update and re-derive every blob's
    /// display colors immediately.
    pub fn apply_emotion_update(&mut self, update: &EmotionConfigUpdate) {
        let changed = self.palette.apply_update(update);
        for id in 0..self.simulator.blobs().len() {
            let colors = match self.simulator.blob(id) {
                Some(blob) => self
                    .palette
                    .resolve_colors(&blob.emotions, &self.segment_colors[id]),
                None => continue,
            };
            if let Some(blob) = self.simulator.blob_mut(id) {
                blob.display_colors = colors;
            }
        }
        tracing::debug!(changed, "applied emotion config update");
    }

    /// Layer live-tuned parameters over every segment and re-install the
    /// active one.
    pub fn apply_parameter_push(&mut self, push: &VisualParameterSet) {
        self.live = self.live.merged(push);
        match self.segment.take() {
            Some(active) => self.apply_segment_parameters(active.id, &active.record),
            None => self.install_idle_defaults(),
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_connect_blobs(&mut self, enabled: bool) {
        self.connect_blobs = enabled;
    }

    pub fn set_volume_effects(&mut self, enabled: bool) {
        self.simulator.set_volume_effects(enabled);
    }

    /// Set the emotion character amount (percent, clamped to 0–200) and
    /// re-place highlights.
    pub fn set_emotion_char_amount(&mut self, percentage: f64) {
        let clamped = if percentage.is_finite() {
            percentage.clamp(0.0, MAX_CHAR_AMOUNT)
        } else {
            DEFAULT_CHAR_AMOUNT
        };
        if clamped != self.emotion_char_amount {
            self.emotion_char_amount = clamped;
            self.recompute_all_highlights();
        }
    }

    pub fn set_audio_driven_grid(&mut self, enabled: bool) {
        self.grid.audio_driven = enabled;
    }

    // ── Tick & render ───────────────────────────────────────────────────────

    /// Advance one frame. Paused sessions keep their state frozen.
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }
        self.tick += 1;
        self.time += 1.0 / self.config.frame_rate.max(1.0);
        self.simulator.update(self.time, &self.noise);

        let loudest = self
            .simulator
            .blobs()
            .iter()
            .map(Blob::audio_level)
            .fold(0.0, f64::max);
        if self.grid.step(loudest) {
            self.recompute_all_highlights();
            return;
        }

        for id in 0..self.budgets.len() {
            if let Some(ticks) = self.budgets[id].settle_ticks {
                let settled = self.simulator.blob(id).map_or(true, geometry_settled);
                if settled || ticks + 1 >= SETTLE_MAX_TICKS {
                    self.budgets[id].settle_ticks = None;
                    self.recompute_highlights(id);
                    continue;
                }
                self.budgets[id].settle_ticks = Some(ticks + 1);
            }
            if self.budgets[id].fixed_base.is_some() {
                continue;
            }
            let bucket = self.level_bucket(id);
            if bucket != self.budgets[id].level_bucket && !self.highlights[id].is_empty() {
                self.recompute_highlights(id);
            }
        }
    }

    /// Draw the current state. The frame's jitter stream is seeded from the
    /// session seed and tick, so identical states render identically.
    pub fn render(&self, surface: &mut dyn RenderSurface) {
        let (width, height) = self.simulator.size();
        let mut rng = StdRng::seed_from_u64(self.seed ^ self.tick);
        let renderer = FieldRenderer {
            blobs: self.simulator.blobs(),
            highlights: &self.highlights,
            palette: &self.palette,
            grid: Grid::new(width, height, self.grid.size()),
            thresholds: self.config.thresholds,
            noise: &self.noise,
            style: &self.style,
            time: self.time,
            tick: self.tick,
        };
        renderer.draw(&mut rng, surface);
        if self.connect_blobs {
            for command in connections(self.simulator.blobs(), width) {
                surface.draw(command);
            }
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn blobs(&self) -> &[Blob] {
        self.simulator.blobs()
    }

    pub fn highlights(&self, slot: usize) -> &[EmotionHighlight] {
        self.highlights.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn palette(&self) -> &EmotionPalette {
        &self.palette
    }

    pub fn segment(&self) -> Option<&ActiveSegment> {
        self.segment.as_ref()
    }

    pub fn size(&self) -> (f64, f64) {
        self.simulator.size()
    }

    pub fn grid(&self) -> Grid {
        let (width, height) = self.simulator.size();
        Grid::new(width, height, self.grid.size())
    }

    pub fn thresholds(&self) -> Thresholds {
        self.config.thresholds
    }

    pub fn noise(&self) -> &Perlin {
        &self.noise
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn connect_blobs(&self) -> bool {
        self.connect_blobs
    }

    pub fn volume_effects(&self) -> bool {
        self.simulator.volume_effects
    }

    pub fn audio_driven_grid(&self) -> bool {
        self.grid.audio_driven
    }

    pub fn emotion_char_amount(&self) -> f64 {
        self.emotion_char_amount
    }

    // ── Internals ───────────────────────────────────────────────────────────

    /// Config defaults, then the segment's own overrides, then live pushes.
    fn resolved_overrides(&self, segment: Option<&VisualParameterSet>) -> VisualParameterSet {
        let base = match segment {
            Some(set) => self.config.defaults.merged(set),
            None => self.config.defaults.clone(),
        };
        base.merged(&self.live)
    }

    fn install_idle_defaults(&mut self) {
        let set = self.resolved_overrides(None);
        let params = VisualParams::default().with_overrides(&set);
        for id in 0..self.simulator.blobs().len() {
            self.simulator.set_base_params(id, params.clone());
        }
        self.apply_toggles(&set);
    }

    fn apply_toggles(&mut self, set: &VisualParameterSet) {
        self.connect_blobs = set.connect_blobs.unwrap_or(self.config.connect_blobs);
        self.simulator
            .set_volume_effects(set.volume_effects.unwrap_or(self.config.volume_effects));
        self.grid
            .set_base(set.grid_size.unwrap_or(self.config.grid_size));
        if let Some(amount) = set.emotion_char_amount.filter(|a| a.is_finite()) {
            self.emotion_char_amount = amount.clamp(0.0, MAX_CHAR_AMOUNT);
        }
        match set.density_chars.as_deref() {
            Some(ramp) => self.style.set_ramp(ramp),
            None => self.style.density_ramp = RenderStyle::default().density_ramp,
        }
        self.style.glyph_size = BASE_GLYPH_SIZE * set.regular_ascii_char_size.unwrap_or(1.0).max(0.0);
        self.style.highlight_size =
            BASE_GLYPH_SIZE * set.colored_circle_char_size.unwrap_or(DEFAULT_HIGHLIGHT_SCALE).max(0.0);
    }

    fn level_bucket(&self, id: usize) -> i64 {
        self.simulator
            .blob(id)
            .map(|b| (b.audio_level() * LEVEL_BUCKETS).floor() as i64)
            .unwrap_or(0)
    }

    fn recompute_all_highlights(&mut self) {
        for id in 0..self.highlights.len() {
            if !self.highlights[id].is_empty() || self.is_speaking(id) {
                self.recompute_highlights(id);
            }
        }
    }

    fn is_speaking(&self, id: usize) -> bool {
        self.segment
            .as_ref()
            .map(|s| !s.record.is_silent && s.record.speaker == Some(id))
            .unwrap_or(false)
    }

    /// Replace blob `id`'s highlight list wholesale.
    fn recompute_highlights(&mut self, id: usize) {
        let bucket = self.level_bucket(id);
        let Some(blob) = self.simulator.blob(id) else { return };
        let budget = &self.budgets[id];
        let base = budget
            .fixed_base
            .unwrap_or_else(|| activity_base(0.35 + 0.65 * blob.audio_level()));
        let distribution = self
            .segment
            .as_ref()
            .filter(|_| self.is_speaking(id))
            .and_then(|s| s.record.emotion_distribution.as_ref());
        let request = PlacementRequest {
            blob,
            grid: self.grid(),
            thresholds: self.config.thresholds,
            noise: &self.noise,
            time: self.time,
            count: target_count(base, self.emotion_char_amount),
            distribution,
        };
        let palette = &self.palette;
        let placed = self
            .placer
            .place(&request, &mut self.rng, |label| palette.canonical(label));
        self.highlights[id] = placed;
        self.budgets[id].level_bucket = bucket;
    }
}

/// Size and strength have eased close enough to their targets that the
/// footprint no longer changes noticeably.
fn geometry_settled(blob: &Blob) -> bool {
    let near = |current: f64, target: f64| {
        (current - target).abs() <= SETTLE_TOLERANCE * target.abs().max(f64::EPSILON)
    };
    near(blob.current.size_scale, blob.target.size_scale)
        && near(blob.current.strength, blob.target.strength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::field::sample;
    use crate::viz::render::RecordingSurface;

    fn session() -> VisualizationSession {
        VisualizationSession::new(SessionConfig::default(), 960.0, 576.0, 7)
    }

    fn record(speaker: usize, emotions: &[&str]) -> SegmentRecord {
        SegmentRecord {
            file: "1.mp3".into(),
            speaker: Some(speaker),
            emotions: emotions.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn non_speaking_blob_goes_idle() {
        let mut s = session();
        s.apply_segment_parameters(1, &record(0, &["joy"]));
        let speaking = &s.blobs()[0].base;
        let idle = &s.blobs()[1].base;
        assert!(idle.strength < speaking.strength);
        assert!(idle.motion_range < speaking.motion_range);
    }

    #[test]
    fn paused_session_freezes_positions() {
        let mut s = session();
        s.set_paused(true);
        let before: Vec<(f64, f64)> = s.blobs().iter().map(|b| (b.x, b.y)).collect();
        for _ in 0..10 {
            s.tick();
        }
        let after: Vec<(f64, f64)> = s.blobs().iter().map(|b| (b.x, b.y)).collect();
        assert_eq!(before, after);
        assert_eq!(s.tick_count(), 0);

        let mut surface = RecordingSurface::new();
        s.render(&mut surface);
        assert!(surface.glyphs().count() > 0);
    }

    #[test]
    fn silent_segment_clears_highlights() {
        let mut s = session();
        s.apply_segment_parameters(1, &record(0, &["joy"]));
        assert!(!s.highlights(0).is_empty());
        let mut silent = record(0, &[]);
        silent.is_silent = true;
        s.apply_segment_parameters(2, &silent);
        assert!(s.highlights(0).is_empty());
    }

    #[test]
    fn highlights_are_replaced_once_the_speaker_settles() {
        let mut s = session();
        s.apply_segment_parameters(1, &record(0, &["joy", "fear"]));
        assert!(!s.highlights(0).is_empty());
        assert_eq!(s.budgets[0].settle_ticks, Some(0));
        assert_eq!(s.budgets[1].settle_ticks, None);

        for _ in 0..SETTLE_MAX_TICKS {
            s.tick();
            if s.budgets[0].settle_ticks.is_none() {
                break;
            }
        }
        assert_eq!(s.budgets[0].settle_ticks, None);

        // Re-placed against this tick's geometry, so every cell is inside it.
        let grid = s.grid();
        let thresholds = s.thresholds();
        assert!(!s.highlights(0).is_empty());
        for h in s.highlights(0) {
            let (x, y) = grid.center(h.gx, h.gy);
            let sampled = sample(s.blobs(), x, y, s.time(), s.noise(), &thresholds);
            assert!(sampled.raw > thresholds.draw);
        }
    }

    #[test]
    fn settle_is_cancelled_by_a_silent_segment() {
        let mut s = session();
        s.apply_segment_parameters(1, &record(0, &["joy"]));
        let mut silent = record(0, &[]);
        silent.is_silent = true;
        s.apply_segment_parameters(2, &silent);
        assert!(s.budgets.iter().all(|b| b.settle_ticks.is_none()));
    }

    #[test]
    fn parameter_push_reinstalls_segment() {
        let mut s = session();
        s.apply_segment_parameters(3, &record(0, &["joy"]));
        s.apply_parameter_push(&VisualParameterSet {
            strength: Some(900.0),
            ..Default::default()
        });
        assert_eq!(s.blobs()[0].base.strength, 900.0);
        assert_eq!(s.segment().map(|a| a.id), Some(3));
    }
}
