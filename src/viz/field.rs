// Metaball influence field: per-blob influence with angular noise distortion,
// the gamma-style edge shaping, the two draw thresholds, grid geometry and the
// smoothed grid resolution.

use super::blob::Blob;
use super::noise::Perlin;

/// Raw influence a cell needs before it counts as inside a blob at all.
pub const DRAW_THRESHOLD: f64 = 0.01;
/// Shaped influence a cell needs to be drawn.
pub const FINAL_DRAW_THRESHOLD: f64 = 0.05;
/// Fraction of the final threshold a highlight candidate has to clear.
pub const PLACEMENT_RELAX: f64 = 0.7;

const MIN_D2: f64 = 1.0;
const EPSILON: f64 = 1e-6;
const DISTORTION_GAIN: f64 = 0.3;
const NOISE_FREQUENCY: f64 = 1.5;

/// Draw/final/placement thresholds, kept in a consistent order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub draw: f64,
    pub final_draw: f64,
    pub placement_relax: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            draw: DRAW_THRESHOLD,
            final_draw: FINAL_DRAW_THRESHOLD,
            placement_relax: PLACEMENT_RELAX,
        }
    }
}

impl Thresholds {
    /// Build from configured values; out-of-range values use the defaults.
    pub fn new(draw: f64, final_draw: f64, placement_relax: f64) -> Self {
        let valid = |v: f64| v.is_finite() && v > 0.0 && v < 1.0;
        Self {
            draw: if valid(draw) { draw } else { DRAW_THRESHOLD },
            final_draw: if valid(final_draw) { final_draw } else { FINAL_DRAW_THRESHOLD },
            placement_relax: if valid(placement_relax) || placement_relax == 1.0 {
                placement_relax
            } else {
                PLACEMENT_RELAX
            },
        }
    }

    /// Renderer rule: inside the blob and past the visible edge.
    pub fn is_drawn(&self, sample: &FieldSample) -> bool {
        sample.raw > self.draw && sample.shaped >= self.final_draw
    }

    /// Placement rule: inside the blob and within the relaxed final band.
    /// Every qualifying cell is also inside by the renderer's raw rule.
    pub fn qualifies_for_placement(&self, raw: f64, shaped: f64) -> bool {
        raw > self.draw && shaped >= self.final_draw * self.placement_relax
    }
}

/// Field value at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSample {
    pub raw: f64,
    pub shaped: f64,
    /// Index of the blob with the largest influence, if any blob contributes.
    pub dominant: Option<usize>,
}

impl FieldSample {
    pub const EMPTY: FieldSample = FieldSample {
        raw: 0.0,
        shaped: 0.0,
        dominant: None,
    };
}

/// `sin(n1·π)·cos(n2·π)` from two noise layers sampled on the circle of the
/// point's angle around the blob, drifting over time.
pub fn distortion(blob: &Blob, angle: f64, time: f64, noise: &Perlin) -> f64 {
    let (s, c) = angle.sin_cos();
    let seed = blob.noise_seed;
    let n1 = noise.noise(
        c * NOISE_FREQUENCY + seed,
        s * NOISE_FREQUENCY + seed,
        time * 0.3,
    );
    let n2 = noise.noise(
        c * NOISE_FREQUENCY * 2.0 + seed + 100.0,
        s * NOISE_FREQUENCY * 2.0 + seed + 100.0,
        time * 0.5,
    );
    (n1 * std::f64::consts::PI).sin() * (n2 * std::f64::consts::PI).cos()
}

/// Raw metaball influence of `blob` at canvas point `(x, y)`.
pub fn blob_influence(blob: &Blob, x: f64, y: f64, time: f64, noise: &Perlin) -> f64 {
    if !blob.is_visible() {
        return 0.0;
    }
    let p = &blob.current;
    let dx = x - blob.x;
    let dy = y - blob.y;
    let d2 = (dx * dx + dy * dy).max(MIN_D2);

    let blobiness = p.blobiness * (1.0 + 0.5 * blob.bands.treble);
    let distorted = if blobiness > 0.0 {
        let warp = distortion(blob, dy.atan2(dx), time, noise);
        blob.cached_strength * p.size_scale * (1.0 + blobiness * DISTORTION_GAIN * warp)
    } else {
        blob.cached_strength * p.size_scale
    };

    let influence = distorted.max(0.0) * p.density / (d2 * p.spread + EPSILON);
    if influence.is_finite() {
        influence
    } else {
        0.0
    }
}

/// `1 − (1 − x^g)^g` with `x` clamped to [0, 1].
pub fn shape(raw: f64, gradient: f64) -> f64 {
    let x = raw.clamp(0.0, 1.0);
    1.0 - (1.0 - x.powf(gradient)).powf(gradient)
}

/// Raw influence needed to reach `shaped` for gradient `g`.
pub fn unshape(shaped: f64, gradient: f64) -> f64 {
    let s = shaped.clamp(0.0, 1.0);
    (1.0 - (1.0 - s).powf(1.0 / gradient)).powf(1.0 / gradient)
}

/// Sample every blob at `(x, y)`; the first blob wins ties.
pub fn sample(blobs: &[Blob], x: f64, y: f64, time: f64, noise: &Perlin, thresholds: &Thresholds) -> FieldSample {
    let mut best = FieldSample::EMPTY;
    for (i, blob) in blobs.iter().enumerate() {
        let influence = blob_influence(blob, x, y, time, noise);
        if influence > best.raw {
            best.raw = influence;
            best.dominant = Some(i);
        }
    }
    if let Some(i) = best.dominant {
        if best.raw > thresholds.draw {
            best.shaped = shape(best.raw, blobs[i].current.gradient_strength);
        }
    }
    best
}

/// Approximate canvas radius at which `blob`'s undistorted field drops to
/// `shaped_target`.
pub fn estimated_radius(blob: &Blob, shaped_target: f64) -> f64 {
    let p = &blob.current;
    let raw = unshape(shaped_target, p.gradient_strength).max(EPSILON);
    let numerator = blob.cached_strength * p.size_scale * p.density;
    if numerator <= 0.0 {
        return 0.0;
    }
    (numerator / (raw * p.spread)).sqrt()
}

// ── Grid ────────────────────────────────────────────────────────────────────

/// Square-cell sampling grid over the canvas. `cell` is the edge length in
/// canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub cell: f64,
    pub cols: i64,
    pub rows: i64,
}

impl Grid {
    pub fn new(width: f64, height: f64, cell: f64) -> Self {
        let cell = if cell.is_finite() && cell >= 1.0 { cell } else { 1.0 };
        Self {
            cell,
            cols: (width.max(0.0) / cell).ceil() as i64,
            rows: (height.max(0.0) / cell).ceil() as i64,
        }
    }

    pub fn center(&self, gx: i64, gy: i64) -> (f64, f64) {
        ((gx as f64 + 0.5) * self.cell, (gy as f64 + 0.5) * self.cell)
    }

    /// Grid cell containing canvas point `(x, y)`, possibly out of bounds.
    pub fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        ((x / self.cell).floor() as i64, (y / self.cell).floor() as i64)
    }

    pub fn contains(&self, gx: i64, gy: i64) -> bool {
        gx >= 0 && gy >= 0 && gx < self.cols && gy < self.rows
    }

    pub fn cells(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (0..self.rows).flat_map(move |gy| (0..self.cols).map(move |gx| (gx, gy)))
    }
}

/// Grid edge length at silence and at full level when audio-driven.
pub const AUDIO_GRID_COARSE: f64 = 18.0;
pub const AUDIO_GRID_FINE: f64 = 9.0;
const GRID_STEP: f64 = 0.25;

/// Smoothed grid resolution. Moves at most `GRID_STEP` per tick toward its
/// target so the character field never visibly jumps.
#[derive(Debug, Clone)]
pub struct GridSizer {
    base: f64,
    current: f64,
    pub audio_driven: bool,
}

impl GridSizer {
    pub fn new(base: f64, audio_driven: bool) -> Self {
        let base = clean_grid(base);
        Self {
            base,
            current: base,
            audio_driven,
        }
    }

    pub fn set_base(&mut self, base: f64) {
        self.base = clean_grid(base);
    }

    pub fn target(&self, level: f64) -> f64 {
        if self.audio_driven {
            let l = level.clamp(0.0, 1.0);
            AUDIO_GRID_COARSE + (AUDIO_GRID_FINE - AUDIO_GRID_COARSE) * l
        } else {
            self.base
        }
    }

    /// Step toward the target for `level`. Returns true when the integer
    /// cell size changed.
    pub fn step(&mut self, level: f64) -> bool {
        let before = self.size();
        let delta = self.target(level) - self.current;
        self.current += delta.clamp(-GRID_STEP, GRID_STEP);
        self.size() != before
    }

    /// Integer cell edge length in use this tick.
    pub fn size(&self) -> f64 {
        self.current.round().max(1.0)
    }
}

fn clean_grid(value: f64) -> f64 {
    if value.is_finite() && value >= 2.0 {
        value
    } else {
        12.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::params::HomeRegion;
    use approx::assert_relative_eq;

    fn blob_at(id: usize, x: f64, y: f64) -> Blob {
        let mut blob = Blob::new(id, HomeRegion::Center, 0.0, 0.0);
        blob.x = x;
        blob.y = y;
        blob.cached_strength = 400.0;
        blob
    }

    #[test]
    fn shape_and_unshape_are_inverse() {
        for g in [0.5, 1.0, 1.5, 3.0] {
            let raw = unshape(0.05, g);
            assert_relative_eq!(shape(raw, g), 0.05, epsilon = 1e-9);
        }
    }

    #[test]
    fn shape_never_exceeds_unit_range() {
        assert_eq!(shape(50.0, 1.5), 1.0);
        assert_eq!(shape(-1.0, 1.5), 0.0);
    }

    #[test]
    fn influence_falls_with_distance() {
        let blob = blob_at(0, 100.0, 100.0);
        let noise = Perlin::new(1);
        let near = blob_influence(&blob, 110.0, 100.0, 0.0, &noise);
        let far = blob_influence(&blob, 200.0, 100.0, 0.0, &noise);
        assert!(near > far);
        assert!(blob_influence(&blob, 100.0, 100.0, 0.0, &noise).is_finite());
    }

    #[test]
    fn hidden_blob_contributes_nothing() {
        let mut blob = blob_at(0, 100.0, 100.0);
        blob.current.visible = false;
        assert_eq!(blob_influence(&blob, 100.0, 100.0, 0.0, &Perlin::new(0)), 0.0);
    }

    #[test]
    fn first_blob_wins_ties() {
        let a = blob_at(0, 100.0, 100.0);
        let mut b = blob_at(1, 100.0, 100.0);
        b.current.blobiness = a.current.blobiness;
        b.noise_seed = a.noise_seed;
        let s = sample(&[a, b], 120.0, 100.0, 0.0, &Perlin::new(0), &Thresholds::default());
        assert_eq!(s.dominant, Some(0));
    }

    #[test]
    fn thresholds_reject_bad_values() {
        let t = Thresholds::new(f64::NAN, 2.0, -1.0);
        assert_eq!(t, Thresholds::default());
    }

    #[test]
    fn grid_sizer_moves_in_small_steps() {
        let mut sizer = GridSizer::new(12.0, true);
        let mut prev = sizer.current;
        for _ in 0..100 {
            sizer.step(1.0);
            assert!((sizer.current - prev).abs() <= GRID_STEP + 1e-12);
            prev = sizer.current;
        }
        assert_eq!(sizer.size(), AUDIO_GRID_FINE);
    }

    #[test]
    fn grid_geometry() {
        let grid = Grid::new(100.0, 50.0, 12.0);
        assert_eq!((grid.cols, grid.rows), (9, 5));
        assert_eq!(grid.center(0, 0), (6.0, 6.0));
        assert_eq!(grid.cell_of(25.0, 13.0), (2, 1));
        assert!(!grid.contains(9, 0));
        assert_eq!(grid.cells().count(), 45);
    }
}
