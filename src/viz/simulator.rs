// Blob physics: parameter easing, spacing repulsion, per-blob personality
// motion around the home anchor, integration with damping and tethering,
// and the cached field strength the renderer reads.

use rand::Rng;

use super::audio::{volume_targets, FrequencyBands};
use super::blob::Blob;
use super::noise::Perlin;
use super::params::{HomeRegion, VisualParams};

/// Fraction of the remaining distance covered per tick when easing params.
pub const EASING: f64 = 0.15;
/// Blur at or above this freezes motion and ignores spacing.
pub const FULL_BLUR: f64 = 10.0;
/// `volumeImpact` units per 1.0 of growth-pattern gain.
pub const VOLUME_IMPACT_UNIT: f64 = 400.0;

const SPACING_FORCE: f64 = 0.15;
const MAX_SPACING_IMPULSE: f64 = 2.0;
const MIN_SPACING_DISTANCE: f64 = 1.0;
const CONSTRAINED_MOTION: f64 = 0.35;
const SEEK_GAIN: f64 = 0.02;
const MAX_SPEED: f64 = 6.0;
const DAMPING: f64 = 0.9;
const HOME_RADIUS_MULT: f64 = 2.5;
const MIN_HOME_RADIUS: f64 = 40.0;
const PULL_BACK: f64 = 0.01;
const EDGE_OVERFLOW: f64 = 0.05;
const EDGE_BOUNCE: f64 = 0.3;
const BREATH_DEPTH: f64 = 0.08;

/// Owns the blobs and advances them once per tick.
#[derive(Debug, Clone)]
pub struct BlobSimulator {
    blobs: Vec<Blob>,
    width: f64,
    height: f64,
    pub volume_effects: bool,
}

impl BlobSimulator {
    /// Create `count` blobs at their speaker-slot home anchors.
    pub fn new(count: usize, width: f64, height: f64, rng: &mut impl Rng) -> Self {
        let blobs = (0..count)
            .map(|id| {
                let mut blob = Blob::new(
                    id,
                    HomeRegion::for_slot(id),
                    rng.gen_range(0.0..std::f64::consts::TAU),
                    rng.gen_range(0.0..1000.0),
                );
                blob.reset_position(width, height);
                blob
            })
            .collect();
        Self {
            blobs,
            width,
            height,
            volume_effects: true,
        }
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn blob(&self, id: usize) -> Option<&Blob> {
        self.blobs.get(id)
    }

    pub fn blob_mut(&mut self, id: usize) -> Option<&mut Blob> {
        self.blobs.get_mut(id)
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Change canvas size, scaling blob positions proportionally.
    pub fn resize(&mut self, width: f64, height: f64) {
        if self.width > 0.0 && self.height > 0.0 {
            let sx = width / self.width;
            let sy = height / self.height;
            for blob in &mut self.blobs {
                blob.x *= sx;
                blob.y *= sy;
            }
        } else {
            for blob in &mut self.blobs {
                blob.reset_position(width, height);
            }
        }
        self.width = width;
        self.height = height;
    }

    /// Feed one raw amplitude sample and re-derive the blob's targets.
    pub fn set_audio_level(&mut self, id: usize, raw: f64) {
        let volume_effects = self.volume_effects;
        if let Some(blob) = self.blobs.get_mut(id) {
            blob.smoother.push(raw);
            retarget(blob, volume_effects);
        }
    }

    pub fn set_frequency_response(&mut self, id: usize, bands: FrequencyBands) {
        if let Some(blob) = self.blobs.get_mut(id) {
            blob.bands.ease_toward(bands);
        }
    }

    /// Install new segment-resolved parameters for a blob.
    pub fn set_base_params(&mut self, id: usize, params: VisualParams) {
        let volume_effects = self.volume_effects;
        if let Some(blob) = self.blobs.get_mut(id) {
            blob.base = params.sanitized(&VisualParams::default());
            retarget(blob, volume_effects);
        }
    }

    pub fn set_volume_effects(&mut self, enabled: bool) {
        self.volume_effects = enabled;
        for blob in &mut self.blobs {
            retarget(blob, enabled);
        }
    }

    /// Recompute field strength without moving anything.
    pub fn refresh_strength(&mut self, time: f64) {
        for blob in &mut self.blobs {
            blob.cached_strength = field_strength(blob, time);
        }
    }

    /// Advance every blob by one tick. `time` is seconds since session start.
    pub fn update(&mut self, time: f64, noise: &Perlin) {
        let snapshot: Vec<(f64, f64, bool)> = self
            .blobs
            .iter()
            .map(|b| (b.x, b.y, b.is_visible()))
            .collect();
        let (width, height) = (self.width, self.height);

        for (i, blob) in self.blobs.iter_mut().enumerate() {
            ease_params(&mut blob.current, &blob.target);

            let frozen = blob.current.blur >= FULL_BLUR;
            blob.spacing_constrained = false;
            if blob.is_visible() && !frozen {
                apply_spacing(blob, i, &snapshot);
            }
            if !frozen {
                apply_personality(blob, time, noise, width, height);
            }
            integrate(blob, width, height);

            blob.cached_strength = field_strength(blob, time);
        }
    }
}

/// Recompute targets from the base record and the smoothed level.
fn retarget(blob: &mut Blob, volume_effects: bool) {
    let target = if volume_effects {
        volume_targets(&blob.base, blob.audio_level())
    } else {
        blob.base.clone()
    };
    blob.target = target.sanitized(&blob.base);
}

/// Exponential ease for numeric fields; blur/humor/shine/visibility and the
/// growth pattern snap.
pub fn ease_params(current: &mut VisualParams, target: &VisualParams) {
    let pairs = [
        (&mut current.strength, target.strength),
        (&mut current.size_scale, target.size_scale),
        (&mut current.volume_impact, target.volume_impact),
        (&mut current.spread, target.spread),
        (&mut current.motion_range, target.motion_range),
        (&mut current.breathing_speed, target.breathing_speed),
        (&mut current.gradient_strength, target.gradient_strength),
        (&mut current.blobiness, target.blobiness),
        (&mut current.spacing_distance, target.spacing_distance),
        (&mut current.density, target.density),
    ];
    for (value, goal) in pairs {
        *value += (goal - *value) * EASING;
    }
    current.blur = target.blur;
    current.humor = target.humor;
    current.shine = target.shine;
    current.visible = target.visible;
    current.growth_pattern = target.growth_pattern;
}

fn apply_spacing(blob: &mut Blob, index: usize, snapshot: &[(f64, f64, bool)]) {
    let spacing = blob.current.spacing_distance;
    if spacing <= 0.0 {
        return;
    }
    for (j, &(ox, oy, visible)) in snapshot.iter().enumerate() {
        if j == index || !visible {
            continue;
        }
        let dx = blob.x - ox;
        let dy = blob.y - oy;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist >= spacing {
            continue;
        }
        blob.spacing_constrained = true;
        // Coincident blobs separate along x, lower id to the left.
        let (nx, ny) = if dist > 1e-6 {
            (dx / dist, dy / dist)
        } else if index < j {
            (-1.0, 0.0)
        } else {
            (1.0, 0.0)
        };
        let push = (SPACING_FORCE * (spacing / dist.max(MIN_SPACING_DISTANCE) - 1.0))
            .min(MAX_SPACING_IMPULSE);
        blob.vx += nx * push;
        blob.vy += ny * push;
    }
}

fn apply_personality(blob: &mut Blob, time: f64, noise: &Perlin, width: f64, height: f64) {
    let (hx, hy) = blob.home(width, height);
    let level = blob.audio_level();
    let blur_factor = (1.0 - blob.current.blur / FULL_BLUR).clamp(0.0, 1.0);
    let intensity = if blob.spacing_constrained {
        CONSTRAINED_MOTION
    } else {
        1.0
    } * blur_factor;
    if intensity <= 0.0 {
        return;
    }

    let range = blob.current.motion_range * (0.3 + 0.7 * level) * intensity;
    let t = time * (0.5 + 0.5 * level) + blob.time_offset;
    let (ox, oy) = match blob.id % 4 {
        // orbit
        0 => ((t * 0.5).cos() * range, (t * 0.5).sin() * range),
        // figure-eight
        1 => ((t * 0.4).sin() * range, (t * 0.8).sin() * range * 0.5),
        // pulsing radial
        2 => {
            let r = range * (0.5 + 0.5 * (t * 1.2).sin());
            let angle = t * 0.2;
            (angle.cos() * r, angle.sin() * r)
        }
        // noise wander
        _ => {
            let seed = blob.noise_seed;
            (
                (noise.noise2(t * 0.15, seed) - 0.5) * 2.0 * range,
                (noise.noise2(seed + 50.0, t * 0.15) - 0.5) * 2.0 * range,
            )
        }
    };

    blob.vx += (hx + ox - blob.x) * SEEK_GAIN * intensity;
    blob.vy += (hy + oy - blob.y) * SEEK_GAIN * intensity;
}

fn integrate(blob: &mut Blob, width: f64, height: f64) {
    blob.x += blob.vx;
    blob.y += blob.vy;

    let speed = (blob.vx * blob.vx + blob.vy * blob.vy).sqrt();
    if speed > MAX_SPEED {
        blob.vx *= MAX_SPEED / speed;
        blob.vy *= MAX_SPEED / speed;
    }
    blob.vx *= DAMPING;
    blob.vy *= DAMPING;

    let (hx, hy) = blob.home(width, height);
    let home_radius = (blob.current.motion_range * HOME_RADIUS_MULT).max(MIN_HOME_RADIUS);
    let dx = hx - blob.x;
    let dy = hy - blob.y;
    if (dx * dx + dy * dy).sqrt() > home_radius {
        blob.vx += dx * PULL_BACK;
        blob.vy += dy * PULL_BACK;
    }

    let mx = width * EDGE_OVERFLOW;
    let my = height * EDGE_OVERFLOW;
    if blob.x < -mx {
        blob.x = -mx;
        blob.vx = blob.vx.abs() * EDGE_BOUNCE;
    } else if blob.x > width + mx {
        blob.x = width + mx;
        blob.vx = -blob.vx.abs() * EDGE_BOUNCE;
    }
    if blob.y < -my {
        blob.y = -my;
        blob.vy = blob.vy.abs() * EDGE_BOUNCE;
    } else if blob.y > height + my {
        blob.y = height + my;
        blob.vy = -blob.vy.abs() * EDGE_BOUNCE;
    }
}

/// `strength × growth response × breathing`, lifted slightly by bass energy.
fn field_strength(blob: &Blob, time: f64) -> f64 {
    let p = &blob.current;
    let response = p
        .growth_pattern
        .response(blob.audio_level(), p.volume_impact / VOLUME_IMPACT_UNIT);
    let breath_speed = p.breathing_speed * (1.0 + 0.5 * blob.bands.mid);
    let breathing = 1.0 + BREATH_DEPTH * (time * breath_speed * 2.0 + blob.time_offset).sin();
    p.strength * response * breathing * (1.0 + 0.3 * blob.bands.bass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sim() -> BlobSimulator {
        BlobSimulator::new(2, 800.0, 600.0, &mut StdRng::seed_from_u64(1))
    }

    #[test]
    fn easing_converges_monotonically() {
        let mut s = sim();
        s.set_volume_effects(false);
        let mut params = VisualParams::default();
        params.strength = 1200.0;
        params.spread = 5.0;
        s.set_base_params(0, params);
        let noise = Perlin::new(0);
        let start = s.blob(0).unwrap().current.strength;
        let mut prev_gap = (1200.0 - start).abs();
        for tick in 0..50 {
            s.update(tick as f64 / 30.0, &noise);
            let gap = (1200.0 - s.blob(0).unwrap().current.strength).abs();
            assert!(gap <= prev_gap);
            prev_gap = gap;
        }
        assert!(prev_gap <= (1200.0 - start).abs() * 1e-3);
        assert!((s.blob(0).unwrap().current.spread - 5.0).abs() < 0.01);
    }

    #[test]
    fn special_fields_snap() {
        let mut s = sim();
        let mut params = VisualParams::default();
        params.blur = 4.0;
        params.shine = 2.0;
        params.visible = false;
        s.set_base_params(1, params);
        s.update(0.0, &Perlin::new(0));
        let current = &s.blob(1).unwrap().current;
        assert_eq!(current.blur, 4.0);
        assert_eq!(current.shine, 2.0);
        assert!(!current.visible);
    }

    #[test]
    fn close_blobs_are_pushed_apart() {
        let mut s = sim();
        for id in 0..2 {
            let blob = s.blob_mut(id).unwrap();
            blob.x = 400.0 + id as f64 * 10.0;
            blob.y = 300.0;
            blob.current.motion_range = 0.0;
        }
        s.update(0.0, &Perlin::new(0));
        let a = s.blob(0).unwrap();
        let b = s.blob(1).unwrap();
        assert!(a.spacing_constrained && b.spacing_constrained);
        assert!(a.vx < 0.0);
        assert!(b.vx > 0.0);
    }

    #[test]
    fn fully_blurred_blob_ignores_spacing() {
        let mut s = sim();
        let mut params = VisualParams::default();
        params.blur = FULL_BLUR;
        s.set_base_params(0, params);
        for id in 0..2 {
            let blob = s.blob_mut(id).unwrap();
            blob.x = 400.0;
            blob.y = 300.0;
        }
        s.update(0.0, &Perlin::new(0));
        assert!(!s.blob(0).unwrap().spacing_constrained);
    }

    #[test]
    fn blobs_stay_near_canvas() {
        let mut s = sim();
        let noise = Perlin::new(9);
        for id in 0..2 {
            let blob = s.blob_mut(id).unwrap();
            blob.vx = 500.0;
            blob.vy = -500.0;
        }
        for tick in 0..600 {
            s.set_audio_level(0, 1.0);
            s.update(tick as f64 / 30.0, &noise);
            for blob in s.blobs() {
                assert!(blob.x >= -40.0 && blob.x <= 840.0);
                assert!(blob.y >= -30.0 && blob.y <= 630.0);
            }
        }
    }

    #[test]
    fn quiet_floor_with_volume_effects() {
        let mut s = sim();
        let noise = Perlin::new(0);
        for tick in 0..120 {
            s.set_audio_level(0, 0.0);
            s.update(tick as f64 / 30.0, &noise);
        }
        let blob = s.blob(0).unwrap();
        assert_eq!(blob.target.size_scale, crate::viz::audio::QUIET_SIZE_SCALE);
        assert!((blob.current.size_scale - blob.target.size_scale).abs() < 0.01);

        s.set_volume_effects(false);
        assert_eq!(s.blob(0).unwrap().target.size_scale, VisualParams::default().size_scale);
    }

    #[test]
    fn louder_means_stronger() {
        let mut quiet = sim();
        let mut loud = sim();
        let noise = Perlin::new(0);
        for tick in 0..90 {
            quiet.set_audio_level(0, 0.0);
            loud.set_audio_level(0, 0.9);
            quiet.update(tick as f64 / 30.0, &noise);
            loud.update(tick as f64 / 30.0, &noise);
        }
        assert!(loud.blob(0).unwrap().cached_strength > quiet.blob(0).unwrap().cached_strength);
    }
}
