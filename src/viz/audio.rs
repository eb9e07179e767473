// Audio-level conditioning: a short moving average followed by a slow
// exponential pass, approximate band smoothing, and the "volume effects"
// mapping from smoothed level to target visual parameters.

use std::collections::VecDeque;

use super::params::VisualParams;

/// Number of raw samples in the moving-average window.
pub const LEVEL_HISTORY: usize = 10;
/// Exponential smoothing factor applied after the moving average.
pub const LEVEL_SMOOTHING: f64 = 0.15;
/// Exponential smoothing factor for frequency bands.
pub const BAND_SMOOTHING: f64 = 0.2;
/// `blobSizeScale` target at silence while volume effects are on.
pub const QUIET_SIZE_SCALE: f64 = 1.5;
/// Smallest `blobSizeScale` target at full level, so a segment with a tiny
/// base size still grows when it gets loud.
pub const LOUD_SIZE_FLOOR: f64 = 1.8;

/// Smooths raw amplitude samples into a laggy, flicker-free level in [0, 1].
#[derive(Debug, Clone, Default)]
pub struct LevelSmoother {
    history: VecDeque<f64>,
    smoothed: f64,
}

impl LevelSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a raw level and return the new smoothed value. Non-finite input
    /// counts as silence.
    pub fn push(&mut self, raw: f64) -> f64 {
        let raw = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        if self.history.len() == LEVEL_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(raw);
        let mean = self.mean();
        self.smoothed += (mean - self.smoothed) * LEVEL_SMOOTHING;
        self.smoothed = self.smoothed.clamp(0.0, 1.0);
        self.smoothed
    }

    /// Arithmetic mean of the current window.
    pub fn mean(&self) -> f64 {
        if self.history.is_empty() {
            0.0
        } else {
            self.history.iter().sum::<f64>() / self.history.len() as f64
        }
    }

    pub fn level(&self) -> f64 {
        self.smoothed
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.smoothed = 0.0;
    }
}

/// Approximate bass/mid/treble energies, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrequencyBands {
    pub bass: f64,
    pub mid: f64,
    pub treble: f64,
}

impl FrequencyBands {
    pub fn new(bass: f64, mid: f64, treble: f64) -> Self {
        let clean = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            bass: clean(bass),
            mid: clean(mid),
            treble: clean(treble),
        }
    }

    /// Rough split from an overall level and a zero-crossing rate: low crossing
    /// rates read as bass-heavy, high rates as treble-heavy.
    pub fn estimate(level: f64, zero_crossing_rate: f64) -> Self {
        // Speech sits around 0.02–0.15 crossings per sample.
        let brightness = (zero_crossing_rate / 0.15).clamp(0.0, 1.0);
        let level = level.clamp(0.0, 1.0);
        Self::new(
            level * (1.0 - brightness),
            level * (1.0 - (brightness - 0.5).abs() * 2.0).max(0.0),
            level * brightness,
        )
    }

    /// Move toward `target` by the band smoothing factor.
    pub fn ease_toward(&mut self, target: FrequencyBands) {
        self.bass += (target.bass - self.bass) * BAND_SMOOTHING;
        self.mid += (target.mid - self.mid) * BAND_SMOOTHING;
        self.treble += (target.treble - self.treble) * BAND_SMOOTHING;
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Target parameters for `level` when volume effects are enabled. Every
/// affected field grows with level; silence keeps a small idle presence.
pub fn volume_targets(base: &VisualParams, level: f64) -> VisualParams {
    let c = level.clamp(0.0, 1.0).powf(0.7);
    VisualParams {
        size_scale: lerp(QUIET_SIZE_SCALE, (base.size_scale * 1.6).max(LOUD_SIZE_FLOOR), c),
        strength: base.strength * lerp(0.6, 1.4, c),
        motion_range: base.motion_range * lerp(0.4, 1.8, c),
        breathing_speed: base.breathing_speed * lerp(0.6, 2.5, c),
        blobiness: base.blobiness * lerp(0.5, 2.0, c),
        gradient_strength: base.gradient_strength * lerp(0.85, 1.3, c),
        volume_impact: base.volume_impact * lerp(0.5, 1.5, c),
        ..base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_input_is_monotone_and_bounded() {
        let mut smoother = LevelSmoother::new();
        for _ in 0..5 {
            smoother.push(0.0);
        }
        let mut prev = smoother.level();
        for _ in 0..200 {
            let level = smoother.push(1.0);
            assert!(level >= prev);
            assert!(level <= 1.0);
            assert!(level <= smoother.mean() + 1e-12);
            prev = level;
        }
        assert!(prev > 0.99);
    }

    #[test]
    fn non_finite_is_silence() {
        let mut smoother = LevelSmoother::new();
        smoother.push(f64::NAN);
        smoother.push(f64::INFINITY);
        assert_eq!(smoother.level(), 0.0);
    }

    #[test]
    fn history_is_bounded() {
        let mut smoother = LevelSmoother::new();
        for _ in 0..LEVEL_HISTORY {
            smoother.push(1.0);
        }
        for _ in 0..LEVEL_HISTORY {
            smoother.push(0.0);
        }
        assert_eq!(smoother.mean(), 0.0);
    }

    #[test]
    fn band_estimate_tracks_brightness() {
        let dark = FrequencyBands::estimate(0.8, 0.0);
        let bright = FrequencyBands::estimate(0.8, 0.3);
        assert!(dark.bass > dark.treble);
        assert!(bright.treble > bright.bass);
    }

    #[test]
    fn volume_targets_grow_with_level() {
        let base = VisualParams::default();
        let quiet = volume_targets(&base, 0.0);
        let loud = volume_targets(&base, 1.0);
        assert_eq!(quiet.size_scale, QUIET_SIZE_SCALE);
        assert!(loud.size_scale > quiet.size_scale);
        assert!(loud.strength > quiet.strength);
        assert!(loud.motion_range > quiet.motion_range);
        assert!(loud.breathing_speed > quiet.breathing_speed);
        assert!(loud.blobiness > quiet.blobiness);
        assert!(loud.gradient_strength > quiet.gradient_strength);
        assert!(loud.volume_impact > quiet.volume_impact);
    }

    #[test]
    fn small_base_size_still_grows_with_level() {
        for size_scale in [0.2, 0.5, 0.9, 1.0] {
            let base = VisualParams {
                size_scale,
                ..VisualParams::default()
            };
            let mut prev = volume_targets(&base, 0.0).size_scale;
            assert_eq!(prev, QUIET_SIZE_SCALE);
            for step in 1..=10 {
                let size = volume_targets(&base, step as f64 / 10.0).size_scale;
                assert!(size > prev, "base {} step {}: {} <= {}", size_scale, step, size, prev);
                prev = size;
            }
            assert_eq!(prev, LOUD_SIZE_FLOOR);
        }
    }
}
