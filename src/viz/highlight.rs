// Emotion highlight placement: a bounded, seeded search for grid cells inside
// a blob's silhouette where the renderer draws colored emotion glyphs.

use std::collections::HashMap;

use rand::Rng;

use super::blob::Blob;
use super::field::{blob_influence, estimated_radius, shape, Grid, Thresholds};
use super::noise::Perlin;

/// Hard cap on highlights per blob.
pub const MAX_HIGHLIGHTS: usize = 100;
/// Attempts per desired highlight before falling back.
pub const DEFAULT_MAX_ATTEMPTS: usize = 300;
/// `emotionCharAmount` percentage that leaves the base count unscaled.
pub const DEFAULT_CHAR_AMOUNT: f64 = 50.0;
pub const MAX_CHAR_AMOUNT: f64 = 200.0;

const MIN_BASE_COUNT: usize = 3;
const SPACING_FACTOR: f64 = 0.9;
const PHASES: usize = 16;

/// A persisted grid cell that draws an emotion glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionHighlight {
    pub gx: i64,
    pub gy: i64,
    pub emotion: String,
    /// Starting offset into the emotion's character set.
    pub phase: usize,
}

// ── Budget ──────────────────────────────────────────────────────────────────

/// Multiplier for an amount percentage: 50% → 1×, 100% → 2×, 200% → 4×.
pub fn amount_multiplier(percentage: f64) -> f64 {
    let p = if percentage.is_finite() {
        percentage.clamp(0.0, MAX_CHAR_AMOUNT)
    } else {
        DEFAULT_CHAR_AMOUNT
    };
    p / DEFAULT_CHAR_AMOUNT
}

/// Base count from a blob activity measure in [0, 1].
pub fn activity_base(activity: f64) -> usize {
    ((16.0 * activity.clamp(0.0, 1.0)).floor() as usize).max(MIN_BASE_COUNT)
}

/// Count before the hard cap is applied.
pub fn requested_count(base: usize, percentage: f64) -> f64 {
    base as f64 * amount_multiplier(percentage)
}

/// Final highlight budget in [0, MAX_HIGHLIGHTS].
pub fn target_count(base: usize, percentage: f64) -> usize {
    (requested_count(base, percentage).round() as usize).min(MAX_HIGHLIGHTS)
}

// ── Emotion assignment ──────────────────────────────────────────────────────

/// Split `total` across `weights` proportionally, handing rounding remainders
/// to the largest fractional parts first (earlier entries win ties).
pub fn allocate(weights: &[f64], total: usize) -> Vec<usize> {
    let sum: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if sum <= 0.0 || weights.is_empty() {
        return vec![0; weights.len()];
    }
    let quotas: Vec<f64> = weights
        .iter()
        .map(|w| {
            if w.is_finite() && *w > 0.0 {
                w / sum * total as f64
            } else {
                0.0
            }
        })
        .collect();
    let mut counts: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let assigned: usize = counts.iter().sum();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = quotas[a] - quotas[a].floor();
        let fb = quotas[b] - quotas[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });
    for &i in order.iter().take(total.saturating_sub(assigned)) {
        counts[i] += 1;
    }
    counts
}

/// Emotion label for each of `count` cells. With a distribution whose keys
/// all name emotions of the list, labels follow the proportional allocation
/// in list order; otherwise they cycle round-robin.
pub fn assign_emotions(
    emotions: &[String],
    distribution: Option<&HashMap<String, f64>>,
    count: usize,
    key: impl Fn(&str) -> String,
) -> Vec<String> {
    if emotions.is_empty() {
        return Vec::new();
    }
    let keys: Vec<String> = emotions.iter().map(|e| key(e.as_str())).collect();

    if let Some(dist) = distribution.filter(|d| !d.is_empty()) {
        let matches = dist.keys().all(|k| keys.contains(&key(k.as_str())));
        if matches {
            let mut weights = vec![0.0; emotions.len()];
            for (label, pct) in dist {
                if let Some(pos) = keys.iter().position(|k| *k == key(label.as_str())) {
                    weights[pos] += pct;
                }
            }
            let counts = allocate(&weights, count);
            if counts.iter().sum::<usize>() == count {
                return emotions
                    .iter()
                    .zip(counts)
                    .flat_map(|(label, n)| std::iter::repeat(label.clone()).take(n))
                    .collect();
            }
        } else {
            tracing::debug!("emotion distribution does not match emotion list, using round-robin");
        }
    }

    (0..count).map(|i| emotions[i % emotions.len()].clone()).collect()
}

// ── Search ──────────────────────────────────────────────────────────────────

/// Inputs for placing one blob's highlights.
pub struct PlacementRequest<'a> {
    pub blob: &'a Blob,
    pub grid: Grid,
    pub thresholds: Thresholds,
    pub noise: &'a Perlin,
    pub time: f64,
    pub count: usize,
    pub distribution: Option<&'a HashMap<String, f64>>,
}

#[derive(Debug, Clone)]
pub struct EmotionHighlightPlacer {
    pub max_attempts: usize,
}

impl Default for EmotionHighlightPlacer {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl EmotionHighlightPlacer {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Choose up to `request.count` cells inside the blob and label them
    /// with its emotions. `key` folds labels for distribution matching.
    pub fn place(
        &self,
        request: &PlacementRequest<'_>,
        rng: &mut impl Rng,
        key: impl Fn(&str) -> String,
    ) -> Vec<EmotionHighlight> {
        let blob = request.blob;
        let count = request.count.min(MAX_HIGHLIGHTS);
        if count == 0 || blob.emotions.is_empty() || !blob.is_visible() {
            return Vec::new();
        }

        let grid = request.grid;
        let t = request.thresholds;
        let radius_px = estimated_radius(blob, t.final_draw * t.placement_relax);
        let radius = (radius_px / grid.cell).ceil().max(1.0);
        let min_spacing = (radius / (count as f64).sqrt() * SPACING_FACTOR).max(1.0);
        let (cx, cy) = grid.cell_of(blob.x, blob.y);

        let evaluate = |gx: i64, gy: i64| -> Option<f64> {
            if !grid.contains(gx, gy) {
                return None;
            }
            let (x, y) = grid.center(gx, gy);
            let raw = blob_influence(blob, x, y, request.time, request.noise);
            Some(raw)
        };

        let mut accepted: Vec<(i64, i64)> = Vec::with_capacity(count);
        let mut systematic = 0usize;
        let mut fallbacks = 0usize;

        for _ in 0..count {
            let mut best: Option<((i64, i64), f64)> = None;
            let mut found = None;

            for attempt in 0..self.max_attempts {
                let (gx, gy) = match attempt % 10 {
                    0..=5 => {
                        let (lo, hi) = match attempt % 3 {
                            0 => (0.0, 0.4),
                            1 => (0.4, 0.75),
                            _ => (0.75, 1.0),
                        };
                        let r = rng.gen_range(lo..hi) * radius;
                        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
                        (
                            cx + (r * angle.cos()).round() as i64,
                            cy + (r * angle.sin()).round() as i64,
                        )
                    }
                    6 | 7 => {
                        let step = min_spacing.round().max(1.0) as i64;
                        let (dx, dy) = spiral(systematic);
                        systematic += 1;
                        (cx + dx * step, cy + dy * step)
                    }
                    _ => {
                        let r = radius as i64;
                        (cx + rng.gen_range(-r..=r), cy + rng.gen_range(-r..=r))
                    }
                };

                if accepted.contains(&(gx, gy)) {
                    continue;
                }
                let Some(raw) = evaluate(gx, gy) else { continue };
                if raw <= t.draw {
                    continue;
                }
                if best.map_or(true, |(_, b)| raw > b) {
                    best = Some(((gx, gy), raw));
                }
                let shaped = shape(raw, blob.current.gradient_strength);
                if !t.qualifies_for_placement(raw, shaped) {
                    continue;
                }
                let spaced = accepted.iter().all(|&(ax, ay)| {
                    let dx = (ax - gx) as f64;
                    let dy = (ay - gy) as f64;
                    (dx * dx + dy * dy).sqrt() >= min_spacing
                });
                if spaced {
                    found = Some((gx, gy));
                    break;
                }
            }

            match found.or_else(|| best.map(|(cell, _)| cell)) {
                Some(cell) => {
                    if found.is_none() {
                        fallbacks += 1;
                    }
                    accepted.push(cell);
                }
                None => continue,
            }
        }

        let labels = assign_emotions(&blob.emotions, request.distribution, accepted.len(), key);
        tracing::debug!(
            blob = blob.id,
            requested = count,
            placed = accepted.len(),
            fallbacks,
            "placed emotion highlights"
        );
        accepted
            .into_iter()
            .zip(labels)
            .map(|((gx, gy), emotion)| EmotionHighlight {
                gx,
                gy,
                emotion,
                phase: rng.gen_range(0..PHASES),
            })
            .collect()
    }
}

/// `k`-th offset of a square spiral around the origin.
fn spiral(k: usize) -> (i64, i64) {
    if k == 0 {
        return (0, 0);
    }
    let n = k as i64;
    let ring = (((n as f64).sqrt() - 1.0) / 2.0).floor() as i64 + 1;
    let side = 2 * ring;
    let offset = n - (2 * ring - 1).pow(2);
    let pos = offset % side;
    match offset / side {
        0 => (ring, -ring + 1 + pos),
        1 => (ring - 1 - pos, ring),
        2 => (-ring, ring - 1 - pos),
        _ => (-ring + 1 + pos, -ring),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn multiplier_is_percentage_over_fifty() {
        assert_eq!(amount_multiplier(50.0), 1.0);
        assert_eq!(amount_multiplier(100.0), 2.0);
        assert_eq!(amount_multiplier(200.0), 4.0);
        assert_eq!(amount_multiplier(500.0), 4.0);
        assert_eq!(amount_multiplier(f64::NAN), 1.0);
    }

    #[test]
    fn budget_is_capped() {
        assert_eq!(target_count(60, 200.0), MAX_HIGHLIGHTS);
        assert_eq!(target_count(8, 50.0), 8);
        assert_eq!(activity_base(0.0), 3);
        assert_eq!(activity_base(1.0), 16);
    }

    #[test]
    fn largest_remainder_allocation() {
        assert_eq!(allocate(&[33.0, 33.0, 34.0], 10), vec![3, 3, 4]);
        assert_eq!(allocate(&[60.0, 40.0], 10), vec![6, 4]);
        assert_eq!(allocate(&[1.0, 1.0, 1.0], 10), vec![4, 3, 3]);
        assert_eq!(allocate(&[0.0, 0.0], 5), vec![0, 0]);
    }

    #[test]
    fn distribution_must_match_emotion_list() {
        let emotions = labels(&["Joy", "Sad"]);
        let mut dist = HashMap::new();
        dist.insert("joy".to_string(), 60.0);
        dist.insert("SAD".to_string(), 40.0);
        let out = assign_emotions(&emotions, Some(&dist), 10, |s| s.to_lowercase());
        assert_eq!(out.iter().filter(|e| *e == "Joy").count(), 6);
        assert_eq!(out.iter().filter(|e| *e == "Sad").count(), 4);

        dist.insert("anger".to_string(), 10.0);
        let out = assign_emotions(&emotions, Some(&dist), 4, |s| s.to_lowercase());
        assert_eq!(out, labels(&["Joy", "Sad", "Joy", "Sad"]));
    }

    #[test]
    fn spiral_visits_distinct_cells() {
        let cells: Vec<_> = (0..25).map(spiral).collect();
        for (i, a) in cells.iter().enumerate() {
            assert!(a.0.abs() <= 2 && a.1.abs() <= 2);
            assert!(!cells[i + 1..].contains(a));
        }
    }
}
