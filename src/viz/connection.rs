// Lines between visible blobs that are close enough to each other.

use super::blob::Blob;
use super::render::{mean_color, DrawCommand, Rgba};

/// Max connection distance as a fraction of canvas width.
pub const MAX_DISTANCE_FRACTION: f64 = 0.5;
const MAX_WEIGHT: f64 = 4.0;
const MIN_WEIGHT: f64 = 0.5;
const MAX_ALPHA: f64 = 0.8;
const ENDPOINT_RADIUS: f64 = 3.0;

/// Connection primitives for every pair of visible blobs closer than half
/// the canvas width. Opacity and weight fall off linearly with distance.
pub fn connections(blobs: &[Blob], canvas_width: f64) -> Vec<DrawCommand> {
    let max_distance = canvas_width * MAX_DISTANCE_FRACTION;
    let mut out = Vec::new();
    if max_distance <= 0.0 {
        return out;
    }
    for (i, a) in blobs.iter().enumerate() {
        if !a.is_visible() {
            continue;
        }
        for b in blobs.iter().skip(i + 1).filter(|b| b.is_visible()) {
            let distance = a.distance_to(b);
            if distance >= max_distance {
                continue;
            }
            let closeness = 1.0 - distance / max_distance;
            let color = Rgba::new(mean_color(a.primary_color(), b.primary_color()), MAX_ALPHA * closeness);
            out.push(DrawCommand::Line {
                x1: a.x,
                y1: a.y,
                x2: b.x,
                y2: b.y,
                weight: MIN_WEIGHT + (MAX_WEIGHT - MIN_WEIGHT) * closeness,
                color,
            });
            for end in [a, b] {
                out.push(DrawCommand::Circle {
                    x: end.x,
                    y: end.y,
                    radius: ENDPOINT_RADIUS,
                    color,
                });
            }
        }
    }
    out
}

/// Weight and alpha of the strongest possible connection.
pub fn max_line_style() -> (f64, f64) {
    (MAX_WEIGHT, MAX_ALPHA)
}
