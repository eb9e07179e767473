// Field renderer. Walks the grid once per frame, picks the dominant blob per
// cell and emits draw commands: a colored emotion glyph where the blob has a
// persisted highlight, a density character everywhere else inside the blob.
//
// Output goes through `RenderSurface` so the same frame can be drawn into a
// terminal buffer or recorded for tests.

use std::collections::HashMap;

use rand::Rng;

use super::blob::Blob;
use super::emotion::{EmotionPalette, Rgb};
use super::field::{sample, Grid, Thresholds};
use super::highlight::EmotionHighlight;
use super::noise::Perlin;
use super::simulator::FULL_BLUR;

/// Low→high density ramp used when a segment supplies none.
pub const DEFAULT_DENSITY_RAMP: &[char] = &[' ', '░', '▒', '▓', '█'];
const BASE_GRAY: Rgb = [200, 200, 200];
const FAST_CYCLE_TICKS: u64 = 4;
const SLOW_CYCLE_TICKS: u64 = 12;
const ACTIVE_THRESHOLD: f64 = 0.6;

/// RGB color with alpha in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub fn new(rgb: Rgb, alpha: f64) -> Self {
        Self {
            r: rgb[0],
            g: rgb[1],
            b: rgb[2],
            a: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn rgb(&self) -> Rgb {
        [self.r, self.g, self.b]
    }
}

/// One primitive for the drawing collaborator. Coordinates are canvas units.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Glyph {
        ch: char,
        x: f64,
        y: f64,
        size: f64,
        color: Rgba,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        weight: f64,
        color: Rgba,
    },
    Circle {
        x: f64,
        y: f64,
        radius: f64,
        color: Rgba,
    },
}

/// Anything that can place glyphs, lines and circles.
pub trait RenderSurface {
    fn draw(&mut self, command: DrawCommand);
}

/// Surface that keeps every command, for tests and snapshots.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn glyphs(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Glyph { .. }))
    }

    pub fn lines(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { .. }))
    }

    pub fn circles(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Circle { .. }))
    }
}

impl RenderSurface for RecordingSurface {
    fn draw(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

/// Character ramp and glyph sizes for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub density_ramp: Vec<char>,
    pub glyph_size: f64,
    pub highlight_size: f64,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            density_ramp: DEFAULT_DENSITY_RAMP.to_vec(),
            glyph_size: 12.0,
            highlight_size: 14.0,
        }
    }
}

impl RenderStyle {
    /// Use `chars` as the density ramp; fewer than two characters keeps the
    /// default ramp.
    pub fn set_ramp(&mut self, chars: &str) {
        let ramp: Vec<char> = chars.chars().collect();
        self.density_ramp = if ramp.len() >= 2 {
            ramp
        } else {
            DEFAULT_DENSITY_RAMP.to_vec()
        };
    }
}

/// Everything one frame of the field needs, borrowed from the session.
pub struct FieldRenderer<'a> {
    pub blobs: &'a [Blob],
    pub highlights: &'a [Vec<EmotionHighlight>],
    pub palette: &'a EmotionPalette,
    pub grid: Grid,
    pub thresholds: Thresholds,
    pub noise: &'a Perlin,
    pub style: &'a RenderStyle,
    pub time: f64,
    pub tick: u64,
}

impl FieldRenderer<'_> {
    /// Emit every drawn cell. `rng` only resolves misaligned emotion colors.
    pub fn draw(&self, rng: &mut impl Rng, surface: &mut dyn RenderSurface) {
        let lookup: Vec<HashMap<(i64, i64), &EmotionHighlight>> = self
            .highlights
            .iter()
            .map(|list| {
                let mut cells = HashMap::with_capacity(list.len());
                for h in list {
                    cells.entry((h.gx, h.gy)).or_insert(h);
                }
                cells
            })
            .collect();

        for (gx, gy) in self.grid.cells() {
            let (cx, cy) = self.grid.center(gx, gy);
            let s = sample(self.blobs, cx, cy, self.time, self.noise, &self.thresholds);
            let Some(i) = s.dominant else { continue };
            if !self.thresholds.is_drawn(&s) {
                continue;
            }
            let blob = &self.blobs[i];
            let command = match lookup.get(i).and_then(|cells| cells.get(&(gx, gy))) {
                Some(h) => self.highlight_glyph(blob, h, cx, cy, s.shaped, rng),
                None => match self.density_glyph(blob, cx, cy, s.shaped) {
                    Some(command) => command,
                    None => continue,
                },
            };
            surface.draw(command);
        }
    }

    fn density_glyph(&self, blob: &Blob, x: f64, y: f64, shaped: f64) -> Option<DrawCommand> {
        let ch = density_char(&self.style.density_ramp, shaped, self.thresholds.final_draw);
        if ch.is_whitespace() {
            return None;
        }
        let brightness = (0.55 + 0.45 * shaped) * self.shine_boost(blob);
        let alpha = (0.35 + 0.65 * shaped) * blur_alpha(blob.current.blur);
        Some(DrawCommand::Glyph {
            ch,
            x,
            y,
            size: self.style.glyph_size,
            color: Rgba::new(scale(BASE_GRAY, brightness), alpha),
        })
    }

    fn highlight_glyph(
        &self,
        blob: &Blob,
        h: &EmotionHighlight,
        x: f64,
        y: f64,
        shaped: f64,
        rng: &mut impl Rng,
    ) -> DrawCommand {
        let color = self.emotion_color(blob, &h.emotion, rng);
        let wobble = self
            .noise
            .noise(h.gx as f64 * 0.1, h.gy as f64 * 0.1, self.time * 0.5);
        let activity = (0.4 * shaped + 0.4 * blob.audio_level() + 0.2 * wobble).clamp(0.0, 1.0);

        let charset = self.palette.charset(&h.emotion);
        let period = if activity > ACTIVE_THRESHOLD {
            FAST_CYCLE_TICKS
        } else {
            SLOW_CYCLE_TICKS
        };
        let step = (self.tick / period) as usize;
        let ch = charset[(h.phase + step) % charset.len()];

        let humor = blob.current.humor;
        let (jx, jy) = if humor > 0.0 {
            let reach = humor * self.grid.cell * 0.5;
            (
                (self.noise.noise(h.gx as f64 * 0.3, h.gy as f64 * 0.3, self.time * 0.8) - 0.5) * 2.0 * reach,
                (self.noise.noise(h.gx as f64 * 0.3 + 40.0, h.gy as f64 * 0.3, self.time * 0.8) - 0.5) * 2.0 * reach,
            )
        } else {
            (0.0, 0.0)
        };

        DrawCommand::Glyph {
            ch,
            x: x + jx,
            y: y + jy,
            size: self.style.highlight_size * (1.0 + 0.5 * activity),
            color: Rgba::new(
                scale(color, self.shine_boost(blob)),
                blur_alpha(blob.current.blur),
            ),
        }
    }

    /// Display color aligned with `emotion`'s index in the blob's emotion list.
    fn emotion_color(&self, blob: &Blob, emotion: &str, rng: &mut impl Rng) -> Rgb {
        let aligned = blob
            .emotion_index(emotion, |l| self.palette.canonical(l))
            .and_then(|k| blob.display_colors.get(k));
        match aligned {
            Some(rgb) => *rgb,
            None if !blob.display_colors.is_empty() => {
                tracing::trace!(blob = blob.id, emotion, "emotion/color lists misaligned");
                blob.display_colors[rng.gen_range(0..blob.display_colors.len())]
            }
            None => blob.primary_color(),
        }
    }

    fn shine_boost(&self, blob: &Blob) -> f64 {
        let shine = blob.current.shine;
        if shine <= 0.0 {
            return 1.0;
        }
        let pulse = 0.5 + 0.5 * (self.time * 3.0 + blob.time_offset).sin();
        1.0 + shine * 0.15 * pulse
    }
}

/// Map shaped influence linearly onto the ramp, starting at the final
/// threshold. Drawn cells never map to the first (empty) entry.
pub fn density_char(ramp: &[char], shaped: f64, final_threshold: f64) -> char {
    let ramp = if ramp.len() >= 2 { ramp } else { DEFAULT_DENSITY_RAMP };
    let top = ramp.len() - 1;
    let span = (1.0 - final_threshold).max(1e-9);
    let t = ((shaped - final_threshold) / span).clamp(0.0, 1.0);
    let idx = ((t * top as f64).ceil() as usize).clamp(1, top);
    ramp[idx]
}

/// Opacity multiplier for `blur`; fully blurred keeps a faint trace.
pub fn blur_alpha(blur: f64) -> f64 {
    1.0 - (blur / FULL_BLUR).clamp(0.0, 1.0) * 0.8
}

fn scale(rgb: Rgb, factor: f64) -> Rgb {
    rgb.map(|c| (c as f64 * factor).round().clamp(0.0, 255.0) as u8)
}

/// Component-wise mean of two colors.
pub fn mean_color(a: Rgb, b: Rgb) -> Rgb {
    [
        ((a[0] as u16 + b[0] as u16) / 2) as u8,
        ((a[1] as u16 + b[1] as u16) / 2) as u8,
        ((a[2] as u16 + b[2] as u16) / 2) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::params::HomeRegion;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn blob_at(x: f64, y: f64) -> Blob {
        let mut blob = Blob::new(0, HomeRegion::Center, 0.0, 0.0);
        blob.x = x;
        blob.y = y;
        blob.cached_strength = 400.0;
        blob.current.blobiness = 0.0;
        blob
    }

    fn renderer<'a>(
        blobs: &'a [Blob],
        highlights: &'a [Vec<EmotionHighlight>],
        palette: &'a EmotionPalette,
        noise: &'a Perlin,
        style: &'a RenderStyle,
    ) -> FieldRenderer<'a> {
        FieldRenderer {
            blobs,
            highlights,
            palette,
            grid: Grid::new(240.0, 240.0, 12.0),
            thresholds: Thresholds::default(),
            noise,
            style,
            time: 0.0,
            tick: 0,
        }
    }

    #[test]
    fn density_char_spans_ramp() {
        assert_eq!(density_char(DEFAULT_DENSITY_RAMP, 0.05, 0.05), '░');
        assert_eq!(density_char(DEFAULT_DENSITY_RAMP, 1.0, 0.05), '█');
        assert_eq!(density_char(&['.'], 1.0, 0.05), '█');
    }

    #[test]
    fn blur_only_dims() {
        assert_eq!(blur_alpha(0.0), 1.0);
        assert!((blur_alpha(20.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn highlight_cell_draws_emotion_color() {
        let mut blob = blob_at(120.0, 120.0);
        blob.emotions = vec!["joy".into()];
        blob.display_colors = vec![[1, 2, 3]];
        let (gx, gy) = (10, 10);
        let highlights = vec![vec![EmotionHighlight {
            gx,
            gy,
            emotion: "joy".into(),
            phase: 0,
        }]];
        let palette = EmotionPalette::new();
        let noise = Perlin::new(0);
        let style = RenderStyle::default();
        let blobs = [blob];
        let r = renderer(&blobs, &highlights, &palette, &noise, &style);
        let mut surface = RecordingSurface::new();
        r.draw(&mut StdRng::seed_from_u64(0), &mut surface);

        let colored: Vec<_> = surface
            .glyphs()
            .filter_map(|c| match c {
                DrawCommand::Glyph { color, .. } if color.rgb() == [1, 2, 3] => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(colored.len(), 1);
        assert!(surface.glyphs().count() > 1);
    }

    #[test]
    fn same_seed_same_frame() {
        let mut blob = blob_at(100.0, 130.0);
        blob.emotions = vec!["a".into(), "b".into()];
        blob.display_colors = vec![[9, 9, 9]];
        let highlights = vec![vec![EmotionHighlight {
            gx: 8,
            gy: 10,
            emotion: "b".into(),
            phase: 1,
        }]];
        let palette = EmotionPalette::new();
        let noise = Perlin::new(4);
        let style = RenderStyle::default();
        let blobs = [blob];
        let r = renderer(&blobs, &highlights, &palette, &noise, &style);
        let mut first = RecordingSurface::new();
        let mut second = RecordingSurface::new();
        r.draw(&mut StdRng::seed_from_u64(11), &mut first);
        r.draw(&mut StdRng::seed_from_u64(11), &mut second);
        assert_eq!(first.commands, second.commands);
    }
}
