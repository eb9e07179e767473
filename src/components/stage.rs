// The metaball stage: a terminal-cell canvas that implements `RenderSurface`,
// and the component that blits it into the frame.
//
// The session works in canvas pixels. One terminal cell covers
// CELL_WIDTH_PX × CELL_HEIGHT_PX of canvas, so a cell's aspect matches a
// typical monospace glyph.

use ratatui::{layout::Rect, style::Color, Frame};

use crate::components::Component;
use crate::theme::Theme;
use crate::viz::emotion::Rgb;
use crate::viz::render::{DrawCommand, RenderSurface, Rgba};
use crate::viz::VisualizationSession;

pub const CELL_WIDTH_PX: f64 = 6.0;
pub const CELL_HEIGHT_PX: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Rgb,
    /// Connection strokes yield to any glyph drawn later.
    pub stroke: bool,
}

/// Terminal-resolution raster of one frame.
#[derive(Debug, Clone, Default)]
pub struct CellCanvas {
    width: u16,
    height: u16,
    cells: Vec<Option<Cell>>,
}

impl CellCanvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    /// Canvas size in session pixels.
    pub fn canvas_size(&self) -> (f64, f64) {
        (
            self.width as f64 * CELL_WIDTH_PX,
            self.height as f64 * CELL_HEIGHT_PX,
        )
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
    }

    pub fn get(&self, col: u16, row: u16) -> Option<&Cell> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.cells[row as usize * self.width as usize + col as usize].as_ref()
    }

    /// Cell under canvas point (x, y), if on screen.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(u16, u16)> {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        let col = (x / CELL_WIDTH_PX).floor();
        let row = (y / CELL_HEIGHT_PX).floor();
        if col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((col as u16, row as u16))
    }

    fn put(&mut self, col: i64, row: i64, cell: Cell) {
        if col < 0 || row < 0 || col >= self.width as i64 || row >= self.height as i64 {
            return;
        }
        let slot = &mut self.cells[row as usize * self.width as usize + col as usize];
        if cell.stroke && matches!(slot, Some(existing) if !existing.stroke) {
            return;
        }
        *slot = Some(cell);
    }

    fn glyph(&mut self, ch: char, x: f64, y: f64, size: f64, color: Rgba) {
        let Some((col, row)) = self.cell_at(x, y) else { return };
        let fg = premultiply(color);
        // Shade blocks tile across the glyph's footprint; symbols sit once.
        let span = if is_shade(ch) {
            (size / CELL_WIDTH_PX).round().max(1.0) as i64
        } else {
            1
        };
        let start = col as i64 - span / 2;
        for c in start..start + span {
            self.put(c, row as i64, Cell { ch, fg, stroke: false });
        }
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, weight: f64, color: Rgba) {
        let ch = if weight >= 3.0 {
            '•'
        } else if weight >= 1.5 {
            '∙'
        } else {
            '·'
        };
        let fg = premultiply(color);
        let (mut c0, mut r0) = ((x1 / CELL_WIDTH_PX) as i64, (y1 / CELL_HEIGHT_PX) as i64);
        let (c1, r1) = ((x2 / CELL_WIDTH_PX) as i64, (y2 / CELL_HEIGHT_PX) as i64);
        let dc = (c1 - c0).abs();
        let dr = -(r1 - r0).abs();
        let sc = if c0 < c1 { 1 } else { -1 };
        let sr = if r0 < r1 { 1 } else { -1 };
        let mut err = dc + dr;
        loop {
            self.put(c0, r0, Cell { ch, fg, stroke: true });
            if c0 == c1 && r0 == r1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dr {
                err += dr;
                c0 += sc;
            }
            if e2 <= dc {
                err += dc;
                r0 += sr;
            }
        }
    }
}

impl RenderSurface for CellCanvas {
    fn draw(&mut self, command: DrawCommand) {
        match command {
            DrawCommand::Glyph { ch, x, y, size, color } => self.glyph(ch, x, y, size, color),
            DrawCommand::Line { x1, y1, x2, y2, weight, color } => {
                self.line(x1, y1, x2, y2, weight, color)
            }
            DrawCommand::Circle { x, y, color, .. } => {
                if let Some((col, row)) = self.cell_at(x, y) {
                    let fg = premultiply(color);
                    self.put(col as i64, row as i64, Cell { ch: '○', fg, stroke: true });
                }
            }
        }
    }
}

fn is_shade(ch: char) -> bool {
    ('\u{2580}'..='\u{259f}').contains(&ch)
}

/// Blend onto a black background.
fn premultiply(color: Rgba) -> Rgb {
    let scale = |v: u8| (v as f64 * color.a).round().clamp(0.0, 255.0) as u8;
    [scale(color.r), scale(color.g), scale(color.b)]
}

/// Holds the most recent frame of the session for drawing.
#[derive(Default)]
pub struct Stage {
    canvas: CellCanvas,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the session to `area` and rasterize its current state.
    pub fn capture(&mut self, session: &mut VisualizationSession, area: Rect) {
        if self.canvas.dimensions() != (area.width, area.height) {
            self.canvas = CellCanvas::new(area.width, area.height);
        }
        let (w, h) = self.canvas.canvas_size();
        if w > 0.0 && h > 0.0 {
            session.resize(w, h);
        }
        self.canvas.clear();
        session.render(&mut self.canvas);
    }

    pub fn canvas(&self) -> &CellCanvas {
        &self.canvas
    }
}

impl Component for Stage {
    fn draw(&self, frame: &mut Frame, area: Rect, _theme: &Theme) {
        let buf = frame.buffer_mut();
        let (w, h) = self.canvas.dimensions();
        for row in 0..h.min(area.height) {
            for col in 0..w.min(area.width) {
                let Some(cell) = self.canvas.get(col, row) else { continue };
                if let Some(target) = buf.cell_mut((area.x + col, area.y + row)) {
                    target.set_char(cell.ch);
                    target.set_fg(Color::Rgb(cell.fg[0], cell.fg[1], cell.fg[2]));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> Rgba {
        Rgba::new([255, 255, 255], 1.0)
    }

    #[test]
    fn glyph_lands_in_covering_cell() {
        let mut canvas = CellCanvas::new(10, 5);
        canvas.draw(DrawCommand::Glyph {
            ch: '♥',
            x: 13.0,
            y: 30.0,
            size: 12.0,
            color: white(),
        });
        assert_eq!(canvas.get(2, 2).map(|c| c.ch), Some('♥'));
        assert!(canvas.get(3, 2).is_none());
    }

    #[test]
    fn shade_glyph_spans_footprint() {
        let mut canvas = CellCanvas::new(10, 5);
        canvas.draw(DrawCommand::Glyph {
            ch: '▒',
            x: 30.0,
            y: 6.0,
            size: 12.0,
            color: white(),
        });
        assert_eq!(canvas.get(4, 0).map(|c| c.ch), Some('▒'));
        assert_eq!(canvas.get(5, 0).map(|c| c.ch), Some('▒'));
    }

    #[test]
    fn strokes_do_not_cover_glyphs() {
        let mut canvas = CellCanvas::new(10, 1);
        canvas.draw(DrawCommand::Glyph {
            ch: '●',
            x: 15.0,
            y: 6.0,
            size: 6.0,
            color: white(),
        });
        canvas.draw(DrawCommand::Line {
            x1: 0.0,
            y1: 6.0,
            x2: 59.0,
            y2: 6.0,
            weight: 4.0,
            color: white(),
        });
        assert_eq!(canvas.get(2, 0).map(|c| c.ch), Some('●'));
        assert_eq!(canvas.get(5, 0).map(|c| c.ch), Some('•'));
    }

    #[test]
    fn alpha_darkens_color() {
        let mut canvas = CellCanvas::new(2, 1);
        canvas.draw(DrawCommand::Glyph {
            ch: 'x',
            x: 1.0,
            y: 1.0,
            size: 6.0,
            color: Rgba::new([200, 100, 0], 0.5),
        });
        assert_eq!(canvas.get(0, 0).map(|c| c.fg), Some([100, 50, 0]));
    }
}
