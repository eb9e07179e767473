// Side panel: the current segment's speaker, emotions with their live
// display colors, playback slot state and the session toggles.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::components::Component;
use crate::player::slot::SlotState;
use crate::theme::Theme;
use crate::viz::emotion::Rgb;
use crate::viz::VisualizationSession;

const METER_WIDTH: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerLevel {
    pub slot: usize,
    pub level: f64,
    pub color: Rgb,
}

#[derive(Debug, Default)]
pub struct SidePanel {
    file: Option<String>,
    position: Option<(usize, usize)>,
    speaker: Option<usize>,
    silent: bool,
    emotions: Vec<(String, Rgb)>,
    levels: Vec<SpeakerLevel>,
    slot: Option<SlotState>,
    paused: bool,
    connect_blobs: bool,
    volume_effects: bool,
    audio_grid: bool,
    char_amount: f64,
    visual_only: bool,
}

impl SidePanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy what the panel shows out of the session.
    pub fn sync(&mut self, session: &VisualizationSession, slot: SlotState, position: Option<(usize, usize)>) {
        self.slot = Some(slot);
        self.position = position;
        self.paused = session.is_paused();
        self.connect_blobs = session.connect_blobs();
        self.volume_effects = session.volume_effects();
        self.audio_grid = session.audio_driven_grid();
        self.char_amount = session.emotion_char_amount();
        self.levels = session
            .blobs()
            .iter()
            .map(|b| SpeakerLevel {
                slot: b.id,
                level: b.audio_level(),
                color: b.primary_color(),
            })
            .collect();

        let Some(active) = session.segment() else {
            self.file = None;
            self.speaker = None;
            self.emotions.clear();
            return;
        };
        let record = &active.record;
        self.file = Some(record.file.clone());
        self.silent = record.is_silent || record.speaker.is_none();
        self.speaker = record.speaker;
        self.emotions = match record.speaker.and_then(|s| session.blobs().get(s)) {
            Some(blob) => blob
                .emotions
                .iter()
                .cloned()
                .zip(blob.display_colors.iter().copied())
                .collect(),
            None => Vec::new(),
        };
    }

    pub fn set_visual_only(&mut self, visual_only: bool) {
        self.visual_only = visual_only;
    }

    pub fn emotions(&self) -> &[(String, Rgb)] {
        &self.emotions
    }
}

fn rgb(c: Rgb) -> Color {
    Color::Rgb(c[0], c[1], c[2])
}

fn meter(level: f64) -> String {
    let filled = (level.clamp(0.0, 1.0) * METER_WIDTH as f64).round() as usize;
    format!("{}{}", "▮".repeat(filled), "▯".repeat(METER_WIDTH - filled))
}

fn toggle(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

impl Component for SidePanel {
    fn draw(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let label = Style::default().fg(theme.text_dim);
        let value = Style::default().fg(theme.text);
        let heading = Style::default()
            .fg(theme.primary)
            .add_modifier(Modifier::BOLD);

        let mut lines = Vec::new();

        let title = match (&self.file, self.position) {
            (Some(file), Some((i, n))) => format!("{} ({}/{})", file, i + 1, n),
            (Some(file), None) => file.clone(),
            (None, _) => "no segment".to_string(),
        };
        lines.push(Line::from(Span::styled(title, heading)));

        let state = match self.slot {
            Some(state) if self.paused => format!("{} (paused)", state),
            Some(state) => state.to_string(),
            None => "-".to_string(),
        };
        let mode = if self.visual_only { " · visual only" } else { "" };
        lines.push(Line::from(vec![
            Span::styled("state   ", label),
            Span::styled(state, value),
            Span::styled(mode, label),
        ]));

        let speaker = if self.silent {
            "silence".to_string()
        } else {
            self.speaker
                .map(|s| format!("speaker {}", s + 1))
                .unwrap_or_else(|| "-".to_string())
        };
        lines.push(Line::from(vec![
            Span::styled("speaker ", label),
            Span::styled(speaker, value),
        ]));
        lines.push(Line::from(""));

        lines.push(Line::from(Span::styled("Emotions", heading)));
        if self.emotions.is_empty() {
            lines.push(Line::from(Span::styled("  none", label)));
        }
        for (emotion, color) in &self.emotions {
            lines.push(Line::from(vec![
                Span::styled("  ██ ", Style::default().fg(rgb(*color))),
                Span::styled(emotion.as_str(), value),
            ]));
        }
        lines.push(Line::from(""));

        lines.push(Line::from(Span::styled("Levels", heading)));
        for level in &self.levels {
            let style = if Some(level.slot) == self.speaker {
                Style::default().fg(rgb(level.color))
            } else {
                Style::default().fg(theme.meter_idle)
            };
            lines.push(Line::from(vec![
                Span::styled(format!("  {} ", level.slot + 1), label),
                Span::styled(meter(level.level), style),
            ]));
        }
        lines.push(Line::from(""));

        lines.push(Line::from(Span::styled("Display", heading)));
        for (name, setting) in [
            ("connections", toggle(self.connect_blobs).to_string()),
            ("volume fx  ", toggle(self.volume_effects).to_string()),
            ("audio grid ", toggle(self.audio_grid).to_string()),
            ("glyphs     ", format!("{:.0}%", self.char_amount)),
        ] {
            lines.push(Line::from(vec![
                Span::styled(format!("  {} ", name), label),
                Span::styled(setting, value),
            ]));
        }

        let block = Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(theme.border));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_fills_proportionally() {
        assert_eq!(meter(0.0), "▯".repeat(METER_WIDTH));
        assert_eq!(meter(1.0), "▮".repeat(METER_WIDTH));
        assert_eq!(meter(0.5).chars().filter(|c| *c == '▮').count(), 6);
    }
}
