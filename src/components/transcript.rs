// Transcript list: one line per segment, the current one marked, scrolled so
// the current segment stays in view.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::components::Component;
use crate::data::SegmentSet;
use crate::theme::Theme;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    speaker: Option<usize>,
    text: String,
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    current: Option<usize>,
    failed: Vec<bool>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_segments(&mut self, set: &SegmentSet) {
        self.entries = set
            .iter()
            .map(|r| Entry {
                speaker: if r.is_silent { None } else { r.speaker },
                text: r
                    .transcript
                    .as_deref()
                    .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_else(|| format!("[{}]", r.file)),
            })
            .collect();
        self.failed = vec![false; self.entries.len()];
        self.current = None;
    }

    pub fn set_current(&mut self, index: Option<usize>) {
        self.current = index.filter(|i| *i < self.entries.len());
    }

    pub fn mark_failed(&mut self, index: usize) {
        if let Some(f) = self.failed.get_mut(index) {
            *f = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First visible line so that `current` sits roughly a third of the way down.
    pub fn scroll_offset(&self, height: usize) -> usize {
        let Some(current) = self.current else { return 0 };
        let max = self.entries.len().saturating_sub(height);
        current.saturating_sub(height / 3).min(max)
    }
}

impl Component for Transcript {
    fn draw(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(theme.border))
            .title(Span::styled(
                format!(" Transcript ({}) ", self.entries.len()),
                Style::default().fg(theme.text_dim),
            ));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let height = inner.height as usize;
        let offset = self.scroll_offset(height);
        let lines: Vec<Line> = self
            .entries
            .iter()
            .enumerate()
            .skip(offset)
            .take(height)
            .map(|(i, entry)| {
                let is_current = self.current == Some(i);
                let marker = if is_current { "▶ " } else { "  " };
                let who = match entry.speaker {
                    Some(s) => format!("{} ", s + 1),
                    None => "· ".to_string(),
                };
                let style = if self.failed.get(i).copied().unwrap_or(false) {
                    Style::default().fg(theme.error)
                } else if is_current {
                    Style::default()
                        .fg(theme.primary)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.text_dim)
                };
                let width = (inner.width as usize).saturating_sub(marker.len() + who.len());
                let text: String = entry.text.chars().take(width).collect();
                Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(who, Style::default().fg(theme.secondary)),
                    Span::styled(text, style),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SegmentRecord;

    fn transcript(n: usize) -> Transcript {
        let mut t = Transcript::new();
        t.set_segments(&SegmentSet::new(
            (0..n).map(|i| SegmentRecord::fallback(&format!("{}.mp3", i + 1))).collect(),
        ));
        t
    }

    #[test]
    fn scroll_keeps_current_visible() {
        let mut t = transcript(30);
        t.set_current(Some(20));
        let offset = t.scroll_offset(9);
        assert!(offset <= 20 && 20 < offset + 9);
        t.set_current(Some(29));
        assert_eq!(t.scroll_offset(9), 21);
    }

    #[test]
    fn missing_transcript_shows_file() {
        let t = transcript(1);
        assert_eq!(t.entries[0].text, "[1.mp3]");
    }
}
