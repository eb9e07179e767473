// Bottom status bar: playback slot state, segment position and key hints.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::action::Action;
use crate::components::{Component, BRAILLE_SPINNER};
use crate::player::slot::SlotState;
use crate::theme::Theme;

const HINTS_TOP: &[(&str, &str)] = &[
    ("Space", "Pause"),
    ("n/p", "Segment"),
    ("c", "Connect"),
    ("v", "Volume fx"),
];
const HINTS_BOTTOM: &[(&str, &str)] = &[
    ("+/-", "Glyphs"),
    ("g", "Grid"),
    ("r", "Reload"),
    ("?", "Help"),
    ("q", "Quit"),
];

#[derive(Default)]
pub struct PlayControls {
    slot: SlotState,
    paused: bool,
    position: Option<usize>,
    total: usize,
    file: Option<String>,
    frame_count: u64,
}

impl PlayControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_queue_info(&mut self, pos: Option<usize>, len: usize) {
        self.position = pos;
        self.total = len;
    }

    /// A new segment is loading.
    pub fn set_loading(&mut self, file: Option<String>) {
        self.slot = SlotState::Loading;
        self.file = file;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn slot(&self) -> SlotState {
        self.slot
    }

    fn status_glyph(&self) -> &'static str {
        if self.paused {
            return "⏸";
        }
        match self.slot {
            SlotState::Loading | SlotState::Ready => {
                BRAILLE_SPINNER[(self.frame_count / 3) as usize % BRAILLE_SPINNER.len()]
            }
            SlotState::Playing if self.frame_count % 30 < 15 => "♪ ▶",
            SlotState::Playing => "♫ ▶",
            SlotState::Failed => "✗",
            SlotState::Idle | SlotState::Ended => "■",
        }
    }

    fn position_label(&self) -> String {
        match (self.position, self.total) {
            (_, 0) => String::new(),
            (Some(i), n) => format!("Segment {}/{}", i + 1, n),
            (None, n) => format!("{} segments", n),
        }
    }
}

fn hint_spans<'a>(hints: &[(&'a str, &'a str)], theme: &Theme) -> Vec<Span<'a>> {
    let mut spans = Vec::with_capacity(hints.len() * 3);
    for (i, (key, desc)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", Style::default().fg(theme.border)));
        }
        spans.push(Span::styled(*key, Style::default().fg(theme.text)));
        spans.push(Span::styled(format!(" {}", desc), Style::default().fg(theme.text_dim)));
    }
    spans
}

impl Component for PlayControls {
    fn update(&mut self, action: &Action) -> anyhow::Result<Vec<Action>> {
        match action {
            Action::Tick => self.frame_count = self.frame_count.wrapping_add(1),
            Action::PlaybackStarted { .. } => self.slot = SlotState::Playing,
            Action::PlaybackFinished { .. } => self.slot = SlotState::Ended,
            Action::PlaybackFailed { .. } => self.slot = SlotState::Failed,
            _ => {}
        }
        Ok(vec![])
    }

    fn draw(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let active = self.slot == SlotState::Playing && !self.paused;
        let status_color = match self.slot {
            _ if self.paused => theme.text_dim,
            SlotState::Loading | SlotState::Ready => theme.warning,
            SlotState::Playing => theme.success,
            SlotState::Failed => theme.error,
            SlotState::Idle | SlotState::Ended => theme.text_dim,
        };

        let mut top = vec![
            Span::styled(
                format!(" {} ", self.status_glyph()),
                Style::default().fg(status_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" │ ", Style::default().fg(theme.border)),
        ];
        top.extend(hint_spans(HINTS_TOP, theme));

        if let Some(file) = self.file.as_deref() {
            let used: usize = top.iter().map(|s| s.content.chars().count()).sum();
            let available = (area.width as usize).saturating_sub(used + 4);
            if available > 5 {
                top.push(Span::raw("  "));
                top.push(Span::styled(
                    file.chars().take(available).collect::<String>(),
                    Style::default().fg(theme.primary),
                ));
            }
        }

        let mut bottom = vec![Span::raw("   ")];
        bottom.extend(hint_spans(HINTS_BOTTOM, theme));
        bottom.push(Span::raw("   "));
        bottom.push(Span::styled(self.position_label(), Style::default().fg(theme.primary)));

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if active { theme.primary } else { theme.border }));
        frame.render_widget(
            Paragraph::new(vec![Line::from(top), Line::from(bottom)]).block(block),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_follows_playback_actions() {
        let mut controls = PlayControls::new();
        controls.set_loading(Some("1.mp3".into()));
        assert_eq!(controls.slot(), SlotState::Loading);
        controls.update(&Action::PlaybackStarted { segment_id: 1 }).unwrap();
        assert_eq!(controls.status_glyph(), "♪ ▶");
        controls
            .update(&Action::PlaybackFailed {
                segment_id: 1,
                error: "gone".into(),
            })
            .unwrap();
        assert_eq!(controls.status_glyph(), "✗");
        controls.set_paused(true);
        assert_eq!(controls.status_glyph(), "⏸");
    }

    #[test]
    fn position_label_counts_from_one() {
        let mut controls = PlayControls::new();
        assert_eq!(controls.position_label(), "");
        controls.set_queue_info(Some(2), 5);
        assert_eq!(controls.position_label(), "Segment 3/5");
        controls.set_queue_info(None, 5);
        assert_eq!(controls.position_label(), "5 segments");
    }
}
