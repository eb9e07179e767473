// Layout and rendering: splits the terminal into the stage, the side column
// and the status bar, and composites overlays (help, error bar).

use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::components::play_controls::PlayControls;
use crate::components::side_panel::SidePanel;
use crate::components::stage::Stage;
use crate::components::transcript::Transcript;
use crate::components::Component;
use crate::theme::Theme;

const SIDE_WIDTH: u16 = 34;
const PANEL_HEIGHT: u16 = 22;
const STATUS_HEIGHT: u16 = 4;

pub struct DrawState<'a> {
    pub stage: &'a Stage,
    pub side_panel: &'a SidePanel,
    pub transcript: &'a Transcript,
    pub play_controls: &'a PlayControls,
    pub error_message: &'a Option<String>,
    pub show_help: bool,
    pub theme: &'a Theme,
}

/// Screen regions for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regions {
    pub stage: Rect,
    pub side_panel: Rect,
    pub transcript: Rect,
    pub error: Rect,
    pub status: Rect,
    pub outer: Rect,
}

pub fn regions(area: Rect, has_error: bool) -> Regions {
    let error_height = if has_error { 1 } else { 0 };
    let outer = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(error_height),
        Constraint::Length(STATUS_HEIGHT),
    ])
    .split(area);

    let content = Block::default().borders(Borders::ALL).inner(outer[0]);
    let side_width = if content.width > SIDE_WIDTH * 2 { SIDE_WIDTH } else { 0 };
    let main = Layout::horizontal([Constraint::Min(0), Constraint::Length(side_width)]).split(content);
    let side = Layout::vertical([Constraint::Length(PANEL_HEIGHT), Constraint::Min(0)]).split(main[1]);

    Regions {
        stage: main[0],
        side_panel: side[0],
        transcript: side[1],
        error: outer[1],
        status: outer[2],
        outer: outer[0],
    }
}

pub fn draw(frame: &mut Frame, state: &DrawState) {
    let theme = state.theme;
    let r = regions(frame.area(), state.error_message.is_some());

    let outer_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .title(Span::styled(
            " emoviz ",
            Style::default().fg(theme.primary).add_modifier(Modifier::BOLD),
        ));
    frame.render_widget(outer_block, r.outer);

    state.stage.draw(frame, r.stage, theme);
    if r.side_panel.width > 0 {
        state.side_panel.draw(frame, r.side_panel, theme);
        state.transcript.draw(frame, r.transcript, theme);
    }

    if let Some(ref msg) = state.error_message {
        let error_line = Line::from(vec![
            Span::styled(" ⚠ ", Style::default().fg(theme.error)),
            Span::styled(msg.as_str(), Style::default().fg(theme.warning)),
        ]);
        frame.render_widget(Paragraph::new(error_line), r.error);
    }

    state.play_controls.draw(frame, r.status, theme);

    if state.show_help {
        draw_help_overlay(frame, theme);
    }
}

fn draw_help_overlay(frame: &mut Frame, theme: &Theme) {
    let area = frame.area();
    let overlay_width = 52u16;
    let overlay_height = 17u16;
    let x = area.width.saturating_sub(overlay_width) / 2;
    let y = area.height.saturating_sub(overlay_height) / 2;
    let overlay_area = Rect::new(
        x,
        y,
        overlay_width.min(area.width),
        overlay_height.min(area.height),
    );

    frame.render_widget(Clear, overlay_area);

    let keybindings = [
        ("q", "Quit"),
        ("Space", "Pause / resume"),
        ("n", "Next segment"),
        ("p", "Previous segment"),
        ("c", "Toggle blob connections"),
        ("v", "Toggle volume effects"),
        ("+ / -", "More / fewer emotion glyphs"),
        ("g", "Toggle audio-driven grid"),
        ("r", "Reload emotions config"),
        ("?", "Toggle this help overlay"),
    ];

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            " Keybindings ",
            Style::default()
                .fg(theme.primary)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for (key, desc) in &keybindings {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:10}", key), Style::default().fg(theme.accent)),
            Span::raw(*desc),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  Press any key to close",
        Style::default().fg(theme.text_dim),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .title_alignment(Alignment::Center);
    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, overlay_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_terminal_drops_side_column() {
        let r = regions(Rect::new(0, 0, 50, 30), false);
        assert_eq!(r.side_panel.width, 0);
        assert_eq!(r.stage.width, 48);
    }

    #[test]
    fn error_bar_takes_one_row() {
        let with = regions(Rect::new(0, 0, 120, 40), true);
        let without = regions(Rect::new(0, 0, 120, 40), false);
        assert_eq!(with.error.height, 1);
        assert_eq!(without.stage.height, with.stage.height + 1);
    }
}
