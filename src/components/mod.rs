// UI components: the metaball stage, the segment side panel, the transcript
// list and the bottom status bar.

pub mod play_controls;
pub mod side_panel;
pub mod stage;
pub mod transcript;

use ratatui::layout::Rect;
use ratatui::Frame;

use crate::action::Action;
use crate::theme::Theme;

pub const BRAILLE_SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// A panel that renders from its own state. Components never touch the
/// visualization session directly; the app syncs them before each draw.
pub trait Component {
    /// React to an action dispatched by App. Return optional follow-up actions.
    fn update(&mut self, action: &Action) -> anyhow::Result<Vec<Action>> {
        let _ = action;
        Ok(vec![])
    }

    fn draw(&self, frame: &mut Frame, area: Rect, theme: &Theme);
}
