// Key event handling: maps key presses to actions.

use crate::action::Action;
use crate::app::App;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

impl App {
    pub fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        use KeyCode::{Char, Esc};

        // The help overlay consumes any key
        if self.show_help {
            self.action_tx.send(Action::HideHelp)?;
            return Ok(());
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == Char('c') {
            self.action_tx.send(Action::Quit)?;
            return Ok(());
        }

        match key.code {
            Char('q') => self.action_tx.send(Action::Quit)?,
            Char('?') => self.action_tx.send(Action::ShowHelp)?,
            Char(' ') => self.action_tx.send(Action::TogglePause)?,
            Char('n') => self.action_tx.send(Action::NextSegment)?,
            Char('p') => self.action_tx.send(Action::PrevSegment)?,
            Char('c') => self.action_tx.send(Action::ToggleConnections)?,
            Char('v') => self.action_tx.send(Action::ToggleVolumeEffects)?,
            Char('g') => self.action_tx.send(Action::ToggleAudioGrid)?,
            Char('+') | Char('=') => self.action_tx.send(Action::EmotionAmountUp)?,
            Char('-') | Char('_') => self.action_tx.send(Action::EmotionAmountDown)?,
            Char('r') => {
                self.action_tx.send(Action::ReloadEmotions)?;
                self.error_message = None;
            }
            Esc => self.action_tx.send(Action::ClearError)?,
            _ => {}
        }
        Ok(())
    }
}
