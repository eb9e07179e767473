// Terminal backend. Owns raw mode and the alternate screen, turns crossterm
// input into `TuiEvent`s and paces animation frames at the configured rate.
// The terminal is restored on exit, on drop and from the panic hook, so a
// panic inside the render path never leaves the shell in raw mode.

use std::io::Stderr;
use std::time::Duration;

use crossterm::{
    event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum TuiEvent {
    Key(KeyEvent),
    Resize,
    /// Time to advance the animation by one frame.
    Tick,
}

pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stderr>>,
    pub event_rx: mpsc::UnboundedReceiver<TuiEvent>,
    event_tx: mpsc::UnboundedSender<TuiEvent>,
    frame_interval: Duration,
    poller: Option<JoinHandle<()>>,
    active: bool,
}

impl Tui {
    pub fn new(frame_rate: f64) -> anyhow::Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(std::io::stderr()))?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Self {
            terminal,
            event_rx,
            event_tx,
            frame_interval: frame_interval(frame_rate),
            poller: None,
            active: false,
        })
    }

    pub fn enter(&mut self) -> anyhow::Result<()> {
        install_panic_hook();
        terminal::enable_raw_mode()?;
        execute!(std::io::stderr(), EnterAlternateScreen)?;
        self.active = true;
        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        self.poller = Some(spawn_event_poller(self.event_tx.clone(), self.frame_interval));
        Ok(())
    }

    pub fn exit(&mut self) -> anyhow::Result<()> {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if self.active {
            self.active = false;
            restore_terminal()?;
            self.terminal.show_cursor()?;
        }
        Ok(())
    }

    /// Current terminal size in cells.
    pub fn size(&self) -> anyhow::Result<(u16, u16)> {
        let size = self.terminal.size()?;
        Ok((size.width, size.height))
    }

    pub fn draw<F>(&mut self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Frame),
    {
        self.terminal.draw(f)?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            tracing::warn!(error = %e, "failed to restore terminal");
        }
    }
}

/// Tick period for `frame_rate` frames per second, at least one per second.
pub fn frame_interval(frame_rate: f64) -> Duration {
    let fps = if frame_rate.is_finite() { frame_rate.max(1.0) } else { 30.0 };
    Duration::from_secs_f64(1.0 / fps)
}

fn restore_terminal() -> anyhow::Result<()> {
    terminal::disable_raw_mode()?;
    execute!(std::io::stderr(), LeaveAlternateScreen)?;
    Ok(())
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        previous(info);
    }));
}

fn spawn_event_poller(tx: mpsc::UnboundedSender<TuiEvent>, frame: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = EventStream::new();
        let mut ticks = tokio::time::interval(frame);
        // A slow frame drops ticks instead of bursting to catch up
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                input = reader.next() => match input {
                    Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                        TuiEvent::Key(key)
                    }
                    Some(Ok(CrosstermEvent::Resize(..))) => TuiEvent::Resize,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "terminal input stream failed");
                        break;
                    }
                    None => break,
                },
                _ = ticks.tick() => TuiEvent::Tick,
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_interval_is_floored_at_one_fps() {
        assert_eq!(frame_interval(0.0), Duration::from_secs(1));
        assert_eq!(frame_interval(f64::NAN), Duration::from_secs_f64(1.0 / 30.0));
        assert_eq!(frame_interval(4.0), Duration::from_millis(250));
    }
}
