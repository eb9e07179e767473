// Config file watching: polls the emotions config and the visualization
// parameters file for modification-time changes and pushes their contents
// into the app as actions.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;

use crate::action::Action;
use crate::app::App;
use crate::viz::emotion::EmotionConfigUpdate;
use crate::viz::params::VisualParameterSet;

type Parser = fn(&str) -> anyhow::Result<Action>;

impl App {
    pub(super) fn start_watchers(&self) {
        let interval = self.watch_interval();
        if let Some(path) = self.emotions_config_path() {
            spawn_file_watch(path, interval, self.action_tx.clone(), parse_emotions_file);
        }
        if let Some(path) = self.config.emotions.parameters_file.clone() {
            spawn_file_watch(path, interval, self.action_tx.clone(), parse_parameters_file);
        }
    }

    /// Read the emotions config once, outside the polling schedule.
    pub(super) fn reload_emotions(&mut self) -> anyhow::Result<()> {
        let Some(path) = self.emotions_config_path() else {
            self.action_tx.send(Action::ShowError(
                "no emotions config file configured".to_string(),
            ))?;
            return Ok(());
        };
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let action = match read_and_parse(&path, parse_emotions_file).await {
                Ok(action) => action,
                Err(e) => Action::ShowError(format!("Failed to reload emotions: {}", e)),
            };
            tx.send(action).ok();
        });
        Ok(())
    }

    fn emotions_config_path(&self) -> Option<PathBuf> {
        self.options
            .emotions_config
            .clone()
            .or_else(|| self.config.emotions.config_file.clone())
    }
}

pub fn parse_emotions_file(text: &str) -> anyhow::Result<Action> {
    Ok(Action::EmotionConfigChanged(EmotionConfigUpdate::from_json(text)?))
}

/// Parameters files hold one flat override object, optionally wrapped in
/// `{"parameters": {...}}`.
pub fn parse_parameters_file(text: &str) -> anyhow::Result<Action> {
    let mut value: serde_json::Value = serde_json::from_str(text)?;
    let inner = value
        .get_mut("parameters")
        .map(serde_json::Value::take)
        .unwrap_or(value);
    let set: VisualParameterSet = serde_json::from_value(inner)?;
    Ok(Action::ParametersChanged(set))
}

async fn read_and_parse(path: &Path, parse: Parser) -> anyhow::Result<Action> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
    parse(&text)
}

/// Poll `path`'s modification time; send the parsed contents on the first
/// poll and after every change. Parse failures are logged and retried on the
/// next change.
fn spawn_file_watch(path: PathBuf, interval: Duration, tx: mpsc::UnboundedSender<Action>, parse: Parser) {
    tokio::spawn(async move {
        let mut last_seen: Option<SystemTime> = None;
        loop {
            if tx.is_closed() {
                break;
            }
            let modified = tokio::fs::metadata(&path)
                .await
                .and_then(|m| m.modified())
                .ok();
            if modified.is_some() && modified != last_seen {
                last_seen = modified;
                match read_and_parse(&path, parse).await {
                    Ok(action) => {
                        tracing::debug!(path = %path.display(), "config file changed");
                        if tx.send(action).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                    }
                }
            }
            tokio::time::sleep(interval).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_file_accepts_wrapped_object() {
        let action = parse_parameters_file(r#"{"parameters": {"blobStrength": 300}}"#).unwrap();
        match action {
            Action::ParametersChanged(set) => assert_eq!(set.strength, Some(300.0)),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn emotions_file_becomes_update() {
        let action = parse_emotions_file(r##"{"joy": {"active": true, "color": "#ff0000"}}"##).unwrap();
        assert!(matches!(action, Action::EmotionConfigChanged(_)));
    }
}
