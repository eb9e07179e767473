// Data fetching: loads the segments file (local path or http(s) URL) on a
// background task and sends the result back as an action.

use crate::action::Action;
use crate::app::playback::is_remote;
use crate::app::App;
use crate::data::SegmentSet;

impl App {
    /// Start a segment load. Only the newest load's result is applied.
    pub(super) fn spawn_load_segments(&mut self) {
        self.load_id += 1;
        let load_id = self.load_id;
        let Some(source) = self.options.source.clone() else {
            self.action_tx
                .send(Action::ShowError("no segments file given".to_string()))
                .ok();
            return;
        };

        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            match load_segments(&source).await {
                Ok(set) => tx.send(Action::SegmentsLoaded { load_id, set }).ok(),
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "failed to load segments");
                    tx.send(Action::ShowError(format!("Failed to load segments: {}", e)))
                        .ok()
                }
            };
        });
    }
}

/// Read and parse a segments file from disk or over HTTP.
pub async fn load_segments(source: &str) -> anyhow::Result<SegmentSet> {
    let text = if is_remote(source) {
        reqwest::get(source)
            .await?
            .error_for_status()?
            .text()
            .await?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", source, e))?
    };
    Ok(SegmentSet::parse(&text)?)
}
