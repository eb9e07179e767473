// Segment playback: mpv subprocess control over its JSON IPC socket, a timer
// fallback for visual-only runs, the slot state machine and the playlist.

pub mod ipc;
pub mod queue;
pub mod slot;
pub mod timer;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};

use crate::action::Action;
use ipc::MpvProcess;

// astats publishes per-frame metadata that the level poller reads back.
const LEVEL_FILTER: &str = "--af=lavfi=[astats=metadata=1:reset=1]";

pub struct MpvPlayer {
    pub socket_path: PathBuf,
    binary: String,
    action_tx: Option<mpsc::UnboundedSender<Action>>,
    child: MpvProcess,
    paused: bool,
}

impl MpvPlayer {
    pub fn new(binary: &str) -> Self {
        let pid = std::process::id();
        Self {
            socket_path: std::env::temp_dir().join(format!("emoviz-mpv-{}.sock", pid)),
            binary: binary.to_string(),
            action_tx: None,
            child: Arc::new(Mutex::new(None)),
            paused: false,
        }
    }

    pub fn set_action_tx(&mut self, tx: mpsc::UnboundedSender<Action>) {
        self.action_tx = Some(tx);
    }

    /// Spawn mpv for one segment's audio file. Start, exit and level events
    /// come back through the action channel tagged with `segment_id`.
    pub async fn play(&mut self, segment_id: u64, path: &Path) -> anyhow::Result<()> {
        self.stop().await?;
        if !path.exists() {
            anyhow::bail!("audio file not found: {}", path.display());
        }
        let _ = std::fs::remove_file(&self.socket_path);

        let child = Command::new(&self.binary)
            .arg("--no-video")
            .arg("--no-terminal")
            .arg(LEVEL_FILTER)
            .arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to start {}: {}", self.binary, e))?;

        // Each segment gets its own handle. Monitors from earlier segments
        // keep the old, emptied one and can never reap this child.
        self.child = Arc::new(Mutex::new(Some(child)));
        self.paused = false;

        if let Some(tx) = &self.action_tx {
            ipc::spawn_exit_monitor(self.child.clone(), segment_id, tx.clone());
            ipc::spawn_audio_level_poller(self.socket_path.clone(), segment_id, tx.clone());
        }
        tracing::debug!(segment_id, path = %path.display(), "spawned mpv");
        Ok(())
    }

    /// Pause or resume via IPC. Does nothing when no segment is playing.
    pub async fn set_paused(&mut self, paused: bool) -> anyhow::Result<()> {
        if self.paused == paused || self.child.lock().await.is_none() {
            self.paused = paused;
            return Ok(());
        }
        ipc::send_command(
            &self.socket_path,
            &format!(r#"{{"command":["set_property","pause",{}]}}"#, paused),
        )
        .await?;
        self.paused = paused;
        Ok(())
    }

    /// Stop playback by quitting mpv.
    pub async fn stop(&self) -> anyhow::Result<()> {
        let mut guard = self.child.lock().await;
        if let Some(ref mut child) = *guard {
            let _ = ipc::send_command(&self.socket_path, r#"{"command":["quit"]}"#).await;
            let _ = child.kill().await;
        }
        *guard = None;
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        // Kill the mpv process if still running
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(ref mut child) = *guard {
                let _ = child.start_kill();
            }
            *guard = None;
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
