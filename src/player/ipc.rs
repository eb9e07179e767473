// Low-level mpv IPC: socket communication, and background tasks that report
// segment start, exit and audio levels back to the app. Every message is
// tagged with the segment id it was spawned for.

use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::Child;
use tokio::sync::mpsc;

use crate::action::Action;

pub type MpvProcess = std::sync::Arc<tokio::sync::Mutex<Option<Child>>>;

// How long to wait for mpv's IPC socket to appear (20 * 100ms = 2s).
const SOCKET_POLL_ATTEMPTS: u32 = 20;
const SOCKET_POLL_INTERVAL_MS: u64 = 100;
const EXIT_POLL_INTERVAL_MS: u64 = 200;
const LEVEL_POLL_INTERVAL_MS: u64 = 33;
// Silence floor for dB-to-level conversion.
const SILENCE_FLOOR_DB: f64 = -60.0;

const RMS_KEY: &str = "lavfi.astats.Overall.RMS_level";
const PEAK_KEY: &str = "lavfi.astats.Overall.Peak_level";
const ZCR_KEY: &str = "lavfi.astats.Overall.Zero_crossings_rate";

/// Wait for the IPC socket to appear on disk (up to 2 seconds).
pub async fn wait_for_socket(path: &Path) -> bool {
    for _ in 0..SOCKET_POLL_ATTEMPTS {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(SOCKET_POLL_INTERVAL_MS)).await;
    }
    path.exists()
}

/// Send a single JSON command over a fresh IPC connection, return the response line.
pub async fn send_command(socket_path: &Path, cmd: &str) -> anyhow::Result<String> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to mpv IPC socket: {}", e))?;
    let msg = format!("{}\n", cmd);
    stream.write_all(msg.as_bytes()).await?;
    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    reader.read_line(&mut response).await?;
    Ok(response)
}

/// Poll the child process. A clean exit finishes the segment, a non-zero
/// exit (unreadable file, unsupported codec) fails it.
pub fn spawn_exit_monitor(child: MpvProcess, segment_id: u64, tx: mpsc::UnboundedSender<Action>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_millis(EXIT_POLL_INTERVAL_MS)).await;
            let mut guard = child.lock().await;
            match guard.as_mut().map(|c| c.try_wait()) {
                Some(Ok(Some(status))) => {
                    *guard = None;
                    let action = if status.success() {
                        Action::PlaybackFinished { segment_id }
                    } else {
                        Action::PlaybackFailed {
                            segment_id,
                            error: format!("mpv exited with {}", status),
                        }
                    };
                    tx.send(action).ok();
                    break;
                }
                Some(Ok(None)) => {} // still running
                Some(Err(e)) => {
                    tracing::warn!(segment_id, error = %e, "lost track of mpv process");
                    break;
                }
                None => break, // stopped by us
            }
        }
    });
}

/// Report the segment as started once mpv's socket is up, then poll the
/// astats filter metadata and forward levels until the socket goes away.
pub fn spawn_audio_level_poller(
    socket_path: PathBuf,
    segment_id: u64,
    tx: mpsc::UnboundedSender<Action>,
) {
    tokio::spawn(async move {
        if !wait_for_socket(&socket_path).await {
            tracing::warn!(segment_id, "mpv IPC socket never appeared");
            return;
        }
        tx.send(Action::PlaybackStarted { segment_id }).ok();
        loop {
            tokio::time::sleep(tokio::time::Duration::from_millis(LEVEL_POLL_INTERVAL_MS)).await;
            let Ok(response) = send_command(
                &socket_path,
                r#"{"command":["get_property","af-metadata/astats"]}"#,
            )
            .await
            else {
                break;
            };
            let Some((rms, peak, zero_crossing_rate)) = parse_astats(&response) else {
                continue;
            };
            if tx
                .send(Action::AudioLevels {
                    segment_id,
                    rms,
                    peak,
                    zero_crossing_rate,
                })
                .is_err()
            {
                break;
            }
        }
    });
}

/// Extract (rms, peak, zero-crossing rate) from an astats property reply.
/// Levels are mapped from dB onto 0..1 over a 60 dB range.
pub fn parse_astats(response: &str) -> Option<(f64, f64, f64)> {
    let val: serde_json::Value = serde_json::from_str(response).ok()?;
    let data = val.get("data")?.as_object()?;
    let read = |key: &str| {
        data.get(key).and_then(|v| match v {
            serde_json::Value::String(s) => s.parse::<f64>().ok(),
            other => other.as_f64(),
        })
    };
    let rms = db_to_level(read(RMS_KEY)?);
    let peak = db_to_level(read(PEAK_KEY)?);
    let zcr = read(ZCR_KEY).unwrap_or(0.0).clamp(0.0, 1.0);
    Some((rms, peak, zcr))
}

/// Convert decibels to a 0.0–1.0 level, linear in dB above the silence floor.
pub fn db_to_level(db: f64) -> f64 {
    if !db.is_finite() || db <= SILENCE_FLOOR_DB {
        0.0
    } else {
        ((db - SILENCE_FLOOR_DB) / -SILENCE_FLOOR_DB).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_mapping() {
        assert_eq!(db_to_level(-90.0), 0.0);
        assert_eq!(db_to_level(f64::NEG_INFINITY), 0.0);
        assert!((db_to_level(-30.0) - 0.5).abs() < 1e-9);
        assert_eq!(db_to_level(3.0), 1.0);
    }

    #[test]
    fn astats_reply_parsing() {
        let reply = r#"{"data":{"lavfi.astats.Overall.RMS_level":"-30.0","lavfi.astats.Overall.Peak_level":"-6.0","lavfi.astats.Overall.Zero_crossings_rate":"0.12"},"error":"success"}"#;
        let (rms, peak, zcr) = parse_astats(reply).unwrap();
        assert!((rms - 0.5).abs() < 1e-9);
        assert!((peak - 0.9).abs() < 1e-9);
        assert!((zcr - 0.12).abs() < 1e-9);
    }

    #[test]
    fn missing_levels_yield_nothing() {
        assert!(parse_astats(r#"{"data":{},"error":"success"}"#).is_none());
        assert!(parse_astats(r#"{"error":"property unavailable"}"#).is_none());
    }
}
