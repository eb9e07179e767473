// Entry point: parses the CLI, checks for mpv, loads config, and runs the TUI.

use std::path::PathBuf;

use clap::Parser;

use emoviz::app::{App, AppOptions};
use emoviz::config::Config;
use emoviz::logging;

#[derive(Parser)]
#[command(
    name = "emoviz",
    about = "Audio-reactive metaball visualizer for emotion-annotated conversations"
)]
struct Cli {
    /// Segments file (emotions JSON) as a path or http(s) URL
    source: Option<String>,

    /// Directory holding the segment audio files (default: next to the segments file)
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    /// Seed for blob placement, noise and highlight search
    #[arg(long)]
    seed: Option<u64>,

    /// Animate without audio; segments advance on their durations
    #[arg(long)]
    no_audio: bool,

    /// Emotions config file to watch for color and charset changes
    #[arg(long)]
    emotions_config: Option<PathBuf>,

    /// Config file (default: ~/.config/emoviz/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Visual-only mode when the player binary is missing.
fn player_available(binary: &str) -> bool {
    if which::which(binary).is_ok() {
        return true;
    }
    eprintln!(
        "Warning: {} not found, running without audio. Install with: brew install mpv",
        binary
    );
    false
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };
    logging::init()?;

    let visual_only = cli.no_audio || !player_available(&config.playback.player);
    let options = AppOptions {
        source: cli.source,
        audio_dir: cli.audio_dir,
        visual_only,
        seed: cli.seed,
        emotions_config: cli.emotions_config,
    };

    let mut app = App::new(config, options)?;
    app.run().await?;

    Ok(())
}
