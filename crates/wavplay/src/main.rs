//! wavplay: stream a 16-bit PCM WAV file to the default (or a chosen) output device.
//!
//! Playback starts as soon as the file loads and runs until the file ends. Ctrl-C stops it
//! cleanly: the handler asks the player to stop and `play` returns on the main thread.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wav_player::{PlayerConfig, TracingSink, WavPlayer, device};

fn main() -> Result<ExitCode> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if args.list_devices {
        device::list_devices(&cpal::default_host())?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(filename) = args.filename.clone() else {
        return Ok(ExitCode::FAILURE);
    };

    let player = Arc::new(WavPlayer::new(config_from_args(&args)));
    player.set_logger(Arc::new(TracingSink));

    let weak = Arc::downgrade(&player);
    if let Err(e) = ctrlc::set_handler(move || {
        if let Some(player) = weak.upgrade() {
            player.stop();
        }
    }) {
        tracing::warn!("ctrl-c handler not installed: {e}");
    }

    if !player.load(&filename) || !player.play() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn config_from_args(args: &cli::Args) -> PlayerConfig {
    PlayerConfig {
        frames_per_buffer: args.frames_per_buffer as usize,
        device: args.device.clone(),
        suppress_native_diagnostics: !args.show_native_diagnostics,
        ..PlayerConfig::default()
    }
}
