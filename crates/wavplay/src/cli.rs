use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "wavplay", version, about = "Stream a 16-bit PCM WAV file to an output device")]
pub struct Args {
    /// Path to a 16-bit PCM WAV file
    #[arg(required_unless_present = "list_devices")]
    pub filename: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Frames requested per device callback
    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..))]
    pub frames_per_buffer: u32,

    /// Log audio backend stream errors as warnings instead of debug messages
    #[arg(long)]
    pub show_native_diagnostics: bool,
}
