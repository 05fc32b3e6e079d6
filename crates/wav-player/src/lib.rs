//! Streaming playback of 16-bit PCM WAV files.
//!
//! A [`WavPlayer`] opens one file at a time and streams it to an output device, reading only
//! the frames the device asks for. Volume and loop mode can be changed while the stream runs.
//!
//! ## Layout
//! - [`decode`]: WAV reader (symphonia) behind the [`decode::PcmReader`] seam.
//! - [`source`]: frame cursor with seamless loop wrap-around.
//! - [`engine`]: load/play/stop state machine and the real-time pull handler.
//! - [`output`], [`playback`], [`device`]: output collaborator traits and their CPAL backend.

pub mod config;
pub mod decode;
pub mod device;
pub mod engine;
pub mod error;
pub mod log;
pub mod output;
pub mod playback;
pub mod player;
pub mod source;
pub mod status;
pub mod volume;

#[cfg(test)]
mod test_support;

pub use config::PlayerConfig;
pub use decode::{AudioFormat, PcmOpener, PcmReader, WavOpener};
pub use engine::{PlaybackEngine, PlayerState, StopReason};
pub use error::{ControlWarning, LoadError, PlaybackError, VolumeOutOfRange};
pub use log::{LogLevel, LogSink, TracingSink};
pub use output::{AudioOutput, OutputStream, Pull, PullCallback, StreamFlow};
pub use playback::CpalOutput;
pub use player::WavPlayer;
pub use status::PlayerStatus;
