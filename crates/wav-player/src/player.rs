//! Public control surface.
//!
//! [`WavPlayer`] wraps the [`PlaybackEngine`] with boolean/`Option` results; every failure is
//! reported through the attached [`LogSink`]. The player is `Send + Sync`: keep it in an `Arc`
//! to call [`WavPlayer::stop`] from another thread while [`WavPlayer::play`] blocks.

use std::path::Path;
use std::sync::Arc;

use crate::config::PlayerConfig;
use crate::decode::{PcmOpener, WavOpener};
use crate::engine::{PlaybackEngine, PlayerState, StopReason};
use crate::log::LogSink;
use crate::output::AudioOutput;
use crate::playback::CpalOutput;
use crate::status::PlayerStatus;

pub struct WavPlayer {
    engine: PlaybackEngine,
}

impl WavPlayer {
    /// Player on the default CPAL host, reading files with symphonia.
    pub fn new(config: PlayerConfig) -> Self {
        let output = CpalOutput::from_config(&config);
        Self::with_backends(config, Box::new(WavOpener), Box::new(output))
    }

    pub fn with_backends(
        config: PlayerConfig,
        opener: Box<dyn PcmOpener>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            engine: PlaybackEngine::new(config, opener, output),
        }
    }

    /// Open `path` for playback. `false` leaves the previous file (if any) loaded.
    pub fn load(&self, path: impl AsRef<Path>) -> bool {
        self.engine.load(path.as_ref()).is_ok()
    }

    /// Play the loaded file to the end, or until [`WavPlayer::stop`] is called.
    ///
    /// Blocks the calling thread. Returns `false` if playback could not start.
    pub fn play(&self) -> bool {
        match self.engine.play() {
            Ok(reason) => {
                tracing::debug!(?reason, "playback finished");
                true
            }
            Err(_) => false,
        }
    }

    pub fn stop(&self) {
        self.engine.stop(StopReason::Explicit);
    }

    /// `None` when `volume` is outside `0.0..=1.0`; the old volume stays.
    pub fn set_volume(&self, volume: f32) -> Option<f32> {
        self.engine.set_volume(volume).ok()
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    pub fn set_loop_mode(&self, looping: bool) -> bool {
        self.engine.set_loop_mode(looping)
    }

    pub fn loop_mode(&self) -> bool {
        self.engine.loop_mode()
    }

    pub fn set_logger(&self, sink: Arc<dyn LogSink>) {
        self.engine.set_logger(Some(sink));
    }

    pub fn clear_logger(&self) {
        self.engine.set_logger(None);
    }

    pub fn state(&self) -> PlayerState {
        self.engine.state()
    }

    pub fn status(&self) -> PlayerStatus {
        self.engine.status()
    }
}

impl Drop for WavPlayer {
    fn drop(&mut self) {
        self.engine.stop(StopReason::Teardown);
    }
}
