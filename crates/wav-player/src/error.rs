//! Error types for the player.
//!
//! Load and playback failures are recoverable: the facade turns them into a
//! `bool`/`Option` outcome plus a log line. Nothing here is meant to escape as a panic.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to open a WAV file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The path does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but is not 16-bit integer PCM WAV.
    #[error("invalid format in {}: {reason}", .path.display())]
    InvalidFormat { path: PathBuf, reason: String },

    /// Any other I/O failure while opening.
    #[error("cannot open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Reasons `play()` refuses to start.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no file is loaded")]
    NoFileLoaded,

    #[error("playback is already running")]
    AlreadyPlaying,

    /// A control operation that needs an idle stream was called during playback.
    #[error("player is busy playing")]
    Busy,

    #[error("file is corrupted or does not exist: {0}")]
    Load(#[from] LoadError),

    #[error("failed to open output stream: {0}")]
    DeviceOpenFailed(String),
}

/// Redundant control calls; logged at warning level, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlWarning {
    #[error("Not a single file is playing!")]
    StopWithNothingPlaying,

    #[error("Not a single file is loaded!")]
    StopWithNothingLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("Volume must be in 0.0..1.0 (got {0})")]
pub struct VolumeOutOfRange(pub f32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_messages_name_the_path() {
        let err = LoadError::NotFound(PathBuf::from("/tmp/missing.wav"));
        assert_eq!(err.to_string(), "file not found: /tmp/missing.wav");

        let err = LoadError::invalid("a.wav", "24-bit samples");
        assert_eq!(err.to_string(), "invalid format in a.wav: 24-bit samples");
    }

    #[test]
    fn control_warnings_use_player_wording() {
        assert_eq!(
            ControlWarning::StopWithNothingPlaying.to_string(),
            "Not a single file is playing!"
        );
        assert_eq!(
            ControlWarning::StopWithNothingLoaded.to_string(),
            "Not a single file is loaded!"
        );
    }

    #[test]
    fn load_errors_convert_into_playback_errors() {
        let err: PlaybackError = LoadError::NotFound(PathBuf::from("x.wav")).into();
        assert!(matches!(err, PlaybackError::Load(LoadError::NotFound(_))));
    }
}
