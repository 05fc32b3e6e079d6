use std::path::PathBuf;

use crate::decode::AudioFormat;
use crate::engine::PlayerState;
use crate::source::PlaybackCursor;

/// Point-in-time view of the player, taken under the engine's locks.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    /// File that `play` will use; cleared by every stop.
    pub filename: Option<PathBuf>,
    /// Format of the open file.
    pub format: Option<AudioFormat>,
    /// Read position in the open file.
    pub cursor: Option<PlaybackCursor>,
    pub volume: f32,
    pub looping: bool,
}

impl PlayerStatus {
    /// Milliseconds of audio read so far in the current pass through the file.
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.frames_to_ms(|c| c.position)
    }

    /// Length of the open file in milliseconds.
    pub fn duration_ms(&self) -> Option<u64> {
        self.frames_to_ms(|c| c.total_frames)
    }

    fn frames_to_ms(&self, pick: impl Fn(&PlaybackCursor) -> u64) -> Option<u64> {
        match (self.cursor.as_ref(), self.format) {
            (Some(cursor), Some(format)) if format.frame_rate > 0 => {
                Some(pick(cursor).saturating_mul(1000) / u64::from(format.frame_rate))
            }
            _ => None,
        }
    }
}
