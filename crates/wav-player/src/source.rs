//! Cursor-tracking frame source.
//!
//! Wraps a [`PcmReader`] and keeps the logical read position. Looped reads split at
//! end-of-file: the tail is read, the reader rewinds, and the remainder comes from the start,
//! so the frame after the last one is always frame 0.

use std::path::Path;

use anyhow::{Result, anyhow};

use crate::decode::{AudioFormat, PcmOpener, PcmReader};
use crate::error::LoadError;

/// Read position within the file, in frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    pub position: u64,
    pub total_frames: u64,
}

impl PlaybackCursor {
    fn frames_until_eof(&self) -> u64 {
        self.total_frames.saturating_sub(self.position)
    }
}

pub struct FrameSource {
    reader: Option<Box<dyn PcmReader>>,
    format: AudioFormat,
    cursor: PlaybackCursor,
}

impl FrameSource {
    /// Open `path` through `opener`; the cursor starts at frame 0.
    pub fn open(opener: &dyn PcmOpener, path: &Path) -> Result<Self, LoadError> {
        Ok(Self::from_reader(opener.open(path)?))
    }

    pub fn from_reader(reader: Box<dyn PcmReader>) -> Self {
        let format = reader.format();
        let cursor = PlaybackCursor {
            position: 0,
            total_frames: reader.total_frames(),
        };
        Self {
            reader: Some(reader),
            format,
            cursor,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Read `count` frames into a new buffer.
    ///
    /// The buffer is shorter than requested only when the file ended and `looping` is off.
    pub fn read_frames(&mut self, count: usize, looping: bool) -> Result<Vec<i16>> {
        let mut out = vec![0i16; self.format.samples_for(count)];
        let frames = self.read_into(&mut out, looping)?;
        out.truncate(self.format.samples_for(frames));
        Ok(out)
    }

    /// Fill `out` with whole frames and return how many were written.
    ///
    /// Does not allocate; this is the form used on the audio thread.
    pub fn read_into(&mut self, out: &mut [i16], looping: bool) -> Result<usize> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| anyhow!("frame source is closed"))?;
        let channels = self.format.channels as usize;
        let wanted = out.len() / channels;
        let mut filled = 0usize;

        while filled < wanted {
            let take = ((wanted - filled) as u64).min(self.cursor.frames_until_eof()) as usize;
            if take > 0 {
                let span = &mut out[filled * channels..(filled + take) * channels];
                let got = reader.read(span)?;
                self.cursor.position += got as u64;
                filled += got;
                if got == take {
                    continue;
                }
                // The data chunk is shorter than the header claims.
                tracing::debug!(
                    declared = self.cursor.total_frames,
                    actual = self.cursor.position,
                    "pcm data ended early"
                );
                self.cursor.total_frames = self.cursor.position;
            }

            if !looping || self.cursor.total_frames == 0 {
                break;
            }
            reader.rewind()?;
            self.cursor.position = 0;
        }

        Ok(filled)
    }

    /// Release the reader. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!("frame source closed");
        }
    }
}
