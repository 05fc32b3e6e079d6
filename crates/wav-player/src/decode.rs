//! WAV container reader.
//!
//! Uses Symphonia to:
//! - probe the file and validate that it carries 16-bit integer PCM
//! - decode packets into interleaved `i16` frames on demand
//! - rewind to the first frame for looped playback
//!
//! The engine only sees the [`PcmReader`] / [`PcmOpener`] traits, so tests can swap in
//! an in-memory reader.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_PCM_S16LE, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::LoadError;

/// Bytes per sample for the only supported encoding (signed 16-bit PCM).
pub const SAMPLE_WIDTH_BYTES: u16 = 2;

/// Stream parameters taken from the file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_width_bytes: u16,
    pub frame_rate: u32,
}

impl AudioFormat {
    /// 16-bit PCM format with the given layout.
    pub fn pcm16(channels: u16, frame_rate: u32) -> Self {
        Self {
            channels,
            sample_width_bytes: SAMPLE_WIDTH_BYTES,
            frame_rate,
        }
    }

    /// Size of one frame (one sample per channel) in bytes.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_width_bytes as usize
    }

    /// Number of interleaved samples that make up `frames` frames.
    pub fn samples_for(&self, frames: usize) -> usize {
        frames.saturating_mul(self.channels as usize)
    }
}

/// Sequential PCM reader over an opened container.
pub trait PcmReader: Send {
    fn format(&self) -> AudioFormat;

    /// Frame count declared by the container header.
    fn total_frames(&self) -> u64;

    /// Fill `out` with interleaved samples and return the number of whole frames written.
    ///
    /// Fewer frames than requested means the data is exhausted.
    fn read(&mut self, out: &mut [i16]) -> Result<usize>;

    /// Move back to the first frame.
    fn rewind(&mut self) -> Result<()>;
}

/// Opens [`PcmReader`]s from paths.
pub trait PcmOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PcmReader>, LoadError>;
}

/// Symphonia-backed opener for `.wav` files.
#[derive(Clone, Copy, Debug, Default)]
pub struct WavOpener;

impl PcmOpener for WavOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn PcmReader>, LoadError> {
        Ok(Box::new(WavReader::open(path)?))
    }
}

/// Streaming reader for a 16-bit PCM WAV file.
pub struct WavReader {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: AudioFormat,
    total_frames: u64,
    scratch: Option<SampleBuffer<i16>>,
    pending: Vec<i16>,
    pending_pos: usize,
}

impl WavReader {
    /// Probe `path` and prepare a decoder for its default track.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
            _ => LoadError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(path.extension().and_then(|e| e.to_str()).unwrap_or("wav"));

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::invalid(path, e.to_string()))?;
        let format_reader = probed.format;

        let track = format_reader
            .default_track()
            .ok_or_else(|| LoadError::invalid(path, "no audio track"))?;
        let params = track.codec_params.clone();
        let track_id = track.id;

        if params.codec != CODEC_TYPE_PCM_S16LE {
            return Err(LoadError::invalid(path, "only 16-bit integer PCM is supported"));
        }
        if let Some(bits) = params.bits_per_sample {
            if bits != u32::from(SAMPLE_WIDTH_BYTES) * 8 {
                return Err(LoadError::invalid(path, format!("{bits}-bit samples")));
            }
        }
        let channels = params
            .channels
            .map(|c| c.count())
            .filter(|&c| c > 0)
            .ok_or_else(|| LoadError::invalid(path, "unknown channel layout"))?;
        let channels =
            u16::try_from(channels).map_err(|_| LoadError::invalid(path, "too many channels"))?;
        let frame_rate = params
            .sample_rate
            .filter(|&r| r > 0)
            .ok_or_else(|| LoadError::invalid(path, "unknown sample rate"))?;
        let total_frames = params
            .n_frames
            .ok_or_else(|| LoadError::invalid(path, "unknown frame count"))?;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| LoadError::invalid(path, e.to_string()))?;

        let format = AudioFormat::pcm16(channels, frame_rate);
        tracing::debug!(
            path = %path.display(),
            channels,
            frame_rate,
            total_frames,
            "wav opened"
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            format,
            total_frames,
            scratch: None,
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    /// Decode the next packet into `pending`. Returns `false` at end of data.
    fn refill(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(p) => p,
                // Also hit when the data chunk is cut short: symphonia drops the partial
                // final packet, so a truncated file ends on the last whole packet.
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(e) => return Err(e).context("read wav packet"),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    tracing::debug!("skipping undecodable packet: {msg}");
                    continue;
                }
                Err(e) => return Err(e).context("decode wav packet"),
            };

            let spec = *decoded.spec();
            let needed = decoded.capacity() * spec.channels.count();
            if self.scratch.as_ref().is_none_or(|b| b.capacity() < needed) {
                self.scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = self.scratch.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending.extend_from_slice(buf.samples());
            self.pending_pos = 0;
            if !self.pending.is_empty() {
                return Ok(true);
            }
        }
    }
}

impl PcmReader for WavReader {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        let channels = self.format.channels as usize;
        let wanted = out.len() / channels * channels;
        let mut written = 0;

        while written < wanted {
            if self.pending_pos >= self.pending.len() && !self.refill()? {
                break;
            }
            let n = (wanted - written).min(self.pending.len() - self.pending_pos);
            out[written..written + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            written += n;
            self.pending_pos += n;
        }

        Ok(written / channels)
    }

    fn rewind(&mut self) -> Result<()> {
        self.format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: 0,
                    track_id: self.track_id,
                },
            )
            .context("rewind wav")?;
        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;
        Ok(())
    }
}
