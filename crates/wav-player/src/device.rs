//! Output device discovery and stream-config negotiation.
//!
//! Thin wrappers around CPAL for:
//! - resolving the `--device` filter (blank means the host default)
//! - finding a device config that plays the file's channel count and rate verbatim
//! - sizing the device buffer around the requested frames per callback

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

use crate::decode::AudioFormat;

/// Resolve the `--device` filter to an output device.
///
/// `None` or a blank filter selects the host default; otherwise the first device whose
/// description contains the filter, ignoring case.
pub fn pick_device(host: &cpal::Host, filter: Option<&str>) -> Result<cpal::Device> {
    let filter = filter.map(str::trim).filter(|f| !f.is_empty());
    let Some(filter) = filter else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("host has no default output device"));
    };

    host.output_devices()
        .context("enumerate output devices")?
        .find(|d| {
            d.description()
                .is_ok_and(|desc| name_matches(&desc.name(), filter))
        })
        .ok_or_else(|| anyhow!("no output device matches {filter:?}"))
}

/// Choose a device config with exactly the file's channel count and frame rate.
///
/// Among matching ranges the sample format closest to 16-bit PCM wins, so most devices
/// take the samples without conversion.
pub fn pick_output_config(
    device: &cpal::Device,
    format: &AudioFormat,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges = device
        .supported_output_configs()
        .context("query supported output configs")?;

    let mut best: Option<(u8, cpal::SupportedStreamConfigRange)> = None;
    for range in ranges {
        if !range_accepts(
            range.channels(),
            range.min_sample_rate(),
            range.max_sample_rate(),
            format,
        ) {
            continue;
        }
        let rank = sample_format_rank(range.sample_format());
        if rank == UNSUPPORTED_RANK {
            continue;
        }
        if best.as_ref().is_none_or(|(b, _)| rank < *b) {
            best = Some((rank, range));
        }
    }

    best.map(|(_, range)| range.with_sample_rate(format.frame_rate))
        .ok_or_else(|| {
            anyhow!(
                "device has no {}-channel output at {} Hz",
                format.channels,
                format.frame_rate
            )
        })
}

/// Ask for `frames_per_buffer` frames per callback, clamped to what the device supports.
///
/// Returns the device default when the device does not report a range.
pub fn pick_buffer_size(
    config: &cpal::SupportedStreamConfig,
    frames_per_buffer: usize,
) -> cpal::BufferSize {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            cpal::BufferSize::Fixed(clamp_buffer_frames(frames_per_buffer, *min, *max))
        }
        cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
    }
}

/// Print one line per output device for `--list-devices`, flagging the host default.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let default_name = host
        .default_output_device()
        .and_then(|d| d.description().ok())
        .map(|desc| desc.name().to_string());
    for (i, d) in host
        .output_devices()
        .context("enumerate output devices")?
        .enumerate()
    {
        let desc = d.description()?;
        let marker = if default_name.as_deref() == Some(&*desc.name()) {
            " (default)"
        } else {
            ""
        };
        println!("#{i}: {desc}{marker}");
    }
    Ok(())
}

const UNSUPPORTED_RANK: u8 = u8::MAX;

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::I16 => 0,
        cpal::SampleFormat::F32 => 1,
        cpal::SampleFormat::I32 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => UNSUPPORTED_RANK,
    }
}

fn range_accepts(channels: u16, min_rate: u32, max_rate: u32, format: &AudioFormat) -> bool {
    channels == format.channels && (min_rate..=max_rate).contains(&format.frame_rate)
}

fn clamp_buffer_frames(requested: usize, min: u32, max: u32) -> u32 {
    let requested = u32::try_from(requested.max(1)).unwrap_or(u32::MAX);
    requested.clamp(min, max.max(min))
}

/// `filter` is already trimmed and non-empty.
fn name_matches(name: &str, filter: &str) -> bool {
    name.to_lowercase().contains(&filter.to_lowercase())
}
