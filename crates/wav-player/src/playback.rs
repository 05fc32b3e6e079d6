//! CPAL implementation of the output collaborator.
//!
//! Builds the CPAL output stream and wraps the engine's pull callback.
//! The real-time callback:
//! - asks the pull callback for an interleaved `i16` block (no locks beyond the callback's own)
//! - converts `i16` samples to the device sample format
//! - flips the stream inactive once the callback reports the end of data

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::config::PlayerConfig;
use crate::decode::AudioFormat;
use crate::device;
use crate::output::{AudioOutput, OutputStream, PullCallback, StreamFlow};

/// Extra time given to the device to play out the final block after a natural end.
const FLUSH_GRACE: Duration = Duration::from_millis(100);

/// Output collaborator backed by the default CPAL host.
#[derive(Clone, Debug, Default)]
pub struct CpalOutput {
    device: Option<String>,
    suppress_native_diagnostics: bool,
}

impl CpalOutput {
    pub fn new(device: Option<String>, suppress_native_diagnostics: bool) -> Self {
        Self {
            device,
            suppress_native_diagnostics,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.device.clone(), config.suppress_native_diagnostics)
    }
}

impl AudioOutput for CpalOutput {
    fn open(
        &self,
        format: &AudioFormat,
        frames_per_buffer: usize,
        callback: PullCallback,
    ) -> Result<Box<dyn OutputStream>> {
        let host = cpal::default_host();
        let device = device::pick_device(&host, self.device.as_deref())?;
        let supported = device::pick_output_config(&device, format)?;
        let sample_format = supported.sample_format();
        let mut config: cpal::StreamConfig = supported.config();
        config.buffer_size = device::pick_buffer_size(&supported, frames_per_buffer);

        tracing::info!(
            device = %device.description()?,
            channels = config.channels,
            rate_hz = format.frame_rate,
            sample_format = ?sample_format,
            buffer = ?config.buffer_size,
            "opening output stream"
        );

        let active = Arc::new(AtomicBool::new(true));
        let drained = Arc::new(AtomicBool::new(false));
        let shared = CallbackShared {
            active: active.clone(),
            drained: drained.clone(),
            suppress_native_diagnostics: self.suppress_native_diagnostics,
            scratch_frames: frames_per_buffer.max(1),
        };

        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, callback, shared)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, callback, shared)?,
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, callback, shared)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, callback, shared)?,
            other => return Err(anyhow!("Unsupported sample format: {other:?}")),
        };
        stream.play().context("start output stream")?;

        let buffer_time =
            Duration::from_secs_f64(frames_per_buffer as f64 / f64::from(format.frame_rate.max(1)));
        Ok(Box::new(CpalStream {
            stream: Some(stream),
            active,
            drained,
            flush: buffer_time + FLUSH_GRACE,
        }))
    }

    fn release(&self) {
        tracing::debug!("cpal output released");
    }
}

/// State shared between the CPAL callbacks and [`CpalStream`].
struct CallbackShared {
    active: Arc<AtomicBool>,
    drained: Arc<AtomicBool>,
    suppress_native_diagnostics: bool,
    scratch_frames: usize,
}

/// Type-specialized stream builder for CPAL sample formats.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: PullCallback,
    shared: CallbackShared,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<i16>,
{
    let channels = config.channels as usize;
    let mut scratch = vec![0i16; shared.scratch_frames * channels];
    let active_cb = shared.active.clone();
    let drained_cb = shared.drained.clone();
    let active_err = shared.active.clone();
    let suppress = shared.suppress_native_diagnostics;

    let err_fn = move |err: cpal::StreamError| {
        if suppress {
            tracing::debug!("stream error: {err}");
        } else {
            tracing::warn!("stream error: {err}");
        }
        if is_fatal(&err) {
            active_err.store(false, Ordering::Release);
        }
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if !active_cb.load(Ordering::Acquire) {
                data.fill(<T as cpal::Sample>::from_sample::<i16>(0));
                return;
            }
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0);
            }
            let block = &mut scratch[..data.len()];
            let pull = callback(block);
            for (dst, &src) in data.iter_mut().zip(block.iter()) {
                *dst = <T as cpal::Sample>::from_sample::<i16>(src);
            }
            match pull.flow {
                StreamFlow::Continue => {}
                StreamFlow::Complete => {
                    drained_cb.store(true, Ordering::Release);
                    active_cb.store(false, Ordering::Release);
                }
                StreamFlow::Abort => active_cb.store(false, Ordering::Release),
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Every stream error except an under/overrun means the callback will not run again.
fn is_fatal(err: &cpal::StreamError) -> bool {
    !matches!(err, cpal::StreamError::BufferUnderrun)
}

/// Running CPAL stream. Dropping it drops the pull callback.
struct CpalStream {
    stream: Option<cpal::Stream>,
    active: Arc<AtomicBool>,
    drained: Arc<AtomicBool>,
    flush: Duration,
}

impl OutputStream for CpalStream {
    fn is_active(&self) -> bool {
        self.stream.is_some() && self.active.load(Ordering::Acquire)
    }

    fn stop(&mut self) -> Result<()> {
        if self.drained.load(Ordering::Acquire) {
            // The last block was handed to the device but may not have been heard yet.
            thread::sleep(self.flush);
        }
        self.active.store(false, Ordering::Release);
        if let Some(stream) = &self.stream {
            stream.pause().context("pause output stream")?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("output stream closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_underruns_keep_the_stream_alive() {
        assert!(!is_fatal(&cpal::StreamError::BufferUnderrun));
        assert!(is_fatal(&cpal::StreamError::DeviceNotAvailable));
        assert!(is_fatal(&cpal::StreamError::StreamInvalidated));
        assert!(is_fatal(&cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "device reset".to_string(),
            },
        }));
    }
}
