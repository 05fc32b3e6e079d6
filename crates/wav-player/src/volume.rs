//! Volume scaling for signed 16-bit samples.

use std::sync::atomic::{AtomicU32, Ordering};

/// Clamp a gain to `[0, 1]`; NaN maps to silence.
fn sanitize(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Scale one sample: `round(sample * volume)`, saturated to the i16 range.
#[inline]
fn scale_sample(sample: i16, volume: f32) -> i16 {
    // `as` saturates float -> int, so no wraparound past i16::MIN/MAX.
    (f32::from(sample) * volume).round() as i16
}

/// Return a scaled copy of `samples`.
pub fn scale(samples: &[i16], volume: f32) -> Vec<i16> {
    let volume = sanitize(volume);
    samples.iter().map(|&s| scale_sample(s, volume)).collect()
}

/// Scale `samples` in place. Used on the audio thread.
pub fn scale_in_place(samples: &mut [i16], volume: f32) {
    let volume = sanitize(volume);
    for s in samples.iter_mut() {
        *s = scale_sample(*s, volume);
    }
}

/// Volume cell written by the control thread and read by the audio callback.
///
/// Stores the `f32` bit pattern, so loads are never torn.
#[derive(Debug)]
pub struct SharedVolume(AtomicU32);

impl SharedVolume {
    pub fn new(volume: f32) -> Self {
        Self(AtomicU32::new(sanitize(volume).to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, volume: f32) {
        self.0.store(sanitize(volume).to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedVolume {
    fn default() -> Self {
        Self::new(1.0)
    }
}
