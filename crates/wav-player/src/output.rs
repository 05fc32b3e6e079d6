//! Audio output collaborator.
//!
//! An [`AudioOutput`] opens a stream for an [`AudioFormat`] and then repeatedly calls the
//! registered [`PullCallback`] from its own real-time thread. The callback fills an
//! interleaved `i16` block and reports whether the stream should keep going.

use anyhow::Result;

use crate::decode::AudioFormat;

/// What the stream should do after the current block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamFlow {
    /// More data follows.
    Continue,
    /// Play out this block, then end the stream.
    Complete,
    /// End the stream now; the block is silence.
    Abort,
}

/// Result of one pull: frames of real audio written plus the flow decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pull {
    pub frames: usize,
    pub flow: StreamFlow,
}

/// Real-time pull callback. The slice length is `frames * channels`.
pub type PullCallback = Box<dyn FnMut(&mut [i16]) -> Pull + Send + 'static>;

/// Opens output streams.
pub trait AudioOutput: Send + Sync {
    fn open(
        &self,
        format: &AudioFormat,
        frames_per_buffer: usize,
        callback: PullCallback,
    ) -> Result<Box<dyn OutputStream>>;

    /// Release device-level resources. Called once on player teardown.
    fn release(&self) {}
}

/// A running output stream.
pub trait OutputStream {
    /// `false` once the callback returned [`StreamFlow::Complete`]/[`StreamFlow::Abort`] or the
    /// backend reported a fatal stream error.
    fn is_active(&self) -> bool;

    /// Stop invoking the callback.
    fn stop(&mut self) -> Result<()>;

    /// Tear the stream down, dropping the callback and everything it captured.
    fn close(&mut self);
}
