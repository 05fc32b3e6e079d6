use std::time::Duration;

/// Player tuning shared by the engine and the output stage.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Frames requested from the pull callback per device buffer.
    pub frames_per_buffer: usize,
    /// Upper bound on how long the wait loop sleeps before re-checking the stream.
    pub poll_interval: Duration,
    /// Output device name filter (case-insensitive substring); `None` picks the default device.
    pub device: Option<String>,
    /// Route audio backend stream errors to debug level instead of warnings.
    pub suppress_native_diagnostics: bool,
}

impl Default for PlayerConfig {
    /// Defaults match a typical 1024-frame host buffer and a 100 ms wait cadence.
    fn default() -> Self {
        Self {
            frames_per_buffer: 1024,
            poll_interval: Duration::from_millis(100),
            device: None,
            suppress_native_diagnostics: true,
        }
    }
}
