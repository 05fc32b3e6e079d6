//! Shared fixtures for unit tests: WAV writers, an in-memory reader, a threaded mock
//! output device and a recording log sink.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::decode::{AudioFormat, PcmOpener, PcmReader};
use crate::error::LoadError;
use crate::log::{LogLevel, LogSink};
use crate::output::{AudioOutput, OutputStream, PullCallback, StreamFlow};

/// Distinct, deterministic samples: sample `i` is `7 * i` wrapped into i16.
pub fn ramp(channels: u16, frames: usize) -> Vec<i16> {
    (0..frames * channels as usize)
        .map(|i| (i as u32).wrapping_mul(7) as u16 as i16)
        .collect()
}

pub fn write_wav(dir: &Path, name: &str, channels: u16, rate: u32, samples: &[i16]) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[derive(Default)]
struct OpenerCounters {
    open_handles: AtomicUsize,
    opens: AtomicUsize,
    rewinds: AtomicUsize,
}

/// Opener serving the same in-memory PCM for every path, counting live readers.
pub struct MemoryOpener {
    format: AudioFormat,
    samples: Arc<Vec<i16>>,
    counters: Arc<OpenerCounters>,
    missing: Mutex<HashSet<PathBuf>>,
}

impl MemoryOpener {
    pub fn new(format: AudioFormat, samples: Vec<i16>) -> Self {
        Self {
            format,
            samples: Arc::new(samples),
            counters: Arc::default(),
            missing: Mutex::default(),
        }
    }

    /// Make `open(path)` fail with `NotFound`.
    pub fn mark_missing(&self, path: &Path) {
        self.missing.lock().unwrap().insert(path.to_path_buf());
    }

    pub fn samples(&self) -> Vec<i16> {
        self.samples.as_ref().clone()
    }

    pub fn open_handles(&self) -> usize {
        self.counters.open_handles.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn rewinds(&self) -> usize {
        self.counters.rewinds.load(Ordering::SeqCst)
    }
}

impl PcmOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn PcmReader>, LoadError> {
        if self.missing.lock().unwrap().contains(path) {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        self.counters.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryReader {
            format: self.format,
            samples: self.samples.clone(),
            pos: 0,
            counters: self.counters.clone(),
        }))
    }
}

/// Lets tests hand the opener to an engine while keeping the counters.
impl PcmOpener for Arc<MemoryOpener> {
    fn open(&self, path: &Path) -> Result<Box<dyn PcmReader>, LoadError> {
        self.as_ref().open(path)
    }
}

struct MemoryReader {
    format: AudioFormat,
    samples: Arc<Vec<i16>>,
    pos: usize,
    counters: Arc<OpenerCounters>,
}

impl PcmReader for MemoryReader {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_frames(&self) -> u64 {
        (self.samples.len() / self.format.channels as usize) as u64
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        let channels = self.format.channels as usize;
        let n = (out.len() / channels * channels).min(self.samples.len() - self.pos);
        out[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n / channels)
    }

    fn rewind(&mut self) -> Result<()> {
        self.counters.rewinds.fetch_add(1, Ordering::SeqCst);
        self.pos = 0;
        Ok(())
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        self.counters.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockOutputState {
    fail_open: AtomicBool,
    open_streams: AtomicUsize,
    opens: AtomicUsize,
    releases: AtomicUsize,
    pulls: Mutex<Vec<usize>>,
    played: Mutex<Vec<i16>>,
    formats: Mutex<Vec<(AudioFormat, usize)>>,
}

/// Output device that drives the pull callback from its own thread, one block per tick.
#[derive(Clone, Default)]
pub struct MockOutput {
    state: Arc<MockOutputState>,
}

impl MockOutput {
    pub fn failing() -> Self {
        let out = Self::default();
        out.state.fail_open.store(true, Ordering::SeqCst);
        out
    }

    pub fn open_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    /// Frame counts returned by each pull, in call order.
    pub fn pulls(&self) -> Vec<usize> {
        self.state.pulls.lock().unwrap().clone()
    }

    /// Audio samples produced by the callback (silence padding excluded).
    pub fn played(&self) -> Vec<i16> {
        self.state.played.lock().unwrap().clone()
    }

    pub fn opened_with(&self) -> Vec<(AudioFormat, usize)> {
        self.state.formats.lock().unwrap().clone()
    }
}

impl AudioOutput for MockOutput {
    fn open(
        &self,
        format: &AudioFormat,
        frames_per_buffer: usize,
        mut callback: PullCallback,
    ) -> Result<Box<dyn OutputStream>> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(anyhow!("mock device unavailable"));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        self.state.open_streams.fetch_add(1, Ordering::SeqCst);
        self.state
            .formats
            .lock()
            .unwrap()
            .push((*format, frames_per_buffer));

        let active = Arc::new(AtomicBool::new(true));
        let halt = Arc::new(AtomicBool::new(false));
        let channels = format.channels as usize;
        let state = self.state.clone();
        let active_rt = active.clone();
        let halt_rt = halt.clone();

        let worker = thread::spawn(move || {
            let mut block = vec![0i16; frames_per_buffer * channels];
            while !halt_rt.load(Ordering::SeqCst) {
                let pull = callback(&mut block);
                state.pulls.lock().unwrap().push(pull.frames);
                state
                    .played
                    .lock()
                    .unwrap()
                    .extend_from_slice(&block[..pull.frames * channels]);
                if pull.flow != StreamFlow::Continue {
                    active_rt.store(false, Ordering::SeqCst);
                    break;
                }
                thread::sleep(Duration::from_micros(200));
            }
        });

        Ok(Box::new(MockStream {
            state: self.state.clone(),
            active,
            halt,
            worker: Some(worker),
            closed: false,
        }))
    }

    fn release(&self) {
        self.state.releases.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockStream {
    state: Arc<MockOutputState>,
    active: Arc<AtomicBool>,
    halt: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    closed: bool,
}

impl MockStream {
    fn join(&mut self) {
        self.halt.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.join().unwrap();
        }
    }
}

impl OutputStream for MockStream {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn stop(&mut self) -> Result<()> {
        self.join();
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.join();
        if !self.closed {
            self.closed = true;
            self.state.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}
