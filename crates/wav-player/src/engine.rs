//! Playback engine: the load/play/stop state machine and the real-time pull handler.
//!
//! ## Threads
//! - The **control thread** calls [`PlaybackEngine::load`], [`PlaybackEngine::play`] and friends.
//!   `play` blocks in a condvar wait until the stream ends or a stop is requested.
//! - The **audio thread** belongs to the output device and runs the [`PullHandler`].
//!
//! Shared between them: the source slot (locked once per block by the audio thread), the
//! volume and loop flag (atomics), and the stop signal. Any other thread may call
//! [`PlaybackEngine::stop`]; during playback it posts a request, the thread blocked in `play`
//! performs the teardown, and `stop` returns once that teardown has finished. Streams are
//! always opened and closed on the thread that called `play`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::config::PlayerConfig;
use crate::decode::{AudioFormat, PcmOpener};
use crate::error::{ControlWarning, PlaybackError, VolumeOutOfRange};
use crate::log::{Diagnostics, LogSink};
use crate::output::{AudioOutput, OutputStream, Pull, PullCallback, StreamFlow};
use crate::source::FrameSource;
use crate::status::PlayerStatus;
use crate::volume::{self, SharedVolume};

/// Coarse player state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// No file open.
    Idle,
    /// A file is open; no stream.
    Loaded,
    /// An output stream is pulling from the file.
    Playing,
}

/// Why a session is being torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A caller asked for it (including Ctrl-C in the CLI).
    Explicit,
    /// The stream ran out of data or ended on its own.
    NaturalCompletion,
    /// The player is being destroyed; the output device is released as well.
    Teardown,
}

type SourceSlot = Arc<Mutex<Option<FrameSource>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settings the audio thread reads on every block.
#[derive(Debug, Default)]
struct Controls {
    volume: SharedVolume,
    looping: AtomicBool,
    /// Set by the audio thread when it had to abort the stream.
    faulted: AtomicBool,
}

/// Stop request posted to the thread blocked in `play`.
#[derive(Default)]
struct StopSignal {
    requested: Mutex<Option<StopReason>>,
    cv: Condvar,
}

impl StopSignal {
    fn reset(&self) {
        *lock(&self.requested) = None;
    }

    fn request(&self, reason: StopReason) {
        let mut requested = lock(&self.requested);
        // Teardown wins over anything posted before it.
        if *requested != Some(StopReason::Teardown) {
            *requested = Some(reason);
        }
        drop(requested);
        self.cv.notify_all();
    }

    fn pending(&self) -> Option<StopReason> {
        *lock(&self.requested)
    }

    /// Sleep until a request arrives or `timeout` passes.
    fn wait(&self, timeout: Duration) {
        let requested = lock(&self.requested);
        if requested.is_some() {
            return;
        }
        let _ = self
            .cv
            .wait_timeout(requested, timeout)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Pull callback state: exactly the source slot and the shared controls.
pub struct PullHandler {
    slot: SourceSlot,
    controls: Arc<Controls>,
}

impl PullHandler {
    /// Fill `out` with the next block.
    ///
    /// - full block: volume applied, [`StreamFlow::Continue`]
    /// - short block (end of file, no looping): tail zeroed, [`StreamFlow::Complete`]
    /// - no source or read failure: silence, [`StreamFlow::Abort`]
    pub fn pull(&mut self, out: &mut [i16]) -> Pull {
        let mut slot = lock(&self.slot);
        let Some(source) = slot.as_mut() else {
            out.fill(0);
            return self.abort();
        };

        let channels = source.format().channels as usize;
        let requested = out.len() / channels;
        let looping = self.controls.looping.load(Ordering::Relaxed);

        match source.read_into(out, looping) {
            Ok(frames) => {
                let (audio, rest) = out.split_at_mut(frames * channels);
                volume::scale_in_place(audio, self.controls.volume.get());
                rest.fill(0);
                let flow = if frames < requested {
                    StreamFlow::Complete
                } else {
                    StreamFlow::Continue
                };
                Pull { frames, flow }
            }
            Err(e) => {
                tracing::error!("pcm read failed: {e:#}");
                out.fill(0);
                self.abort()
            }
        }
    }

    fn abort(&self) -> Pull {
        self.controls.faulted.store(true, Ordering::Relaxed);
        Pull {
            frames: 0,
            flow: StreamFlow::Abort,
        }
    }

    pub fn into_callback(mut self) -> PullCallback {
        Box::new(move |out: &mut [i16]| self.pull(out))
    }
}

#[derive(Debug, Default)]
struct Session {
    filename: Option<PathBuf>,
    playing: bool,
    released: bool,
    /// Thread blocked in `play`.
    player: Option<ThreadId>,
    /// Bumped every time a session ends.
    ended: u64,
}

impl Session {
    fn finish(&mut self) {
        self.playing = false;
        self.player = None;
        self.ended = self.ended.wrapping_add(1);
    }
}

/// Streaming WAV playback engine.
///
/// Lock order is `session` before `slot`; the audio thread only ever takes `slot`.
pub struct PlaybackEngine {
    opener: Box<dyn PcmOpener>,
    output: Box<dyn AudioOutput>,
    config: PlayerConfig,
    controls: Arc<Controls>,
    slot: SourceSlot,
    session: Mutex<Session>,
    /// Notified when a session ends.
    idle: Condvar,
    signal: StopSignal,
    diag: Diagnostics,
}

impl PlaybackEngine {
    pub fn new(
        config: PlayerConfig,
        opener: Box<dyn PcmOpener>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            opener,
            output,
            config,
            controls: Arc::default(),
            slot: Arc::default(),
            session: Mutex::default(),
            idle: Condvar::new(),
            signal: StopSignal::default(),
            diag: Diagnostics::default(),
        }
    }

    pub fn set_logger(&self, sink: Option<Arc<dyn LogSink>>) {
        self.diag.set_sink(sink);
    }

    /// Open `path`, replacing (and closing) any file loaded before.
    ///
    /// On failure the previous state is kept.
    pub fn load(&self, path: &Path) -> Result<AudioFormat, PlaybackError> {
        let mut session = lock(&self.session);
        if session.playing {
            self.diag.warn("Cannot load a file while playback is running");
            return Err(PlaybackError::Busy);
        }

        let source = match FrameSource::open(self.opener.as_ref(), path) {
            Ok(source) => source,
            Err(e) => {
                self.diag.error(format!("File has not loaded! Error: {e}"));
                return Err(e.into());
            }
        };
        let format = source.format();
        let cursor = source.cursor();
        if let Some(mut previous) = lock(&self.slot).replace(source) {
            previous.close();
        }
        session.filename = Some(path.to_path_buf());

        tracing::debug!(
            path = %path.display(),
            channels = format.channels,
            frame_rate = format.frame_rate,
            total_frames = cursor.total_frames,
            "file loaded"
        );
        Ok(format)
    }

    /// Play the loaded file, blocking until it ends or a stop is requested.
    ///
    /// Returns the reason the session ended. Refusals leave the state untouched.
    pub fn play(&self) -> Result<StopReason, PlaybackError> {
        let (format, filename) = self.begin_session()?;

        let handler = PullHandler {
            slot: self.slot.clone(),
            controls: self.controls.clone(),
        };
        let opened = self.output.open(
            &format,
            self.config.frames_per_buffer,
            handler.into_callback(),
        );
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                lock(&self.session).finish();
                self.idle.notify_all();
                let msg = format!("{e:#}");
                self.diag.error(format!(
                    "Playback has not started! Output device failed: {msg}"
                ));
                return Err(PlaybackError::DeviceOpenFailed(msg));
            }
        };
        self.diag.info(format!("Playback started: {}", filename.display()));

        let reason = self.wait_for_end(stream.as_ref());

        if let Err(e) = stream.stop() {
            self.diag.warn(format!("Output stream did not stop cleanly: {e:#}"));
        }
        stream.close();
        drop(stream);

        if self.controls.faulted.swap(false, Ordering::Relaxed) {
            self.diag.error("Playback aborted: the audio source became unreadable");
        }

        let mut session = lock(&self.session);
        self.teardown(&mut session, reason, true);
        Ok(reason)
    }

    /// Stop playback and unload the file.
    ///
    /// While a session is running this posts `reason` to the thread blocked in
    /// [`PlaybackEngine::play`] and waits until that thread has closed the stream and the file.
    /// Called from the playing thread itself, it only posts the request.
    pub fn stop(&self, reason: StopReason) {
        let mut session = lock(&self.session);
        if !session.playing {
            self.teardown(&mut session, reason, false);
            return;
        }

        tracing::debug!(?reason, "stop requested");
        self.signal.request(reason);
        if session.player == Some(thread::current().id()) {
            return;
        }
        let ended = session.ended;
        while session.ended == ended {
            session = self
                .idle
                .wait(session)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Set the gain applied by the pull callback. Only `0.0..=1.0` is accepted.
    pub fn set_volume(&self, volume: f32) -> Result<f32, VolumeOutOfRange> {
        if !(0.0..=1.0).contains(&volume) {
            let err = VolumeOutOfRange(volume);
            self.diag.warn(err.to_string());
            return Err(err);
        }
        self.controls.volume.set(volume);
        Ok(self.controls.volume.get())
    }

    pub fn volume(&self) -> f32 {
        self.controls.volume.get()
    }

    /// Takes effect on the next block the callback reads.
    pub fn set_loop_mode(&self, looping: bool) -> bool {
        self.controls.looping.store(looping, Ordering::Relaxed);
        looping
    }

    pub fn loop_mode(&self) -> bool {
        self.controls.looping.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> PlayerState {
        let session = lock(&self.session);
        if session.playing {
            PlayerState::Playing
        } else if lock(&self.slot).is_some() {
            PlayerState::Loaded
        } else {
            PlayerState::Idle
        }
    }

    pub fn status(&self) -> PlayerStatus {
        let session = lock(&self.session);
        let slot = lock(&self.slot);
        let state = if session.playing {
            PlayerState::Playing
        } else if slot.is_some() {
            PlayerState::Loaded
        } else {
            PlayerState::Idle
        };
        PlayerStatus {
            state,
            filename: session.filename.clone(),
            format: slot.as_ref().map(FrameSource::format),
            cursor: slot.as_ref().map(FrameSource::cursor),
            volume: self.controls.volume.get(),
            looping: self.controls.looping.load(Ordering::Relaxed),
        }
    }

    /// Validate, re-open a remembered file if needed, and mark the session as playing.
    fn begin_session(&self) -> Result<(AudioFormat, PathBuf), PlaybackError> {
        let mut session = lock(&self.session);
        if session.playing {
            self.diag.warn("Playback is already running");
            return Err(PlaybackError::AlreadyPlaying);
        }

        let mut slot = lock(&self.slot);
        if slot.is_none() {
            let Some(filename) = session.filename.clone() else {
                self.diag.error("Playback has not started! File is not loaded!");
                return Err(PlaybackError::NoFileLoaded);
            };
            match FrameSource::open(self.opener.as_ref(), &filename) {
                Ok(source) => *slot = Some(source),
                Err(e) => {
                    self.diag.error(format!(
                        "Playback has not started! File is corrupted or does not exist! Error: {e}"
                    ));
                    return Err(e.into());
                }
            }
        }
        let Some(format) = slot.as_ref().map(FrameSource::format) else {
            return Err(PlaybackError::NoFileLoaded);
        };
        drop(slot);

        self.signal.reset();
        self.controls.faulted.store(false, Ordering::Relaxed);
        session.playing = true;
        session.released = false;
        session.player = Some(thread::current().id());
        Ok((format, session.filename.clone().unwrap_or_default()))
    }

    fn wait_for_end(&self, stream: &dyn OutputStream) -> StopReason {
        loop {
            if let Some(reason) = self.signal.pending() {
                return reason;
            }
            if !stream.is_active() {
                return StopReason::NaturalCompletion;
            }
            self.signal.wait(self.config.poll_interval);
        }
    }

    /// Close the file, forget the filename, and report. Runs with the session lock held.
    fn teardown(&self, session: &mut Session, reason: StopReason, stream_was_open: bool) {
        let explicit = reason == StopReason::Explicit;
        if explicit && !stream_was_open {
            self.diag.warn(ControlWarning::StopWithNothingPlaying.to_string());
        }

        match lock(&self.slot).take() {
            Some(mut source) => source.close(),
            None if explicit => self.diag.warn(ControlWarning::StopWithNothingLoaded.to_string()),
            None => {}
        }
        session.filename = None;
        if session.playing {
            session.finish();
            self.idle.notify_all();
        }

        if reason == StopReason::Teardown {
            if !session.released {
                session.released = true;
                self.output.release();
            }
        } else {
            self.diag.info("Playback is stopped");
        }
        tracing::debug!(?reason, "session torn down");
    }
}
