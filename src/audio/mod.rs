pub mod source;

use anyhow::{Context, Result};
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
#[cfg(unix)]
use std::ffi::CString;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

pub use source::{MediaSource, fallback_tone, fallback_tone_data_uri};

const MAX_VOLUME: f32 = 2.5;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("no media reference")]
    Empty,
    #[error("remote media cannot be fetched by this host: {0}")]
    Unsupported(String),
    #[error("invalid data uri: {0}")]
    InvalidDataUri(String),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {label}: {reason}")]
    Decode { label: String, reason: String },
    #[error("nothing loaded")]
    NotLoaded,
}

/// One audio element: owns whatever the host needs to play a single source.
pub trait AudioHandle {
    /// Prepares `source` for playback, replacing whatever was loaded before.
    fn load(&mut self, source: &MediaSource) -> Result<(), MediaError>;
    /// Starts or resumes the loaded source.
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    /// True once a started source has played to its natural end.
    fn is_finished(&self) -> bool;
    fn set_volume(&mut self, volume: f32);
}

/// Hands out independent audio handles sharing one output.
pub trait AudioBackend {
    fn open_handle(&self) -> Box<dyn AudioHandle>;
    fn output_name(&self) -> String;
}

pub struct RodioBackend {
    stream: OutputStream,
    volume: f32,
}

impl RodioBackend {
    pub fn new(volume: f32) -> Result<Self> {
        let stream = open_output_stream()?;
        tracing::info!("audio output stream opened");
        Ok(Self {
            stream,
            volume: volume.clamp(0.0, MAX_VOLUME),
        })
    }
}

impl AudioBackend for RodioBackend {
    fn open_handle(&self) -> Box<dyn AudioHandle> {
        Box::new(RodioHandle {
            mixer: self.stream.mixer().clone(),
            sink: None,
            loaded: None,
            volume: self.volume,
        })
    }

    fn output_name(&self) -> String {
        String::from("System default output (CPAL)")
    }
}

struct LoadedMedia {
    label: String,
    bytes: Vec<u8>,
}

pub struct RodioHandle {
    mixer: Mixer,
    sink: Option<Sink>,
    loaded: Option<LoadedMedia>,
    volume: f32,
}

impl RodioHandle {
    fn decoder(media: &LoadedMedia) -> Result<Decoder<Cursor<Vec<u8>>>, MediaError> {
        Decoder::new(Cursor::new(media.bytes.clone())).map_err(|err| MediaError::Decode {
            label: media.label.clone(),
            reason: err.to_string(),
        })
    }
}

impl AudioHandle for RodioHandle {
    fn load(&mut self, source: &MediaSource) -> Result<(), MediaError> {
        self.stop();
        let media = LoadedMedia {
            label: source.label(),
            bytes: source.read_bytes()?,
        };
        Self::decoder(&media)?;
        self.loaded = Some(media);
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if let Some(sink) = &self.sink
            && sink.is_paused()
            && !sink.empty()
        {
            sink.play();
            return Ok(());
        }

        let media = self.loaded.as_ref().ok_or(MediaError::NotLoaded)?;
        let decoder = Self::decoder(media)?;
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        let sink = Sink::connect_new(&self.mixer);
        sink.set_volume(self.volume);
        sink.append(decoder);
        self.sink = Some(sink);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_paused(&self) -> bool {
        self.sink.as_ref().is_some_and(Sink::is_paused)
    }

    fn is_finished(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.is_paused() && sink.empty())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }
}

fn open_output_stream() -> Result<OutputStream> {
    let mut stream = with_silenced_stderr(|| {
        let default = OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            });
        let default_err = match default {
            Ok(stream) => return Ok(stream),
            Err(err) => err,
        };

        let host = rodio::cpal::default_host();
        let mut candidates: Vec<String> = host
            .output_devices()
            .ok()
            .into_iter()
            .flatten()
            .filter_map(|device| device.name().ok())
            .collect();
        candidates.sort_by_cached_key(|name| {
            let lower = name.to_ascii_lowercase();
            let rank = if lower.contains("pulse") {
                0_u8
            } else if lower.contains("pipewire") {
                1_u8
            } else if lower.contains("default") {
                2_u8
            } else {
                3_u8
            };
            (rank, lower)
        });
        candidates.dedup();

        for candidate in candidates {
            let Some(device) = host
                .output_devices()
                .ok()
                .into_iter()
                .flatten()
                .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
            else {
                continue;
            };
            let opened = OutputStreamBuilder::from_device(device)
                .context("failed to open fallback output device")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start fallback output stream")
                });
            if let Ok(stream) = opened {
                tracing::warn!(device = %candidate, "default output failed, using fallback device");
                return Ok(stream);
            }
        }

        Err::<OutputStream, _>(default_err).context("unable to start any audio output stream")
    })?;
    stream.log_on_drop(false);
    Ok(stream)
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Backend for `--mute` and for machines without an output device. Handles keep
/// a logical clock so natural ends still happen for sources with a known length.
#[derive(Debug, Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for NullBackend {
    fn open_handle(&self) -> Box<dyn AudioHandle> {
        Box::new(NullHandle::new())
    }

    fn output_name(&self) -> String {
        String::from("Null audio output")
    }
}

#[derive(Debug, Default)]
pub struct NullHandle {
    loaded: Option<String>,
    playing: bool,
    paused: bool,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
}

impl NullHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn estimate_duration(bytes: Vec<u8>) -> Option<Duration> {
        let source = Decoder::new(Cursor::new(bytes)).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.playing
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl AudioHandle for NullHandle {
    fn load(&mut self, source: &MediaSource) -> Result<(), MediaError> {
        self.stop();
        let bytes = source.read_bytes()?;
        self.track_duration = Self::estimate_duration(bytes);
        self.loaded = Some(source.label());
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.loaded.is_none() {
            return Err(MediaError::NotLoaded);
        }
        if !self.paused || self.is_finished() {
            self.position_offset = Duration::ZERO;
        }
        self.playing = true;
        self.paused = false;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_finished(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        self.playing && !self.paused && self.current_position() >= duration
    }

    fn set_volume(&mut self, _volume: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn null_handle_requires_loaded_media() {
        let mut handle = NullHandle::new();
        assert!(matches!(handle.play(), Err(MediaError::NotLoaded)));
    }

    #[test]
    fn null_handle_reports_missing_files() {
        let mut handle = NullHandle::new();
        let err = handle
            .load(&MediaSource::File(PathBuf::from("definitely-missing.wav")))
            .expect_err("missing file must fail");
        assert!(matches!(err, MediaError::Io { .. }));
    }

    #[test]
    fn null_handle_finishes_fallback_tone() {
        let mut handle = NullHandle::new();
        handle.load(&fallback_tone()).expect("fallback loads");
        handle.play().expect("fallback plays");
        assert!(!handle.is_finished());

        thread::sleep(Duration::from_millis(500));
        assert!(handle.is_finished(), "known-duration clip should finish");
    }

    #[test]
    fn null_handle_pause_freezes_clock() {
        let mut handle = NullHandle::new();
        handle.load(&fallback_tone()).expect("fallback loads");
        handle.play().expect("fallback plays");
        handle.pause();
        assert!(handle.is_paused());

        thread::sleep(Duration::from_millis(500));
        assert!(!handle.is_finished(), "paused clip must not finish");

        handle.stop();
        assert!(!handle.is_paused());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{AudioBackend, AudioHandle, MediaError, MediaSource};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    /// Shared knobs and journal for every handle a [`ScriptedBackend`] opens.
    /// Failures and natural ends are keyed by the loaded source label.
    #[derive(Debug, Default)]
    pub(crate) struct Script {
        pub failing_loads: HashSet<String>,
        pub failing_plays: HashSet<String>,
        pub finished: HashSet<String>,
        pub loads: Vec<String>,
        pub plays: Vec<String>,
        pub pauses: usize,
        pub stops: usize,
    }

    pub(crate) type SharedScript = Rc<RefCell<Script>>;

    pub(crate) struct ScriptedHandle {
        script: SharedScript,
        current: Option<String>,
        playing: bool,
        paused: bool,
    }

    impl ScriptedHandle {
        pub(crate) fn new(script: SharedScript) -> Self {
            Self {
                script,
                current: None,
                playing: false,
                paused: false,
            }
        }
    }

    impl AudioHandle for ScriptedHandle {
        fn load(&mut self, source: &MediaSource) -> Result<(), MediaError> {
            let label = source.label();
            let mut script = self.script.borrow_mut();
            script.loads.push(label.clone());
            self.playing = false;
            self.paused = false;
            if script.failing_loads.contains(&label) {
                self.current = None;
                return Err(MediaError::Decode {
                    label,
                    reason: String::from("scripted load failure"),
                });
            }
            self.current = Some(label);
            Ok(())
        }

        fn play(&mut self) -> Result<(), MediaError> {
            let label = self.current.clone().ok_or(MediaError::NotLoaded)?;
            let mut script = self.script.borrow_mut();
            script.plays.push(label.clone());
            if script.failing_plays.contains(&label) {
                return Err(MediaError::Decode {
                    label,
                    reason: String::from("scripted play failure"),
                });
            }
            self.playing = true;
            self.paused = false;
            Ok(())
        }

        fn pause(&mut self) {
            self.paused = true;
            self.script.borrow_mut().pauses += 1;
        }

        fn stop(&mut self) {
            self.playing = false;
            self.paused = false;
            self.script.borrow_mut().stops += 1;
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn is_finished(&self) -> bool {
            self.playing
                && !self.paused
                && self
                    .current
                    .as_ref()
                    .is_some_and(|label| self.script.borrow().finished.contains(label))
        }

        fn set_volume(&mut self, _volume: f32) {}
    }

    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        pub script: SharedScript,
    }

    impl AudioBackend for ScriptedBackend {
        fn open_handle(&self) -> Box<dyn AudioHandle> {
            Box::new(ScriptedHandle::new(Rc::clone(&self.script)))
        }

        fn output_name(&self) -> String {
            String::from("scripted")
        }
    }
}
