//! Audio cues for incoming notifications.
//!
//! Cue files are loaded once per priority key. If a priority-specific file
//! fails to load the generic cue stands in for it; if nothing loads, sound is
//! simply unavailable. Playback never errors out to the caller and never
//! stacks: a cue that is still playing is not started again.
//!
//! The audio device sits behind [`AudioBackend`]. With the `audio` feature the
//! [`RodioAudio`] backend plays through the default output device; otherwise
//! [`NullAudio`] reports audio as unavailable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alertdesk_config::SoundConfig;
use alertdesk_core::Priority;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Audio failures. Logged, never propagated past the sound manager.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("failed to load cue {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("playback failed: {0}")]
    Playback(String),
}

/// Cue slots, one per priority tier plus the generic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKey {
    Critical,
    High,
    Normal,
    Generic,
}

impl CueKey {
    pub fn for_priority(priority: Option<Priority>) -> Self {
        match priority {
            Some(Priority::P0) => CueKey::Critical,
            Some(Priority::P1) => CueKey::High,
            Some(Priority::P2 | Priority::P3) | None => CueKey::Normal,
        }
    }
}

/// Audio output device.
pub trait AudioBackend {
    /// Whether an output device could be opened.
    fn is_available(&self) -> bool;

    /// Decode and keep a cue under `key`.
    fn load(&mut self, key: CueKey, path: &Path, volume: f32) -> Result<(), AudioError>;

    /// Start playing a loaded cue without blocking.
    fn play(&mut self, key: CueKey) -> Result<(), AudioError>;

    /// Whether the cue under `key` is still playing.
    fn is_playing(&self, key: CueKey) -> bool;
}

/// Backend used when no audio device is compiled in.
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn is_available(&self) -> bool {
        false
    }

    fn load(&mut self, _key: CueKey, _path: &Path, _volume: f32) -> Result<(), AudioError> {
        Err(AudioError::Unavailable("built without audio support".into()))
    }

    fn play(&mut self, _key: CueKey) -> Result<(), AudioError> {
        Err(AudioError::Unavailable("built without audio support".into()))
    }

    fn is_playing(&self, _key: CueKey) -> bool {
        false
    }
}

/// Outcome of a play request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played(CueKey),
    Disabled,
    Unavailable,
    AlreadyPlaying,
    NoCue,
    Failed,
}

pub struct SoundManager {
    backend: Box<dyn AudioBackend>,
    config: SoundConfig,
    enabled: bool,
    /// Priority slot -> slot whose audio actually loaded
    cues: HashMap<CueKey, CueKey>,
    preloaded: bool,
}

impl std::fmt::Debug for SoundManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundManager")
            .field("enabled", &self.enabled)
            .field("cues", &self.cues)
            .finish_non_exhaustive()
    }
}

impl SoundManager {
    pub fn new(config: SoundConfig, backend: Box<dyn AudioBackend>) -> Self {
        Self {
            enabled: config.enabled,
            backend,
            config,
            cues: HashMap::new(),
            preloaded: false,
        }
    }

    /// Manager backed by the default device for this build.
    pub fn with_default_backend(config: SoundConfig) -> Self {
        Self::new(config, default_backend())
    }

    /// Load all cue files. Safe to call more than once.
    pub fn preload(&mut self) {
        if self.preloaded {
            return;
        }
        self.preloaded = true;

        if !self.backend.is_available() {
            info!("audio output unavailable, notification sounds disabled");
            return;
        }

        let generic_path = self.config.cue_path(&self.config.generic);
        let generic = match self
            .backend
            .load(CueKey::Generic, &generic_path, self.config.generic.volume)
        {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "generic cue not loaded");
                false
            }
        };
        if generic {
            self.cues.insert(CueKey::Generic, CueKey::Generic);
        }

        let slots = [
            (CueKey::Critical, Some(Priority::P0)),
            (CueKey::High, Some(Priority::P1)),
            (CueKey::Normal, None),
        ];
        for (key, priority) in slots {
            let cue = self.config.cue_for(priority);
            let path = self.config.cue_path(cue);
            match self.backend.load(key, &path, cue.volume) {
                Ok(()) => {
                    self.cues.insert(key, key);
                }
                Err(e) if generic => {
                    warn!(error = %e, ?key, "cue failed to load, using generic sound");
                    self.cues.insert(key, CueKey::Generic);
                }
                Err(e) => warn!(error = %e, ?key, "cue failed to load"),
            }
        }

        if self.cues.is_empty() {
            warn!("no notification sounds could be loaded");
        } else {
            debug!(loaded = self.cues.len(), "notification sounds loaded");
        }
    }

    /// Play the cue for a priority tier.
    pub fn play_notification_sound(&mut self, priority: Option<Priority>) -> PlayOutcome {
        if !self.enabled {
            return PlayOutcome::Disabled;
        }
        if !self.backend.is_available() {
            return PlayOutcome::Unavailable;
        }

        let requested = CueKey::for_priority(priority);
        let Some(&cue) = self.cues.get(&requested) else {
            debug!(?requested, "no cue loaded");
            return PlayOutcome::NoCue;
        };
        if self.backend.is_playing(cue) {
            return PlayOutcome::AlreadyPlaying;
        }

        match self.backend.play(cue) {
            Ok(()) => PlayOutcome::Played(cue),
            Err(e) => {
                warn!(error = %e, ?cue, "notification sound failed");
                PlayOutcome::Failed
            }
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(enabled, "notification sounds toggled");
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available() && !self.cues.is_empty()
    }
}

/// Default backend for this build.
pub fn default_backend() -> Box<dyn AudioBackend> {
    #[cfg(feature = "audio")]
    {
        match RodioAudio::open() {
            Ok(backend) => return Box::new(backend),
            Err(e) => warn!(error = %e, "falling back to silent audio"),
        }
    }
    Box::new(NullAudio)
}

#[cfg(feature = "audio")]
pub use rodio_backend::RodioAudio;

#[cfg(feature = "audio")]
mod rodio_backend {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use super::{AudioBackend, AudioError, CueKey};

    struct Cue {
        bytes: Arc<[u8]>,
        volume: f32,
        sink: Option<Sink>,
    }

    /// Plays cues on the default output device.
    pub struct RodioAudio {
        // Dropping the stream stops all output.
        _stream: OutputStream,
        handle: OutputStreamHandle,
        cues: HashMap<CueKey, Cue>,
    }

    impl RodioAudio {
        pub fn open() -> Result<Self, AudioError> {
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| AudioError::Unavailable(e.to_string()))?;
            Ok(Self {
                _stream: stream,
                handle,
                cues: HashMap::new(),
            })
        }
    }

    impl AudioBackend for RodioAudio {
        fn is_available(&self) -> bool {
            true
        }

        fn load(&mut self, key: CueKey, path: &Path, volume: f32) -> Result<(), AudioError> {
            let load_err = |message: String| AudioError::Load {
                path: path.to_path_buf(),
                message,
            };
            let bytes: Arc<[u8]> = std::fs::read(path)
                .map_err(|e| load_err(e.to_string()))?
                .into();
            // Decode once up front so broken files fail here, not on play.
            Decoder::new(Cursor::new(Arc::clone(&bytes))).map_err(|e| load_err(e.to_string()))?;

            self.cues.insert(
                key,
                Cue {
                    bytes,
                    volume,
                    sink: None,
                },
            );
            Ok(())
        }

        fn play(&mut self, key: CueKey) -> Result<(), AudioError> {
            let cue = self
                .cues
                .get_mut(&key)
                .ok_or_else(|| AudioError::Playback(format!("{key:?} cue not loaded")))?;
            let source = Decoder::new(Cursor::new(Arc::clone(&cue.bytes)))
                .map_err(|e| AudioError::Playback(e.to_string()))?;
            let sink =
                Sink::try_new(&self.handle).map_err(|e| AudioError::Playback(e.to_string()))?;
            sink.set_volume(cue.volume);
            sink.append(source);
            cue.sink = Some(sink);
            Ok(())
        }

        fn is_playing(&self, key: CueKey) -> bool {
            self.cues
                .get(&key)
                .and_then(|cue| cue.sink.as_ref())
                .is_some_and(|sink| !sink.empty())
        }
    }
}
