//! Audio-related small types.
//!
//! Repeat mode, engine events, the internal sink commands and the engine
//! error type.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    #[serde(alias = "no-loop", alias = "no_loop")]
    Off,
    /// Wrap around to the start of the queue.
    #[serde(alias = "loop-all", alias = "loop_all")]
    All,
    /// Repeat the current track when it ends.
    #[serde(alias = "repeat-one", alias = "loop-one", alias = "loop_one")]
    One,
}

impl RepeatMode {
    /// `Off -> All -> One -> Off`.
    pub fn cycled(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }
}

/// Signals emitted by a [`PlaybackEngine`](super::PlaybackEngine).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The current queue item changed (seek to another item or auto-advance).
    ItemTransitioned,
    IsPlayingChanged(bool),
    /// The last item finished and nothing follows it.
    PlaybackEnded,
    SpeedChanged(f32),
    ShuffleChanged(bool),
    RepeatChanged(RepeatMode),
}

/// Receives engine events. Called from whichever thread produced the event.
pub type EventSink = Box<dyn Fn(EngineEvent) + Send>;

/// Commands understood by the audio thread.
#[derive(Debug)]
pub(crate) enum SinkCmd {
    /// Replace the current sink with `path`, starting at `start_ms`.
    Load {
        path: PathBuf,
        start_ms: u64,
        play: bool,
    },
    Play,
    Pause,
    /// Drop the current sink; the next `Play` reloads the current item.
    Stop,
    /// Seek within the loaded item.
    Seek(u64),
    SetSpeed(f32),
    /// Quit the audio thread, fading out over `fade_out_ms` milliseconds.
    Quit { fade_out_ms: u64 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no audio output device: {0}")]
    NoOutputDevice(String),
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("audio thread exited during startup")]
    ThreadGone,
}
