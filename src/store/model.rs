use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::RepeatMode;

/// The persisted mirror of the session. A single record, not a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSession {
    pub folder: Option<String>,
    pub current_track: Option<String>,
    pub position_ms: u64,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub playback_speed: f32,
}

impl Default for PersistedSession {
    fn default() -> Self {
        Self {
            folder: None,
            current_track: None,
            position_ms: 0,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::Off,
            playback_speed: 1.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode session: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("failed to decode session at {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Durable storage for a single [`PersistedSession`].
pub trait SessionStore: Send {
    /// The stored session, or `None` when nothing was saved yet.
    fn read(&self) -> Result<Option<PersistedSession>, StoreError>;
    fn write(&mut self, session: &PersistedSession) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}
