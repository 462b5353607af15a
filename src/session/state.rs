use crate::audio::RepeatMode;
use crate::library::{FolderSource, Track};

pub const NO_AUDIO_IN_FOLDER: &str = "No audio files found in selected folder.";
pub const NO_AUDIO_IN_SAVED_FOLDER: &str =
    "We couldn't find audio in the saved folder. Please choose another folder.";

/// Snapshot of the playlist and transport, published after every change.
///
/// `current_index` is `None` or a valid index into `tracks`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistState {
    pub folder: Option<FolderSource>,
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub current_position_ms: u64,
    pub buffered_position_ms: u64,
    pub duration_ms: u64,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub playback_speed: f32,
}

impl Default for PlaylistState {
    fn default() -> Self {
        Self {
            folder: None,
            tracks: Vec::new(),
            current_index: None,
            is_playing: false,
            is_loading: false,
            error_message: None,
            current_position_ms: 0,
            buffered_position_ms: 0,
            duration_ms: 0,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::Off,
            playback_speed: 1.0,
        }
    }
}

impl PlaylistState {
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.tracks.get(i))
    }
}
