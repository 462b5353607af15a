use crate::audio::EngineEvent;
use crate::library::{FolderSource, Track};
use crate::store::PersistedSession;

/// User-facing commands, from the TUI or the media-control bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ChooseFolder(FolderSource),
    TogglePlayPause,
    Play,
    Pause,
    Next,
    Previous,
    Stop,
    SelectTrack { index: usize, play: bool },
    /// Absolute position in the current track.
    Seek(i64),
    /// Relative to the current position.
    SeekBy(i64),
    ToggleShuffle,
    CycleRepeatMode,
    CyclePlaybackSpeed,
}

/// Everything the coordinator thread consumes, in arrival order.
#[derive(Debug)]
pub enum Msg {
    Intent(Intent),
    Scanned(ScanResult),
    Engine(EngineEvent),
    Tick,
    Shutdown,
}

#[derive(Debug)]
pub struct ScanResult {
    pub generation: u64,
    pub folder: FolderSource,
    pub tracks: Vec<Track>,
    /// Present when the scan was started to restore a saved session.
    pub restore: Option<PersistedSession>,
}
