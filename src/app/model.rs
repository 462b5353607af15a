//! Application view model: `App` and `InputMode`.
//!
//! The session owns the playlist; `App` only keeps what the terminal view
//! needs on top of the latest snapshot: the cursor, the follow flag, the
//! folder prompt and the metadata popup.

use std::path::PathBuf;
use std::sync::Arc;

use crate::library::{FolderSource, Track};
use crate::session::PlaylistState;

/// What key presses currently drive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing a folder path.
    FolderPrompt,
}

/// The main view model.
pub struct App {
    pub snapshot: Arc<PlaylistState>,
    pub selected: usize,
    pub follow_playback: bool,
    pub input_mode: InputMode,
    pub folder_input: String,
    pub metadata_window: bool,
}

impl App {
    pub fn new(snapshot: Arc<PlaylistState>, follow_playback: bool) -> Self {
        let mut app = Self {
            snapshot: Arc::new(PlaylistState::default()),
            selected: 0,
            follow_playback,
            input_mode: InputMode::Normal,
            folder_input: String::new(),
            metadata_window: false,
        };
        app.apply_snapshot(snapshot);
        app
    }

    pub fn tracks(&self) -> &[Track] {
        &self.snapshot.tracks
    }

    pub fn has_tracks(&self) -> bool {
        !self.snapshot.tracks.is_empty()
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.snapshot.tracks.get(self.selected)
    }

    /// Install a newer snapshot. Keeps the cursor in range and moves it to
    /// the current track while following playback.
    pub fn apply_snapshot(&mut self, snapshot: Arc<PlaylistState>) {
        let folder_changed = self.snapshot.folder != snapshot.folder
            || self.snapshot.tracks.len() != snapshot.tracks.len();
        self.snapshot = snapshot;

        let len = self.snapshot.tracks.len();
        if len == 0 {
            self.selected = 0;
            self.metadata_window = false;
            return;
        }
        if self.selected >= len {
            self.selected = len - 1;
        }

        if let Some(current) = self.snapshot.current_index {
            if self.follow_playback || folder_changed {
                self.selected = current;
            }
        }
    }

    /// Enable following playback (cursor follows currently playing track).
    pub fn follow_playback_on(&mut self) {
        self.follow_playback = true;
        if let Some(current) = self.snapshot.current_index {
            self.selected = current;
        }
    }

    pub fn follow_playback_off(&mut self) {
        self.follow_playback = false;
    }

    /// Move selection to the next track, wrapping to the first.
    pub fn next(&mut self) {
        let len = self.snapshot.tracks.len();
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    /// Move selection to the previous track, wrapping to the last.
    pub fn prev(&mut self) {
        let len = self.snapshot.tracks.len();
        if len > 0 {
            self.selected = (self.selected + len - 1) % len;
        }
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.snapshot.tracks.len().saturating_sub(1);
    }

    pub fn toggle_metadata_window(&mut self) {
        self.metadata_window = !self.metadata_window;
    }

    /// Start typing a folder path, prefilled with the current folder.
    pub fn open_folder_prompt(&mut self) {
        self.input_mode = InputMode::FolderPrompt;
        self.folder_input = self
            .snapshot
            .folder
            .as_ref()
            .map(|f| f.path().display().to_string())
            .unwrap_or_default();
    }

    pub fn cancel_folder_prompt(&mut self) {
        self.input_mode = InputMode::Normal;
        self.folder_input.clear();
    }

    pub fn push_folder_char(&mut self, c: char) {
        self.folder_input.push(c);
    }

    pub fn pop_folder_char(&mut self) {
        self.folder_input.pop();
    }

    /// Leave the prompt, returning the typed folder when it is not blank.
    /// A leading `~/` expands to `$HOME`.
    pub fn submit_folder_prompt(&mut self) -> Option<FolderSource> {
        self.input_mode = InputMode::Normal;
        let input = std::mem::take(&mut self.folder_input);
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let path = match (input.strip_prefix("~/"), std::env::var_os("HOME")) {
            (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
            _ => PathBuf::from(input),
        };
        Some(FolderSource::new(path))
    }
}
