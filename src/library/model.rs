use std::fmt;
use std::path::{Path, PathBuf};

/// Handle to a user-chosen directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderSource(PathBuf);

impl FolderSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// String form recorded in the persisted session.
    pub fn as_persisted(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl fmt::Display for FolderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Handle to a single playable file. Compared by its persisted string when
/// matching a restored session against a fresh scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackSource(PathBuf);

impl TrackSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn as_persisted(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub source: TrackSource,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
    pub file_size_bytes: Option<u64>,
    /// List label built from the configured display fields.
    pub display: String,
}

impl Track {
    /// Secondary line for now-playing surfaces: "artist • album", or
    /// whichever of the two is known.
    pub fn subtitle(&self) -> Option<String> {
        match (self.artist.as_deref(), self.album.as_deref()) {
            (Some(artist), Some(album)) => Some(format!("{artist} • {album}")),
            (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
            (None, None) => None,
        }
    }
}
