use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::display::display_from_fields;
use super::model::{FolderSource, Track, TrackSource};
use super::probe::probe_tags;

fn normalized_extensions(settings: &LibrarySettings) -> Vec<String> {
    settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// A file counts as audio when its guessed MIME type is `audio/*`, or when
/// its extension is on the allow-list.
fn is_audio_file(path: &Path, exts: &[String], match_mime: bool) -> bool {
    if match_mime
        && mime_guess::from_path(path)
            .first_raw()
            .is_some_and(|mime| mime.starts_with("audio"))
    {
        return true;
    }

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn build_track(path: &Path, file_size_bytes: Option<u64>, settings: &LibrarySettings) -> Track {
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let tags = probe_tags(path).unwrap_or_default();
    let title = tags.title.unwrap_or(file_name);

    let display = display_from_fields(
        path,
        &title,
        tags.artist.as_deref(),
        tags.album.as_deref(),
        &settings.display_fields,
        &settings.display_separator,
    );

    Track {
        source: TrackSource::new(path),
        title,
        artist: tags.artist,
        album: tags.album,
        duration_ms: tags.duration_ms,
        file_size_bytes,
        display,
    }
}

/// Scan `folder` recursively and return its audio files sorted by title.
///
/// Never fails: a folder that is missing or unreadable yields an empty list,
/// and unreadable entries deeper in the tree only drop themselves.
pub fn scan(folder: &FolderSource, settings: &LibrarySettings) -> Vec<Track> {
    let root = folder.path();
    if !root.is_dir() {
        debug!(folder = %folder, "not a directory, nothing to scan");
        return Vec::new();
    }

    let exts = normalized_extensions(settings);
    let mut walker = WalkDir::new(root).follow_links(settings.follow_links);
    if let Some(d) = settings.max_depth {
        walker = walker.max_depth(d);
    }

    let mut tracks: Vec<Track> = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = 0usize;

    for entry in walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                skipped += 1;
                debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio_file(path, &exts, settings.match_mime) {
            continue;
        }

        // Links can reach one file under several paths.
        if settings.follow_links {
            let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            if !seen.insert(canonical) {
                continue;
            }
        }

        let file_size_bytes = entry.metadata().ok().map(|m| m.len());
        tracks.push(build_track(path, file_size_bytes, settings));
    }

    tracks.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.source.cmp(&b.source))
    });

    info!(folder = %folder, tracks = tracks.len(), skipped, "scan finished");
    tracks
}
