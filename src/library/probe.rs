use std::path::Path;

use lofty::prelude::*;

/// Tags read from a file's content. Every field is optional; blank values
/// are dropped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProbedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
}

fn clean(value: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Best-effort metadata probe. `None` means the file could not be parsed.
pub fn probe_tags(path: &Path) -> Option<ProbedTags> {
    let tagged = match lofty::read_from_path(path) {
        Ok(t) => t,
        Err(err) => {
            tracing::trace!(path = %path.display(), error = %err, "no readable tags");
            return None;
        }
    };

    let duration = tagged.properties().duration();
    let mut tags = ProbedTags {
        duration_ms: (!duration.is_zero()).then(|| duration.as_millis() as u64),
        ..ProbedTags::default()
    };

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        tags.title = clean(tag.title());
        tags.artist = clean(tag.artist());
        tags.album = clean(tag.album());
    }

    Some(tags)
}
