// HLS manifest parsing: extracts the ordered segment list and rendition
// markers from playlist text. Fetching lives in the transport layer.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use crate::detect::{ends_with_ignore_case, strip_query};
use crate::error::{EngineError, Result};

/// Suffixes that mark a line as a media segment reference.
pub const SEGMENT_EXTENSIONS: &[&str] = &[".ts", ".m4s"];

/// Suffixes that mark a reference as another manifest. A "segment" with one
/// of these suffixes means a master/variant playlist was selected where a
/// media playlist was required.
pub const MANIFEST_EXTENSIONS: &[&str] = &[".m3u8", ".mpd"];

/// The outcome of parsing one manifest document. Immutable after
/// construction; segment order is playback order and is preserved through
/// the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedManifest {
    /// Inline segment references, in encounter order, fully resolved.
    pub segments: Vec<String>,
    /// Audio rendition segments, populated by the caller after parsing the
    /// audio sub-manifest. Empty for single-rendition manifests.
    pub audio_segments: Vec<String>,
    /// Video rendition segments, populated like `audio_segments`.
    pub video_segments: Vec<String>,
    /// Whether an `#EXT-X-MEDIA` audio rendition was declared.
    pub has_audio_track: bool,
    /// Whether an `#EXT-X-STREAM-INF` variant was declared.
    pub has_video_track: bool,
    /// Resolved URL of the audio rendition sub-manifest, when declared.
    pub audio_playlist_url: Option<String>,
    /// Resolved URL of the first variant's sub-manifest, when declared.
    pub video_playlist_url: Option<String>,
    /// Sum of `#EXTINF` durations in seconds. Informational only; never
    /// affects ordering or the error path.
    pub total_duration: f64,
}

impl ParsedManifest {
    /// True when the manifest declares separated audio/video renditions that
    /// must be fetched through their own sub-manifests.
    pub fn has_separated_renditions(&self) -> bool {
        self.audio_playlist_url.is_some() || self.video_playlist_url.is_some()
    }
}

/// Returns true when the URL's path (query and fragment ignored) ends in one
/// of the given suffixes.
pub fn path_has_extension(url: &str, extensions: &[&str]) -> bool {
    let path = strip_query(url);
    extensions
        .iter()
        .any(|ext| ends_with_ignore_case(path, ext))
}

/// Walks the manifest line by line, resolving relative references against the
/// manifest URL truncated at its last `/`.
pub fn parse_manifest(text: &str, manifest_url: &str) -> Result<ParsedManifest> {
    let url = Url::parse(manifest_url)
        .map_err(|e| EngineError::invalid_url(manifest_url, e.to_string()))?;
    // `join(".")` drops everything after the last `/` in the path.
    let base = url
        .join(".")
        .map_err(|e| EngineError::invalid_url(manifest_url, e.to_string()))?;

    let resolve = |reference: &str| -> Result<String> {
        base.join(reference)
            .map(|u| u.to_string())
            .map_err(|e| {
                EngineError::invalid_manifest(format!(
                    "cannot resolve `{reference}` against `{base}`: {e}"
                ))
            })
    };

    let mut manifest = ParsedManifest::default();
    let mut expecting_variant_uri = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let duration = rest.split(',').next().unwrap_or(rest).trim();
            if let Ok(seconds) = duration.parse::<f64>() {
                manifest.total_duration += seconds;
            }
            continue;
        }

        if line.starts_with("#EXT-X-MEDIA:") {
            if line.contains("TYPE=AUDIO") {
                manifest.has_audio_track = true;
                if manifest.audio_playlist_url.is_none()
                    && let Some(uri) = quoted_attribute(line, "URI")
                {
                    manifest.audio_playlist_url = Some(resolve(uri)?);
                }
            }
            continue;
        }

        if line.starts_with("#EXT-X-STREAM-INF:") {
            manifest.has_video_track = true;
            expecting_variant_uri = true;
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        // Non-comment line. A line after `#EXT-X-STREAM-INF:` is a variant
        // sub-manifest URI, never a segment.
        if expecting_variant_uri {
            expecting_variant_uri = false;
            if manifest.video_playlist_url.is_none() {
                manifest.video_playlist_url = Some(resolve(line)?);
            }
            continue;
        }

        if path_has_extension(line, SEGMENT_EXTENSIONS) {
            let resolved = resolve(line)?;
            trace!(segment = %resolved, "segment reference");
            manifest.segments.push(resolved);
        }
    }

    debug!(
        url = manifest_url,
        segments = manifest.segments.len(),
        audio = manifest.has_audio_track,
        video = manifest.has_video_track,
        duration = manifest.total_duration,
        "parsed manifest"
    );
    Ok(manifest)
}

/// Validates a segment list before download. Zero segments means the
/// manifest yielded nothing usable; a manifest-extension entry means a
/// master/variant playlist was selected where a media playlist was
/// required. Both are usage errors, never retried and never fetched.
pub fn ensure_segment_list(segments: &[String], context_url: &str) -> Result<()> {
    if segments.is_empty() {
        return Err(EngineError::invalid_manifest(format!(
            "{context_url} yielded no media segments"
        )));
    }
    if let Some(entry) = segments
        .iter()
        .find(|s| path_has_extension(s, MANIFEST_EXTENSIONS))
    {
        return Err(EngineError::invalid_manifest(format!(
            "{context_url} is a master/variant playlist (`{entry}` is a manifest, not a segment); select a media playlist instead"
        )));
    }
    Ok(())
}

fn quoted_attribute<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("{name}=\"");
    let start = line.find(&marker)? + marker.len();
    let end = line[start..].find('"')? + start;
    Some(&line[start..end])
}
