// Stream detector: passive classification of observed network requests,
// scoped per browsing tab.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::DetectorConfig;

/// Identifier of the browsing tab that issued a request.
pub type TabId = u64;

/// Stream family recognized from a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Hls,
    Mp4,
    Dash,
    Unknown,
}

impl StreamKind {
    /// Classifies a URL by its path suffix. Query string and fragment are
    /// ignored for the check.
    pub fn classify(url: &str) -> Self {
        let path = strip_query(url);
        if ends_with_ignore_case(path, ".m3u8") {
            Self::Hls
        } else if ends_with_ignore_case(path, ".mpd") {
            Self::Dash
        } else if ends_with_ignore_case(path, ".mp4") || ends_with_ignore_case(path, ".m4v") {
            Self::Mp4
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Hls => "hls",
            Self::Mp4 => "mp4",
            Self::Dash => "dash",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

pub(crate) fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

pub(crate) fn ends_with_ignore_case(path: &str, suffix: &str) -> bool {
    // Byte comparison: slicing the str would panic when the boundary lands
    // inside a multi-byte character, and these suffixes are ASCII anyway.
    let (path, suffix) = (path.as_bytes(), suffix.as_bytes());
    path.len() >= suffix.len() && path[path.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// One candidate stream sighted in a tab's network traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedStream {
    pub url: String,
    pub kind: StreamKind,
    pub owner_tab: TabId,
    pub detected_at: DateTime<Utc>,
}

/// Observes outbound requests and keeps one deduplicated candidate list per
/// tab. Best effort: no retries and no ordering guarantee across requests.
///
/// The per-tab map is the only shared mutable state outside a download job.
/// It is mutated from exactly two event types (request observed, tab closed),
/// so a plain mutex around the map is the whole locking discipline.
pub struct StreamDetector {
    config: DetectorConfig,
    by_tab: Mutex<HashMap<TabId, Vec<DetectedStream>>>,
}

impl StreamDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            by_tab: Mutex::new(HashMap::new()),
        }
    }

    /// Feeds one observed network request into the detector.
    ///
    /// Requests with no owning tab are browser-internal and ignored. Short
    /// MP4 URLs are discarded as thumbnail/ad noise. An entry already present
    /// for `(owner_tab, url)` is never duplicated.
    pub fn on_request_observed(&self, url: &str, owner_tab: Option<TabId>) {
        let Some(owner_tab) = owner_tab else {
            trace!(url, "ignoring request with no owning tab");
            return;
        };

        let kind = StreamKind::classify(url);
        match kind {
            StreamKind::Unknown => return,
            StreamKind::Mp4 if url.len() < self.config.min_mp4_url_len => {
                trace!(url, "ignoring short mp4 URL");
                return;
            }
            _ => {}
        }

        let mut by_tab = self.by_tab.lock();
        let entries = by_tab.entry(owner_tab).or_default();
        if entries.iter().any(|s| s.url == url) {
            return;
        }

        debug!(url, %kind, tab = owner_tab, "detected stream");
        entries.push(DetectedStream {
            url: url.to_owned(),
            kind,
            owner_tab,
            detected_at: Utc::now(),
        });
    }

    /// Candidate streams sighted so far for one tab, in detection order.
    pub fn streams_for(&self, tab: TabId) -> Vec<DetectedStream> {
        self.by_tab.lock().get(&tab).cloned().unwrap_or_default()
    }

    /// Evicts a closed tab's entries. Stale entries are never collected
    /// implicitly, so wiring this to tab-removal notifications is a
    /// correctness requirement for long-lived processes.
    pub fn on_tab_closed(&self, tab: TabId) {
        if self.by_tab.lock().remove(&tab).is_some() {
            debug!(tab, "cleared detected streams for closed tab");
        }
    }

    /// Number of tabs currently holding detections.
    pub fn tab_count(&self) -> usize {
        self.by_tab.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> StreamDetector {
        StreamDetector::new(DetectorConfig::default())
    }

    const LONG_MP4: &str = "https://cdn.example/media/very/long/path/segmented/asset-1234567890/video-stream-main-720p.mp4";

    #[test]
    fn classifies_by_path_suffix_ignoring_query() {
        assert_eq!(
            StreamKind::classify("https://cdn.example/live/index.m3u8?token=abc"),
            StreamKind::Hls
        );
        assert_eq!(
            StreamKind::classify("https://cdn.example/vod/manifest.MPD"),
            StreamKind::Dash
        );
        assert_eq!(StreamKind::classify(LONG_MP4), StreamKind::Mp4);
        assert_eq!(
            StreamKind::classify("https://cdn.example/page.html"),
            StreamKind::Unknown
        );
    }

    #[test]
    fn classifies_non_ascii_urls_without_panicking() {
        assert_eq!(
            StreamKind::classify("https://cdn.example/vidéo/séé"),
            StreamKind::Unknown
        );
        assert_eq!(
            StreamKind::classify("https://cdn.example/vidéo/liste.m3u8"),
            StreamKind::Hls
        );
    }

    #[test]
    fn ignores_requests_without_owner_tab() {
        let d = detector();
        d.on_request_observed("https://cdn.example/live/index.m3u8", None);
        assert_eq!(d.tab_count(), 0);
    }

    #[test]
    fn ignores_unknown_urls() {
        let d = detector();
        d.on_request_observed("https://cdn.example/app.js", Some(1));
        assert!(d.streams_for(1).is_empty());
    }

    #[test]
    fn ignores_short_mp4_urls() {
        let d = detector();
        d.on_request_observed("https://cdn.example/thumb.mp4", Some(1));
        assert!(d.streams_for(1).is_empty());

        d.on_request_observed(LONG_MP4, Some(1));
        assert_eq!(d.streams_for(1).len(), 1);
    }

    #[test]
    fn dedups_same_url_within_a_tab() {
        let d = detector();
        d.on_request_observed("https://cdn.example/live/index.m3u8", Some(1));
        d.on_request_observed("https://cdn.example/live/index.m3u8", Some(1));
        assert_eq!(d.streams_for(1).len(), 1);
    }

    #[test]
    fn same_url_in_two_tabs_yields_two_entries() {
        let d = detector();
        d.on_request_observed("https://cdn.example/live/index.m3u8", Some(1));
        d.on_request_observed("https://cdn.example/live/index.m3u8", Some(2));
        assert_eq!(d.streams_for(1).len(), 1);
        assert_eq!(d.streams_for(2).len(), 1);
    }

    #[test]
    fn closing_a_tab_removes_only_its_entries() {
        let d = detector();
        d.on_request_observed("https://cdn.example/live/index.m3u8", Some(1));
        d.on_request_observed("https://cdn.example/live/other.m3u8", Some(2));

        d.on_tab_closed(1);

        assert!(d.streams_for(1).is_empty());
        assert_eq!(d.streams_for(2).len(), 1);
        assert_eq!(d.tab_count(), 1);
    }

    #[test]
    fn preserves_detection_order_within_a_tab() {
        let d = detector();
        d.on_request_observed("https://cdn.example/a.m3u8", Some(7));
        d.on_request_observed("https://cdn.example/b.m3u8", Some(7));
        let streams = d.streams_for(7);
        assert_eq!(streams[0].url, "https://cdn.example/a.m3u8");
        assert_eq!(streams[1].url, "https://cdn.example/b.m3u8");
    }
}
