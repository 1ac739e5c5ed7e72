use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Hard cap on segment download concurrency. Unbounded parallel fetch against
/// a single origin trips server-side rate limiting and per-host connection
/// limits, so requested values above this are clamped with a warning.
pub const MAX_DOWNLOAD_CONCURRENCY: usize = 16;

/// HTTP client configuration shared by manifest and segment fetches.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent string
    pub user_agent: String,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Per-request timeout for manifest fetches
    pub manifest_fetch_timeout: Duration,

    /// Per-request timeout for segment fetches. A single stalled connection
    /// must not hang the whole job; there is no job-level timeout.
    pub segment_fetch_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: Duration::from_secs(30),
            manifest_fetch_timeout: Duration::from_secs(15),
            segment_fetch_timeout: Duration::from_secs(30),
            follow_redirects: true,
        }
    }
}

/// Download job configuration.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Default concurrent segment downloads when the caller does not choose.
    /// Kept small on purpose: large playlists are still practical, while a
    /// single origin is never hammered.
    pub default_concurrency: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 3,
        }
    }
}

/// Stream detector configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// MP4 URLs shorter than this are discarded as thumbnail/ad noise.
    /// Real media URLs carry long CDN paths and signing parameters.
    pub min_mp4_url_len: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_mp4_url_len: 80,
        }
    }
}

/// Top-level engine configuration, constructed once at process start and
/// handed to the components that need it.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub http: HttpConfig,
    pub download: DownloadConfig,
    pub detector: DetectorConfig,
}
