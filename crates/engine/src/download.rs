// Download coordinator: the caller-facing surface that ties manifest
// parsing, segment acquisition and assembly into one job.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::assemble::{assemble, content_type_for, write_artifact};
use crate::config::{EngineConfig, MAX_DOWNLOAD_CONCURRENCY};
use crate::detect::StreamKind;
use crate::error::{EngineError, Result};
use crate::fetch::{HttpFetcher, RemoteFetcher};
use crate::manifest::{ParsedManifest, ensure_segment_list};
use crate::pool;
use crate::transport::{TransportHandle, spawn_transport};

/// Phase reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    FetchingManifest,
    FetchingSegments,
    Assembling,
    Writing,
    Done,
}

impl std::fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::FetchingManifest => "fetching manifest",
            Self::FetchingSegments => "fetching segments",
            Self::Assembling => "assembling",
            Self::Writing => "writing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

pub type ProgressFn = Box<dyn FnMut(DownloadPhase, f64, String) + Send>;

/// Per-job options. The job is transient: it carries no state beyond one
/// `download` call.
pub struct DownloadOptions {
    /// Concurrent segment fetches. `None` uses the configured default.
    pub concurrency: Option<usize>,
    /// Output path for the assembled artifact.
    pub filename: PathBuf,
    /// Progress callback `(phase, percent, detail)`.
    pub on_progress: Option<ProgressFn>,
}

impl DownloadOptions {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            concurrency: None,
            filename: filename.into(),
            on_progress: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

/// What a successful job produced.
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub segment_count: usize,
    pub byte_len: usize,
    pub path: PathBuf,
}

/// One downloader per process is enough; it owns the transport to the
/// privileged fetch executor and is cheap to share.
pub struct Downloader {
    transport: TransportHandle,
    config: EngineConfig,
}

impl Downloader {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config.http.clone())?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Builds a downloader over a custom fetcher. Tests use this to run jobs
    /// against in-memory sources.
    pub fn with_fetcher(config: EngineConfig, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            transport: spawn_transport(fetcher),
            config,
        }
    }

    /// Fetches and parses a manifest without starting a download.
    pub async fn parse_manifest(&self, url: &str) -> Result<ParsedManifest> {
        self.transport.request_parse(url).await
    }

    /// Fetches a single segment body.
    pub async fn download_segment(&self, url: &str) -> Result<Bytes> {
        self.transport.request_segment(url).await
    }

    /// Runs one download job to completion: parse, validate, fetch all
    /// segments, assemble, write.
    ///
    /// Every failure is terminal for the job and no partial artifact is
    /// written; retrying is the caller's decision (re-invoke with the same
    /// arguments). For separated audio/video renditions the artifact is the
    /// audio buffers followed by the video buffers — plain concatenation,
    /// not muxing, and it may not play correctly in every player.
    pub async fn download(
        &self,
        manifest_url: &str,
        mut options: DownloadOptions,
    ) -> Result<DownloadSummary> {
        let concurrency = self.resolve_concurrency(options.concurrency)?;
        if StreamKind::classify(manifest_url) == StreamKind::Dash {
            return Err(EngineError::UnsupportedFormat {
                format: "dash".to_owned(),
            });
        }

        let mut progress = options.on_progress.take();
        let mut report = move |phase: DownloadPhase, percent: f64, detail: String| {
            if let Some(cb) = progress.as_mut() {
                cb(phase, percent, detail);
            }
        };

        report(DownloadPhase::FetchingManifest, 0.0, manifest_url.to_owned());
        let mut manifest = self.transport.request_parse(manifest_url).await?;

        let segment_urls = if manifest.segments.is_empty() && manifest.has_separated_renditions() {
            self.resolve_renditions(&mut manifest, manifest_url).await?
        } else {
            ensure_segment_list(&manifest.segments, manifest_url)?;
            manifest.segments.clone()
        };

        let total = segment_urls.len();
        info!(url = manifest_url, segments = total, concurrency, "starting download job");
        report(
            DownloadPhase::FetchingSegments,
            0.0,
            format!("0/{total} segments"),
        );

        let source: Arc<dyn pool::SegmentSource> = Arc::new(self.transport.clone());
        let buffers = pool::fetch_all(source, segment_urls.clone(), concurrency, |completed, total| {
            report(
                DownloadPhase::FetchingSegments,
                completed as f64 / total as f64 * 95.0,
                format!("{completed}/{total} segments"),
            );
        })
        .await?;

        report(DownloadPhase::Assembling, 97.0, format!("{total} segments"));
        let artifact = assemble(&buffers, content_type_for(&segment_urls[0]));

        report(
            DownloadPhase::Writing,
            99.0,
            options.filename.display().to_string(),
        );
        write_artifact(&artifact, &options.filename).await?;

        report(
            DownloadPhase::Done,
            100.0,
            options.filename.display().to_string(),
        );
        info!(
            path = %options.filename.display(),
            bytes = artifact.bytes.len(),
            "download job finished"
        );
        Ok(DownloadSummary {
            segment_count: total,
            byte_len: artifact.bytes.len(),
            path: options.filename,
        })
    }

    /// Resolves the audio/video sub-manifests of a master playlist into
    /// per-rendition segment lists and returns them audio-first, matching
    /// the assembly order.
    async fn resolve_renditions(
        &self,
        manifest: &mut ParsedManifest,
        manifest_url: &str,
    ) -> Result<Vec<String>> {
        if let Some(url) = manifest.audio_playlist_url.clone() {
            let rendition = self.transport.request_parse(&url).await?;
            ensure_segment_list(&rendition.segments, &url)?;
            manifest.audio_segments = rendition.segments;
        }
        if let Some(url) = manifest.video_playlist_url.clone() {
            let rendition = self.transport.request_parse(&url).await?;
            ensure_segment_list(&rendition.segments, &url)?;
            manifest.video_segments = rendition.segments;
        }

        let mut urls =
            Vec::with_capacity(manifest.audio_segments.len() + manifest.video_segments.len());
        urls.extend(manifest.audio_segments.iter().cloned());
        urls.extend(manifest.video_segments.iter().cloned());
        if urls.is_empty() {
            return Err(EngineError::invalid_manifest(format!(
                "{manifest_url} declares renditions but none yielded segments"
            )));
        }
        Ok(urls)
    }

    fn resolve_concurrency(&self, requested: Option<usize>) -> Result<usize> {
        let concurrency = requested.unwrap_or(self.config.download.default_concurrency);
        if concurrency == 0 {
            return Err(EngineError::configuration(
                "download concurrency must be at least 1",
            ));
        }
        if concurrency > MAX_DOWNLOAD_CONCURRENCY {
            warn!(
                requested = concurrency,
                clamped = MAX_DOWNLOAD_CONCURRENCY,
                "clamping download concurrency"
            );
            return Ok(MAX_DOWNLOAD_CONCURRENCY);
        }
        Ok(concurrency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeFetcher;

    fn downloader() -> Downloader {
        Downloader::with_fetcher(EngineConfig::default(), Arc::new(FakeFetcher::new()))
    }

    #[tokio::test]
    async fn dash_manifests_are_recognized_but_refused() {
        let d = downloader();
        let err = d
            .download(
                "https://cdn.example/stream/manifest.mpd",
                DownloadOptions::new("/tmp/out.ts"),
            )
            .await
            .expect_err("should fail");
        assert!(matches!(err, EngineError::UnsupportedFormat { .. }));
        assert!(err.is_usage_error());
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected_before_any_fetch() {
        let d = downloader();
        let err = d
            .download(
                "https://cdn.example/stream/index.m3u8",
                DownloadOptions::new("/tmp/out.ts").with_concurrency(0),
            )
            .await
            .expect_err("should fail");
        assert!(matches!(err, EngineError::Configuration { .. }));
    }

    #[tokio::test]
    async fn oversized_concurrency_is_clamped() {
        let d = downloader();
        assert_eq!(
            d.resolve_concurrency(Some(500)).expect("should clamp"),
            MAX_DOWNLOAD_CONCURRENCY
        );
    }

    #[tokio::test]
    async fn default_concurrency_comes_from_config() {
        let d = downloader();
        assert_eq!(d.resolve_concurrency(None).expect("should resolve"), 3);
    }
}
