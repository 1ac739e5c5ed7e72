//! vodsnap engine: detection, acquisition and reassembly of segmented
//! adaptive-streaming media (HLS playlists).
//!
//! The pipeline: a [`detect::StreamDetector`] surfaces candidate manifest
//! URLs from observed network traffic; [`manifest`] turns playlist text into
//! an ordered segment list; the [`transport`] boundary carries all fetches
//! through a privileged executor as text-safe envelopes; [`pool`] downloads
//! segments with bounded concurrency while preserving playlist order; and
//! [`assemble`] concatenates the ordered buffers into one artifact.
//!
//! Separated audio/video renditions are concatenated back to back, not
//! muxed; see [`download::Downloader::download`] for the caveat.

pub mod assemble;
pub mod config;
pub mod detect;
pub mod download;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod pool;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

// Re-exports for easier access
pub use assemble::{Artifact, assemble, content_type_for, write_artifact};
pub use config::{DetectorConfig, DownloadConfig, EngineConfig, HttpConfig};
pub use detect::{DetectedStream, StreamDetector, StreamKind, TabId};
pub use download::{DownloadOptions, DownloadPhase, DownloadSummary, Downloader, ProgressFn};
pub use error::{EngineError, Result};
pub use fetch::{HttpFetcher, RemoteFetcher};
pub use manifest::{ParsedManifest, ensure_segment_list, parse_manifest};
pub use pool::{SegmentSource, fetch_all};
pub use transport::{TransportHandle, spawn_transport};
