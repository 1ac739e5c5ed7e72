// End-to-end download jobs against an in-memory fetcher.

use std::sync::{Arc, Mutex};

use vodsnap_engine::test_support::FakeFetcher;
use vodsnap_engine::{DownloadOptions, DownloadPhase, Downloader, EngineConfig, EngineError};

fn downloader(fetcher: FakeFetcher) -> Downloader {
    Downloader::with_fetcher(EngineConfig::default(), Arc::new(fetcher))
}

#[tokio::test]
async fn downloads_a_media_playlist_into_one_artifact() {
    let fetcher = FakeFetcher::new()
        .with_text(
            "https://cdn.example/path/index.m3u8",
            "#EXTM3U\n#EXTINF:10.0,\nseg0.ts\n#EXTINF:10.0,\nseg1.ts\n#EXT-X-ENDLIST",
        )
        .with_bytes("https://cdn.example/path/seg0.ts", b"first-".to_vec())
        .with_bytes("https://cdn.example/path/seg1.ts", b"second".to_vec());
    let d = downloader(fetcher);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.ts");
    let summary = d
        .download(
            "https://cdn.example/path/index.m3u8",
            DownloadOptions::new(&path).with_concurrency(2),
        )
        .await
        .expect("download should succeed");

    assert_eq!(summary.segment_count, 2);
    assert_eq!(summary.byte_len, 12);
    assert_eq!(std::fs::read(&path).expect("artifact"), b"first-second");
}

#[tokio::test]
async fn separated_renditions_concatenate_audio_then_video() {
    let fetcher = FakeFetcher::new()
        .with_text(
            "https://cdn.example/live/master.m3u8",
            concat!(
                "#EXTM3U\n",
                "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",URI=\"audio.m3u8\"\n",
                "#EXT-X-STREAM-INF:BANDWIDTH=800000,AUDIO=\"aud\"\n",
                "video.m3u8\n",
            ),
        )
        .with_text(
            "https://cdn.example/live/audio.m3u8",
            "#EXTM3U\n#EXTINF:4.0,\na0.m4s\n#EXTINF:4.0,\na1.m4s\n",
        )
        .with_text(
            "https://cdn.example/live/video.m3u8",
            "#EXTM3U\n#EXTINF:4.0,\nv0.m4s\n#EXTINF:4.0,\nv1.m4s\n",
        )
        .with_bytes("https://cdn.example/live/a0.m4s", b"A0".to_vec())
        .with_bytes("https://cdn.example/live/a1.m4s", b"A1".to_vec())
        .with_bytes("https://cdn.example/live/v0.m4s", b"V0".to_vec())
        .with_bytes("https://cdn.example/live/v1.m4s", b"V1".to_vec());
    let d = downloader(fetcher);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.mp4");
    let summary = d
        .download(
            "https://cdn.example/live/master.m3u8",
            DownloadOptions::new(&path),
        )
        .await
        .expect("download should succeed");

    assert_eq!(summary.segment_count, 4);
    // Simple concatenation: all audio, then all video.
    assert_eq!(std::fs::read(&path).expect("artifact"), b"A0A1V0V1");
}

#[tokio::test]
async fn manifest_without_usable_segments_is_rejected() {
    // The only non-comment lines end in a manifest extension: a variant list
    // masquerading as a media playlist. Never downloaded as segments.
    let fetcher = FakeFetcher::new().with_text(
        "https://cdn.example/path/index.m3u8",
        "#EXTM3U\nlow/index.m3u8\nhigh/index.m3u8\n",
    );
    let d = downloader(fetcher);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.ts");
    let err = d
        .download(
            "https://cdn.example/path/index.m3u8",
            DownloadOptions::new(&path),
        )
        .await
        .expect_err("should fail");

    assert!(matches!(err, EngineError::InvalidManifest { .. }));
    assert!(err.is_usage_error());
    assert!(!path.exists(), "no artifact may be written");
}

#[tokio::test]
async fn failing_segment_aborts_the_job_without_an_artifact() {
    // seg1 has no canned body, so its fetch answers 404.
    let fetcher = FakeFetcher::new()
        .with_text(
            "https://cdn.example/path/index.m3u8",
            "#EXTM3U\n#EXTINF:2.0,\nseg0.ts\n#EXTINF:2.0,\nseg1.ts\n#EXTINF:2.0,\nseg2.ts\n",
        )
        .with_bytes("https://cdn.example/path/seg0.ts", b"ok".to_vec())
        .with_bytes("https://cdn.example/path/seg2.ts", b"ok".to_vec());
    let d = downloader(fetcher);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.ts");
    let err = d
        .download(
            "https://cdn.example/path/index.m3u8",
            DownloadOptions::new(&path).with_concurrency(1),
        )
        .await
        .expect_err("should fail");

    assert!(matches!(err, EngineError::Fetch { .. }));
    assert!(err.to_string().contains("seg1.ts"));
    assert!(!path.exists(), "partial results must never become an artifact");
}

#[tokio::test]
async fn rendition_playlist_without_segments_is_rejected() {
    let fetcher = FakeFetcher::new()
        .with_text(
            "https://cdn.example/live/master.m3u8",
            concat!(
                "#EXTM3U\n",
                "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",URI=\"audio.m3u8\"\n",
            ),
        )
        .with_text("https://cdn.example/live/audio.m3u8", "#EXTM3U\n");
    let d = downloader(fetcher);

    let dir = tempfile::tempdir().expect("tempdir");
    let err = d
        .download(
            "https://cdn.example/live/master.m3u8",
            DownloadOptions::new(dir.path().join("out.ts")),
        )
        .await
        .expect_err("should fail");

    assert!(matches!(err, EngineError::InvalidManifest { .. }));
    assert!(err.to_string().contains("audio.m3u8"));
}

#[tokio::test]
async fn unreachable_manifest_surfaces_a_fetch_error_naming_the_url() {
    let d = downloader(FakeFetcher::new());

    let dir = tempfile::tempdir().expect("tempdir");
    let err = d
        .download(
            "https://cdn.example/gone/index.m3u8",
            DownloadOptions::new(dir.path().join("out.ts")),
        )
        .await
        .expect_err("should fail");

    assert!(matches!(err, EngineError::Fetch { .. }));
    assert!(err.to_string().contains("gone/index.m3u8"));
}

#[tokio::test]
async fn progress_walks_the_phases_in_order_and_ends_at_100() {
    let fetcher = FakeFetcher::new()
        .with_text(
            "https://cdn.example/path/index.m3u8",
            "#EXTM3U\n#EXTINF:2.0,\nseg0.ts\n#EXTINF:2.0,\nseg1.ts\n",
        )
        .with_bytes("https://cdn.example/path/seg0.ts", b"a".to_vec())
        .with_bytes("https://cdn.example/path/seg1.ts", b"b".to_vec());
    let d = downloader(fetcher);

    let reports: Arc<Mutex<Vec<(DownloadPhase, f64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);

    let dir = tempfile::tempdir().expect("tempdir");
    d.download(
        "https://cdn.example/path/index.m3u8",
        DownloadOptions::new(dir.path().join("out.ts")).with_progress(Box::new(
            move |phase, percent, _detail| {
                sink.lock().unwrap().push((phase, percent));
            },
        )),
    )
    .await
    .expect("download should succeed");

    let reports = reports.lock().unwrap();
    assert_eq!(reports.first().map(|r| r.0), Some(DownloadPhase::FetchingManifest));
    assert_eq!(reports.last(), Some(&(DownloadPhase::Done, 100.0)));

    let phases: Vec<DownloadPhase> = reports.iter().map(|r| r.0).collect();
    let assembling = phases
        .iter()
        .position(|p| *p == DownloadPhase::Assembling)
        .expect("assembling phase reported");
    let writing = phases
        .iter()
        .position(|p| *p == DownloadPhase::Writing)
        .expect("writing phase reported");
    assert!(assembling < writing);
    assert!(reports.windows(2).all(|w| w[0].1 <= w[1].1), "percent is monotonic");
}
