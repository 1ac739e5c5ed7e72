// Segment acquisition pool: bounded-concurrency fetch over an ordered URL
// list. Completion order is irrelevant; the claimed index is the only
// identity used for result placement.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Where segment bodies come from. Production uses the transport handle;
/// tests substitute sources with controlled timing and failures.
#[async_trait]
pub trait SegmentSource: Send + Sync {
    async fn fetch_segment(&self, url: &str) -> Result<Bytes>;
}

/// Fetches every URL with at most `concurrency` requests in flight and
/// returns the bodies so that index `i` holds the bytes for `urls[i]`.
///
/// `on_progress(completed, total)` fires once per stored result. The pool is
/// fail-fast: the first fetch error cancels the job, no further indices are
/// claimed, and results of fetches already in flight are discarded. Partial
/// results never escape.
pub async fn fetch_all(
    source: Arc<dyn SegmentSource>,
    urls: Vec<String>,
    concurrency: usize,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<Vec<Bytes>> {
    if concurrency == 0 {
        return Err(EngineError::configuration(
            "segment fetch concurrency must be at least 1",
        ));
    }
    let total = urls.len();
    if total == 0 {
        // Empty lists are rejected upstream; nothing to do here.
        return Ok(Vec::new());
    }

    let workers = concurrency.min(total);
    let urls = Arc::new(urls);
    let cursor = Arc::new(AtomicUsize::new(0));
    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<(usize, Result<Bytes>)>(workers);

    debug!(total, workers, "starting segment fetch pool");
    for _ in 0..workers {
        let source = Arc::clone(&source);
        let urls = Arc::clone(&urls);
        let cursor = Arc::clone(&cursor);
        let token = token.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                if token.is_cancelled() {
                    break;
                }
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= urls.len() {
                    break;
                }
                match source.fetch_segment(&urls[index]).await {
                    Ok(bytes) => {
                        if tx.send((index, Ok(bytes))).await.is_err() {
                            // Collector is gone; the job already failed.
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send((index, Err(e))).await;
                        break;
                    }
                }
            }
        });
    }
    drop(tx);

    // Each result is written only at its claimed index, so the collector
    // needs no lock and out-of-order completion cannot corrupt ordering.
    let mut slots: Vec<Option<Bytes>> = vec![None; total];
    let mut completed = 0usize;
    while let Some((index, result)) = rx.recv().await {
        match result {
            Ok(bytes) => {
                debug_assert!(slots[index].is_none(), "index {index} claimed twice");
                slots[index] = Some(bytes);
                completed += 1;
                on_progress(completed, total);
            }
            Err(e) => {
                warn!(index, error = %e, "segment fetch failed; aborting job");
                token.cancel();
                rx.close();
                return Err(e);
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| EngineError::internal(format!("segment {i} never completed")))
        })
        .collect()
}
