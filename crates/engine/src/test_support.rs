//! In-memory fakes shared by unit and integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::error::{EngineError, Result};
use crate::fetch::RemoteFetcher;

/// A [`RemoteFetcher`] backed by canned bodies. URLs without a registered
/// body answer 404, so fetch failures are easy to script.
#[derive(Default)]
pub struct FakeFetcher {
    texts: Mutex<HashMap<String, String>>,
    bodies: Mutex<HashMap<String, Bytes>>,
    fetches: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.lock().insert(url.into(), text.into());
        self
    }

    pub fn with_bytes(self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.bodies.lock().insert(url.into(), body.into());
        self
    }

    /// Total fetches served or refused so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFetcher for FakeFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.texts
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| EngineError::http_status(StatusCode::NOT_FOUND, url, "manifest fetch"))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| EngineError::http_status(StatusCode::NOT_FOUND, url, "segment fetch"))
    }
}
