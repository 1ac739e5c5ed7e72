// Transport adapter: a correlated request/response exchange between the
// constrained consumer side and a privileged executor task that owns the
// only HTTP client. The boundary carries nothing but text envelopes.

pub mod codec;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use crate::error::{EngineError, Result};
use crate::fetch::RemoteFetcher;
use crate::manifest::{ParsedManifest, parse_manifest};
use crate::pool::SegmentSource;
use codec::{Request, Response, WireError};

/// Depth of the request queue into the executor. Callers block briefly when
/// it fills; the pool bounds in-flight work well below this anyway.
const REQUEST_QUEUE_DEPTH: usize = 64;

struct Exchange {
    envelope: String,
    reply: oneshot::Sender<String>,
}

/// Consumer-side handle. Cheap to clone; every call is one logical request
/// awaiting exactly one response.
#[derive(Clone)]
pub struct TransportHandle {
    tx: mpsc::Sender<Exchange>,
}

impl TransportHandle {
    /// Fetches and parses a manifest on the privileged side.
    pub async fn request_parse(&self, url: &str) -> Result<ParsedManifest> {
        let response = self
            .exchange(Request::ParseManifest {
                url: url.to_owned(),
            })
            .await?;
        match response {
            Response::Manifest { manifest } => Ok(manifest),
            Response::Error { error } => Err(error.into()),
            Response::Segment { .. } => Err(EngineError::transport(
                "mismatched response: expected manifest, got segment",
            )),
        }
    }

    /// Fetches one segment body on the privileged side.
    pub async fn request_segment(&self, url: &str) -> Result<Bytes> {
        let response = self
            .exchange(Request::FetchSegment {
                url: url.to_owned(),
            })
            .await?;
        match response {
            Response::Segment { data } => codec::decode_bytes(&data),
            Response::Error { error } => Err(error.into()),
            Response::Manifest { .. } => Err(EngineError::transport(
                "mismatched response: expected segment, got manifest",
            )),
        }
    }

    async fn exchange(&self, request: Request) -> Result<Response> {
        let envelope = codec::encode_request(&request)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Exchange {
                envelope,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::transport("executor unreachable: request channel closed"))?;
        let envelope = reply_rx
            .await
            .map_err(|_| EngineError::transport("executor dropped the reply"))?;
        codec::decode_response(&envelope)
    }
}

#[async_trait]
impl SegmentSource for TransportHandle {
    async fn fetch_segment(&self, url: &str) -> Result<Bytes> {
        self.request_segment(url).await
    }
}

/// Spawns the privileged executor task and returns the consumer-side handle.
/// The executor owns the fetcher; requests are independent, so each one is
/// serviced on its own task and the pool's bound is the only concurrency
/// limit.
pub fn spawn_transport(fetcher: Arc<dyn RemoteFetcher>) -> TransportHandle {
    let (tx, mut rx) = mpsc::channel::<Exchange>(REQUEST_QUEUE_DEPTH);

    tokio::spawn(async move {
        debug!("transport executor started");
        while let Some(Exchange { envelope, reply }) = rx.recv().await {
            let fetcher = Arc::clone(&fetcher);
            tokio::spawn(async move {
                let response = handle_envelope(fetcher.as_ref(), &envelope).await;
                let text = codec::encode_response(&response).unwrap_or_else(|e| {
                    error!(error = %e, "cannot encode response envelope");
                    // A response the codec cannot encode still must not leave
                    // the caller hanging on the oneshot.
                    codec::encode_response(&Response::Error {
                        error: WireError::Transport(e.to_string()),
                    })
                    .unwrap_or_default()
                });
                let _ = reply.send(text);
            });
        }
        debug!("transport executor stopped");
    });

    TransportHandle { tx }
}

async fn handle_envelope(fetcher: &dyn RemoteFetcher, envelope: &str) -> Response {
    let request = match codec::decode_request(envelope) {
        Ok(request) => request,
        Err(e) => {
            return Response::Error {
                error: WireError::from(&e),
            };
        }
    };

    trace!(?request, "handling transport request");
    let result = match request {
        Request::ParseManifest { url } => fetcher
            .fetch_text(&url)
            .await
            .and_then(|text| parse_manifest(&text, &url))
            .map(|manifest| Response::Manifest { manifest }),
        Request::FetchSegment { url } => fetcher.fetch_bytes(&url).await.map(|bytes| {
            Response::Segment {
                data: codec::encode_bytes(&bytes),
            }
        }),
    };

    result.unwrap_or_else(|e| Response::Error {
        error: WireError::from(&e),
    })
}
