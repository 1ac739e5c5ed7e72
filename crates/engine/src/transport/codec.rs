// Text-safe envelope codec for the transport boundary. The boundary only
// carries strings: requests and responses are JSON envelopes, segment bytes
// travel base64-encoded and must round-trip exactly.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::manifest::ParsedManifest;

/// Closed enumeration of operations crossing the boundary. One request kind
/// pairs with exactly one response kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ParseManifest { url: String },
    FetchSegment { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Manifest { manifest: ParsedManifest },
    /// Segment body, base64-encoded.
    Segment { data: String },
    /// Tagged far-side failure. Never a silent empty body: the caller must be
    /// able to tell "zero segments, confirmed" from "request failed".
    Error { error: WireError },
}

/// Serializable mirror of the far-side error taxonomy. Messages already name
/// the URL and cause, so rehydration keeps failures distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum WireError {
    Fetch(String),
    InvalidManifest(String),
    UnsupportedFormat(String),
    Transport(String),
    Internal(String),
}

impl From<&EngineError> for WireError {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::Network { .. }
            | EngineError::HttpStatus { .. }
            | EngineError::Fetch { .. }
            | EngineError::InvalidUrl { .. } => Self::Fetch(err.to_string()),
            EngineError::InvalidManifest { reason } => Self::InvalidManifest(reason.clone()),
            EngineError::UnsupportedFormat { format } => Self::UnsupportedFormat(format.clone()),
            EngineError::Transport { reason } => Self::Transport(reason.clone()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<WireError> for EngineError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Fetch(reason) => Self::Fetch { reason },
            WireError::InvalidManifest(reason) => Self::InvalidManifest { reason },
            WireError::UnsupportedFormat(format) => Self::UnsupportedFormat { format },
            WireError::Transport(reason) => Self::Transport { reason },
            WireError::Internal(reason) => Self::Internal { reason },
        }
    }
}

pub fn encode_request(request: &Request) -> Result<String> {
    serde_json::to_string(request)
        .map_err(|e| EngineError::transport(format!("cannot encode request: {e}")))
}

pub fn decode_request(envelope: &str) -> Result<Request> {
    serde_json::from_str(envelope)
        .map_err(|e| EngineError::transport(format!("cannot decode request: {e}")))
}

pub fn encode_response(response: &Response) -> Result<String> {
    serde_json::to_string(response)
        .map_err(|e| EngineError::transport(format!("cannot encode response: {e}")))
}

pub fn decode_response(envelope: &str) -> Result<Response> {
    serde_json::from_str(envelope)
        .map_err(|e| EngineError::transport(format!("cannot decode response: {e}")))
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_bytes(data: &str) -> Result<Bytes> {
    BASE64
        .decode(data)
        .map(Bytes::from)
        .map_err(|e| EngineError::transport(format!("cannot decode segment payload: {e}")))
}
