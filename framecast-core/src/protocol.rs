//! Wire protocol types.
//!
//! The protocol is fixed and single-format: a GET probe answering with
//! server status, and a POST producing one frame batch. Request fields
//! travel as single-character HTTP headers (the polling client can only
//! set headers, not bodies); response bodies are JSON with the short key
//! names the client decodes (`Fr`, `F`, `X`, `Y`, `G`).

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::frame::Frame;

/// Header: "1" requests a full refresh (clears client-side frame state).
pub const HEADER_REFRESH: &str = "R";
/// Header: opaque client/session identifier.
pub const HEADER_CLIENT_ID: &str = "I";
/// Header: "1" advances the video cursor before this batch.
pub const HEADER_SKIP: &str = "F";
/// Session identifier used when the client sends none.
pub const DEFAULT_CLIENT_ID: &str = "default";

// ── Requests ─────────────────────────────────────────────────────

/// Decoded logical fields of one frame request.
///
/// Malformed or missing headers fall back to documented defaults — the
/// protocol trusts its caller and never rejects a request over headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRequest {
    /// Full-refresh flag (`R`).
    pub refresh: bool,
    /// Session identifier (`I`).
    pub client_id: String,
    /// Advance-cursor flag (`F`).
    pub advance: bool,
}

impl FrameRequest {
    /// Decode the request headers, defaulting anything unreadable.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let client_id = match headers.get(HEADER_CLIENT_ID).map(|v| v.to_str()) {
            Some(Ok(id)) if !id.is_empty() => id.to_string(),
            Some(_) => {
                debug!("unreadable client id header; using default");
                DEFAULT_CLIENT_ID.to_string()
            }
            None => DEFAULT_CLIENT_ID.to_string(),
        };
        Self {
            refresh: flag(headers, HEADER_REFRESH),
            client_id,
            advance: flag(headers, HEADER_SKIP),
        }
    }
}

/// A flag header is set iff its value is exactly `"1"`.
fn flag(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "1")
        .unwrap_or(false)
}

// ── Responses ────────────────────────────────────────────────────

/// `GET /` liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `"running"` while the server answers at all.
    pub status: String,
    /// `"<width>x<height>"`.
    pub resolution: String,
    /// Configured frame rate.
    pub fps: u32,
}

/// `POST /` frame batch body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    /// The frames, `frame_groups` of them. An inner empty array marks a
    /// slot whose capture or encode failed.
    #[serde(rename = "Fr")]
    pub frames: Vec<Frame>,
    /// Active frame rate.
    #[serde(rename = "F")]
    pub fps: u32,
    /// Frame width in pixels.
    #[serde(rename = "X")]
    pub width: u32,
    /// Frame height in pixels.
    #[serde(rename = "Y")]
    pub height: u32,
    /// Batch size, matching `frames.len()`.
    #[serde(rename = "G")]
    pub frame_groups: u32,
}

/// Request-level failure body (HTTP 500).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_headers_fall_back_to_defaults() {
        let req = FrameRequest::from_headers(&HeaderMap::new());
        assert_eq!(
            req,
            FrameRequest {
                refresh: false,
                client_id: DEFAULT_CLIENT_ID.to_string(),
                advance: false,
            }
        );
    }

    #[test]
    fn set_headers_are_decoded() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_REFRESH, HeaderValue::from_static("1"));
        headers.insert(HEADER_CLIENT_ID, HeaderValue::from_static("player-7"));
        headers.insert(HEADER_SKIP, HeaderValue::from_static("1"));

        let req = FrameRequest::from_headers(&headers);
        assert!(req.refresh);
        assert!(req.advance);
        assert_eq!(req.client_id, "player-7");
    }

    #[test]
    fn malformed_headers_never_reject() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_REFRESH, HeaderValue::from_static("yes"));
        headers.insert(HEADER_SKIP, HeaderValue::from_static("2"));
        headers.insert(HEADER_CLIENT_ID, HeaderValue::from_bytes(b"\xff\xfe").unwrap());

        let req = FrameRequest::from_headers(&headers);
        assert!(!req.refresh);
        assert!(!req.advance);
        assert_eq!(req.client_id, DEFAULT_CLIENT_ID);
    }

    #[test]
    fn batch_response_uses_short_wire_keys() {
        let body = BatchResponse {
            frames: vec![vec![0.0, 0.0, 0.0, 1.0]],
            fps: 8,
            width: 1,
            height: 1,
            frame_groups: 1,
        };
        let value = serde_json::to_value(&body).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("Fr"));
        assert_eq!(obj["F"], 8);
        assert_eq!(obj["X"], 1);
        assert_eq!(obj["Y"], 1);
        assert_eq!(obj["G"], 1);
    }
}
