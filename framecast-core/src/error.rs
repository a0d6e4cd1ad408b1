//! Domain-specific error types for the frame-streaming server.
//!
//! All fallible operations return `Result<T, CastError>`.
//! Configuration errors are fatal to server start; capture errors are
//! recovered locally (the affected frame degrades to an empty frame).

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for framecast.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Configuration Errors ─────────────────────────────────────
    /// A configuration field failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The configured video source could not be opened or decoded.
    #[error("cannot open video source '{path}': {reason}")]
    VideoOpen { path: String, reason: String },

    // ── Capture Errors ───────────────────────────────────────────
    /// Decoding a frame from the video stream failed.
    #[error("video decode error: {0}")]
    VideoDecode(String),

    /// A display snapshot did not arrive within the deadline.
    #[error("capture timed out after {0:?}")]
    CaptureTimeout(Duration),

    /// The capture worker pool rejected the request (busy or no display).
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Resizing or converting a bitmap failed.
    #[error("frame encode failed: {0}")]
    Encode(String),

    // ── Lifecycle Errors ─────────────────────────────────────────
    /// `start()` was called while the server was already running.
    #[error("server already running on port {0}")]
    AlreadyRunning(u16),

    // ── Transport Errors ─────────────────────────────────────────
    /// The underlying socket or file I/O layer reported an error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker reply channel was dropped before answering.
    #[error("channel closed")]
    ChannelClosed,
}
