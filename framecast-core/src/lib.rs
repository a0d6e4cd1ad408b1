//! # framecast-core
//!
//! Core library for the framecast polled frame-streaming server.
//!
//! A polling client (typically a sandboxed scripting environment that can
//! only issue plain HTTP requests) repeatedly POSTs to the server and
//! receives a batch of normalized pixel frames it can paint as a texture.
//! No persistent connection is required.
//!
//! This crate contains:
//! - **Config**: `StreamConfig` — the flat JSON configuration document
//! - **Frame types**: `RawBitmap` (captured RGBA) and `Frame` (wire pixels)
//! - **Sources**: `ScreenSource` (live display) and `VideoSource` (y4m file)
//! - **Encoder**: `FrameEncoder` — bilinear resize + channel quantization
//! - **Sessions**: `SessionStore` — per-client playback cursors
//! - **Pacing**: `FramePacer` — fps-bounded frame production
//! - **Server**: `StreamServer` — HTTP front end and lifecycle state machine
//! - **Error**: `CastError` — typed, `thiserror`-based error hierarchy

pub mod config;
pub mod encode;
pub mod error;
pub mod frame;
pub mod pacing;
pub mod protocol;
pub mod server;
pub mod session;
pub mod source;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::StreamConfig;
pub use encode::FrameEncoder;
pub use error::CastError;
pub use frame::{Frame, RawBitmap};
pub use pacing::FramePacer;
pub use protocol::{
    BatchResponse, DEFAULT_CLIENT_ID, ErrorResponse, FrameRequest, HEADER_CLIENT_ID,
    HEADER_REFRESH, HEADER_SKIP, StatusResponse,
};
pub use server::{ServerState, ServerStats, StreamServer};
pub use session::SessionStore;
pub use source::{FrameSource, ScreenSource, VideoSource};
