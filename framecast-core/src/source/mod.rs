//! Frame acquisition.
//!
//! A [`FrameSource`] produces the next raw bitmap for a request. Two
//! capture modes exist behind the one trait:
//!
//! | Source         | Backing                       | Cursor state        |
//! |----------------|-------------------------------|---------------------|
//! | [`ScreenSource`] | live display via `scrap`    | stateless           |
//! | [`VideoSource`]  | `.y4m` file via `y4m`       | shared decode handle|
//!
//! The server owns one source for its whole running lifetime and hands it
//! the [`SessionStore`] so video playback cursors can be advanced and
//! reset in step with the decode handle.

pub mod screen;
pub mod video;

use async_trait::async_trait;

use crate::error::CastError;
use crate::frame::RawBitmap;
use crate::session::SessionStore;

pub use screen::ScreenSource;
pub use video::VideoSource;

/// Produces the next raw bitmap for a requesting client.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquire one bitmap on behalf of `client_id`.
    ///
    /// When `advance` is set and the source tracks playback position, the
    /// session's cursor is incremented by the configured speed multiplier
    /// *before* the read, and the decode handle is positioned at that
    /// cursor. Sources without playback position ignore both parameters.
    ///
    /// Errors returned here degrade to an empty frame for the affected
    /// slot; only a torn-down worker channel fails the request as a
    /// whole.
    async fn acquire(
        &self,
        sessions: &SessionStore,
        client_id: &str,
        advance: bool,
    ) -> Result<RawBitmap, CastError>;
}
