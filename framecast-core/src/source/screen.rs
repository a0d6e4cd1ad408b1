//! Live display capture.
//!
//! Grabbing a display snapshot is inherently blocking, and the HTTP layer
//! serves every request on one cooperative scheduler — so snapshots are
//! taken by a small pool of dedicated OS threads, each owning its own
//! `scrap::Capturer` (capturers cannot move between threads). The async
//! caller submits a request over a bounded channel and awaits a oneshot
//! reply with a hard timeout; a timeout degrades to an empty frame
//! upstream instead of stalling the scheduler.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use scrap::{Capturer, Display};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::CastError;
use crate::frame::RawBitmap;
use crate::session::SessionStore;
use crate::source::FrameSource;

/// Hard bound on how long one snapshot may take end to end.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Dedicated capture threads. Two is enough to keep one slow grab from
/// starving the next request.
const WORKER_COUNT: usize = 2;

/// Poll interval while the compositor has no new frame for us.
const RETRY_INTERVAL: Duration = Duration::from_millis(5);

struct CaptureRequest {
    reply: oneshot::Sender<Result<RawBitmap, CastError>>,
    deadline: Instant,
}

/// Live-display frame source backed by a bounded capture worker pool.
///
/// Dropping the source closes the request channel, which terminates the
/// worker threads and releases their capturers.
pub struct ScreenSource {
    requests: SyncSender<CaptureRequest>,
}

impl ScreenSource {
    /// Spawn the capture workers.
    ///
    /// Capturer construction happens lazily *inside* each worker thread,
    /// so a headless environment surfaces as per-request capture errors
    /// (empty frames) rather than a failed server start.
    pub fn start() -> Result<Self, CastError> {
        let (tx, rx) = std::sync::mpsc::sync_channel::<CaptureRequest>(WORKER_COUNT);
        let rx = Arc::new(Mutex::new(rx));
        for n in 0..WORKER_COUNT {
            let rx = Arc::clone(&rx);
            std::thread::Builder::new()
                .name(format!("capture-{n}"))
                .spawn(move || worker_loop(rx))
                .map_err(CastError::Io)?;
        }
        Ok(Self { requests: tx })
    }
}

#[async_trait]
impl FrameSource for ScreenSource {
    async fn acquire(
        &self,
        _sessions: &SessionStore,
        _client_id: &str,
        _advance: bool,
    ) -> Result<RawBitmap, CastError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = CaptureRequest {
            reply: reply_tx,
            deadline: Instant::now() + CAPTURE_TIMEOUT,
        };
        match self.requests.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                return Err(CastError::CaptureUnavailable(
                    "all capture workers are busy".into(),
                ));
            }
            Err(TrySendError::Disconnected(_)) => return Err(CastError::ChannelClosed),
        }
        match tokio::time::timeout(CAPTURE_TIMEOUT, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CastError::ChannelClosed),
            Err(_) => Err(CastError::CaptureTimeout(CAPTURE_TIMEOUT)),
        }
    }
}

// ── Worker side ──────────────────────────────────────────────────

fn worker_loop(rx: Arc<Mutex<Receiver<CaptureRequest>>>) {
    let mut capturer: Option<Capturer> = None;
    loop {
        // Hold the receiver lock only while waiting for work.
        let request = {
            let rx = rx.lock();
            rx.recv()
        };
        let Ok(request) = request else {
            debug!("capture channel closed; worker exiting");
            return;
        };

        if capturer.is_none() {
            match open_capturer() {
                Ok(c) => capturer = Some(c),
                Err(e) => {
                    warn!(error = %e, "cannot open display capturer");
                    let _ = request.reply.send(Err(e));
                    continue;
                }
            }
        }
        let Some(cap) = capturer.as_mut() else {
            continue;
        };

        let result = grab(cap, request.deadline);
        if result.is_err() {
            // Display configuration may have changed; reopen next time.
            capturer = None;
        }
        // The caller may have timed out and dropped the receiver.
        let _ = request.reply.send(result);
    }
}

fn open_capturer() -> Result<Capturer, CastError> {
    let display = Display::primary()
        .map_err(|e| CastError::CaptureUnavailable(format!("no primary display: {e}")))?;
    Capturer::new(display)
        .map_err(|e| CastError::CaptureUnavailable(format!("cannot begin capture: {e}")))
}

/// Block until the compositor yields a frame or the deadline passes.
fn grab(capturer: &mut Capturer, deadline: Instant) -> Result<RawBitmap, CastError> {
    let width = capturer.width();
    let height = capturer.height();
    loop {
        match capturer.frame() {
            Ok(buffer) => return bgra_to_rgba(&buffer, width, height),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(CastError::CaptureTimeout(CAPTURE_TIMEOUT));
                }
                std::thread::sleep(RETRY_INTERVAL);
            }
            Err(e) => return Err(CastError::Io(e)),
        }
    }
}

/// Repack a stride-padded BGRA snapshot as tight RGBA.
fn bgra_to_rgba(buffer: &[u8], width: usize, height: usize) -> Result<RawBitmap, CastError> {
    if height == 0 || buffer.len() < width * height * 4 {
        return Err(CastError::CaptureUnavailable(format!(
            "short capture buffer: {} bytes for {width}x{height}",
            buffer.len()
        )));
    }
    let stride = buffer.len() / height;
    let mut data = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row = &buffer[y * stride..y * stride + width * 4];
        for px in row.chunks_exact(4) {
            data.extend_from_slice(&[px[2], px[1], px[0], 255]);
        }
    }
    RawBitmap::from_rgba(width as u32, height as u32, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_repack_swaps_channels_and_drops_padding() {
        // 2x2 BGRA with 4 bytes of row padding (stride 12).
        #[rustfmt::skip]
        let buffer = [
            1, 2, 3, 9,   4, 5, 6, 9,   0, 0, 0, 0,
            7, 8, 9, 9,  10, 11, 12, 9, 0, 0, 0, 0,
        ];
        let bmp = bgra_to_rgba(&buffer, 2, 2).unwrap();
        assert_eq!(bmp.pixel(0, 0), &[3, 2, 1, 255]);
        assert_eq!(bmp.pixel(1, 0), &[6, 5, 4, 255]);
        assert_eq!(bmp.pixel(0, 1), &[9, 8, 7, 255]);
        assert_eq!(bmp.pixel(1, 1), &[12, 11, 10, 255]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(bgra_to_rgba(&[0u8; 8], 2, 2).is_err());
    }
}
