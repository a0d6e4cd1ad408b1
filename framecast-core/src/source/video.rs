//! Video-file frame source.
//!
//! Decodes frames from a `.y4m` (YUV4MPEG2, 4:2:0) stream. One decode
//! handle is shared by **all** sessions: whichever client last advanced
//! the cursor decides where the stream is positioned, so concurrent
//! clients in video mode interfere with each other's playback position.
//! This mirrors the system the protocol was built for and is a documented
//! limitation, not an accident.
//!
//! y4m streams are forward-only; seeking backwards reopens the file and
//! skips ahead. On end-of-stream the handle wraps to frame 0 and the
//! requesting session's cursor is reset so client and source stay
//! aligned.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::CastError;
use crate::frame::RawBitmap;
use crate::session::SessionStore;
use crate::source::FrameSource;

/// Shared-handle video frame source.
pub struct VideoSource {
    reader: Mutex<VideoReader>,
    speed_multiplier: u64,
}

impl VideoSource {
    /// Open `path` and position the stream at `start_frame`.
    ///
    /// This is where a bad video configuration surfaces — before the
    /// server accepts its first request, never per request.
    pub fn open(path: &Path, start_frame: u64, speed_multiplier: u64) -> Result<Self, CastError> {
        let mut reader = VideoReader::open(path)?;
        reader.seek(start_frame)?;
        info!(
            path = %path.display(),
            width = reader.width,
            height = reader.height,
            start_frame,
            "video source opened"
        );
        Ok(Self {
            reader: Mutex::new(reader),
            speed_multiplier: speed_multiplier.max(1),
        })
    }

    /// Source frame dimensions as declared by the stream header.
    pub async fn dimensions(&self) -> (u32, u32) {
        let reader = self.reader.lock().await;
        (reader.width as u32, reader.height as u32)
    }
}

#[async_trait]
impl FrameSource for VideoSource {
    async fn acquire(
        &self,
        sessions: &SessionStore,
        client_id: &str,
        advance: bool,
    ) -> Result<RawBitmap, CastError> {
        let mut reader = self.reader.lock().await;
        if advance {
            // Cursor moves first, then the handle chases it.
            let cursor = sessions.advance(client_id, self.speed_multiplier);
            if reader.seek(cursor)? {
                debug!(client = client_id, "seek past end of stream; wrapped");
                sessions.reset(client_id);
            }
        }
        let (bitmap, wrapped) = reader.read()?;
        if wrapped {
            debug!(client = client_id, "end of stream; wrapped to frame 0");
            sessions.reset(client_id);
        }
        Ok(bitmap)
    }
}

// ── VideoReader ──────────────────────────────────────────────────

/// Position-tracking wrapper around a y4m decoder.
struct VideoReader {
    path: PathBuf,
    decoder: y4m::Decoder<File>,
    width: usize,
    height: usize,
    /// Index of the frame the next `read_frame` call will yield.
    pos: u64,
}

impl VideoReader {
    fn open(path: &Path) -> Result<Self, CastError> {
        let decoder = Self::open_decoder(path)?;
        let width = decoder.get_width();
        let height = decoder.get_height();
        if width == 0 || height == 0 {
            return Err(CastError::VideoOpen {
                path: path.display().to_string(),
                reason: format!("degenerate frame size {width}x{height}"),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            width,
            height,
            pos: 0,
        })
    }

    fn open_decoder(path: &Path) -> Result<y4m::Decoder<File>, CastError> {
        let file = File::open(path).map_err(|e| CastError::VideoOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        y4m::decode(file).map_err(|e| CastError::VideoOpen {
            path: path.display().to_string(),
            reason: format!("not a decodable y4m stream: {e:?}"),
        })
    }

    /// Reopen the stream at frame 0.
    fn rewind(&mut self) -> Result<(), CastError> {
        self.decoder = Self::open_decoder(&self.path)?;
        self.pos = 0;
        Ok(())
    }

    /// Position the stream so the next read yields frame `target`.
    ///
    /// Returns `true` when `target` lies beyond the end of the stream,
    /// in which case the stream has wrapped to frame 0.
    fn seek(&mut self, target: u64) -> Result<bool, CastError> {
        if target < self.pos {
            self.rewind()?;
        }
        while self.pos < target {
            match self.decoder.read_frame() {
                Ok(_) => self.pos += 1,
                Err(y4m::Error::EOF) => {
                    self.rewind()?;
                    return Ok(true);
                }
                Err(e) => return Err(CastError::VideoDecode(format!("{e:?}"))),
            }
        }
        Ok(false)
    }

    /// Decode the frame at the current position, wrapping at
    /// end-of-stream. Returns the bitmap and whether a wrap occurred.
    fn read(&mut self) -> Result<(RawBitmap, bool), CastError> {
        let (width, height) = (self.width, self.height);
        match self.decoder.read_frame() {
            Ok(frame) => {
                let bitmap = yuv420_to_rgba(&frame, width, height)?;
                self.pos += 1;
                Ok((bitmap, false))
            }
            Err(y4m::Error::EOF) => {
                self.rewind()?;
                let frame = self
                    .decoder
                    .read_frame()
                    .map_err(|e| CastError::VideoDecode(format!("stream has no frames: {e:?}")))?;
                let bitmap = yuv420_to_rgba(&frame, width, height)?;
                self.pos = 1;
                Ok((bitmap, true))
            }
            Err(e) => Err(CastError::VideoDecode(format!("{e:?}"))),
        }
    }
}

// ── YUV → RGBA ───────────────────────────────────────────────────

/// Expand one 4:2:0 frame into tight RGBA (BT.601 full range).
fn yuv420_to_rgba(frame: &y4m::Frame, width: usize, height: usize) -> Result<RawBitmap, CastError> {
    let y_plane = frame.get_y_plane();
    let u_plane = frame.get_u_plane();
    let v_plane = frame.get_v_plane();

    let chroma_w = width.div_ceil(2);
    let chroma_h = height.div_ceil(2);
    if y_plane.len() < width * height || u_plane.len() < chroma_w * chroma_h {
        return Err(CastError::VideoDecode(format!(
            "unexpected plane sizes (y={}, u={}, v={}); only 8-bit 4:2:0 streams are supported",
            y_plane.len(),
            u_plane.len(),
            v_plane.len()
        )));
    }

    let mut data = Vec::with_capacity(width * height * 4);
    for row in 0..height {
        for col in 0..width {
            let luma = y_plane[row * width + col];
            let chroma = (row / 2) * chroma_w + col / 2;
            let (r, g, b) = yuv_to_rgb(luma, u_plane[chroma], v_plane[chroma]);
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    RawBitmap::from_rgba(width as u32, height as u32, data)
}

#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344_14 * u - 0.714_14 * v;
    let b = y + 1.772 * u;

    (
        r.clamp(0.0, 255.0) as u8,
        g.clamp(0.0, 255.0) as u8,
        b.clamp(0.0, 255.0) as u8,
    )
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Write a tiny 4x4, 4:2:0 y4m stream whose frames have luma
    /// 10, 20, 30, … so each frame is identifiable after decode.
    fn write_test_y4m(path: &Path, frames: usize) {
        let mut file = File::create(path).unwrap();
        file.write_all(b"YUV4MPEG2 W4 H4 F25:1 Ip A1:1 C420\n")
            .unwrap();
        for n in 0..frames {
            file.write_all(b"FRAME\n").unwrap();
            let luma = (10 * (n + 1)) as u8;
            file.write_all(&[luma; 16]).unwrap(); // Y: 4x4
            file.write_all(&[128; 4]).unwrap(); // U: 2x2
            file.write_all(&[128; 4]).unwrap(); // V: 2x2
        }
    }

    /// Luma value a decoded gray frame carries (all channels equal).
    fn frame_luma(bitmap: &RawBitmap) -> u8 {
        bitmap.pixel(0, 0)[0]
    }

    #[test]
    fn open_rejects_missing_and_garbage_files() {
        assert!(matches!(
            VideoReader::open(Path::new("/nonexistent/clip.y4m")),
            Err(CastError::VideoOpen { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.y4m");
        std::fs::write(&path, b"not a y4m stream").unwrap();
        assert!(matches!(
            VideoReader::open(&path),
            Err(CastError::VideoOpen { .. })
        ));
    }

    #[test]
    fn sequential_reads_advance_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.y4m");
        write_test_y4m(&path, 3);

        let mut reader = VideoReader::open(&path).unwrap();
        for expected in [10u8, 20, 30] {
            let (bitmap, wrapped) = reader.read().unwrap();
            assert!(!wrapped);
            assert_eq!(frame_luma(&bitmap), expected);
        }
        assert_eq!(reader.pos, 3);
    }

    #[test]
    fn read_at_end_wraps_to_frame_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.y4m");
        write_test_y4m(&path, 2);

        let mut reader = VideoReader::open(&path).unwrap();
        reader.read().unwrap();
        reader.read().unwrap();

        let (bitmap, wrapped) = reader.read().unwrap();
        assert!(wrapped);
        assert_eq!(frame_luma(&bitmap), 10);
        assert_eq!(reader.pos, 1);
    }

    #[test]
    fn seek_backwards_reopens_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.y4m");
        write_test_y4m(&path, 3);

        let mut reader = VideoReader::open(&path).unwrap();
        assert!(!reader.seek(2).unwrap());
        let (bitmap, _) = reader.read().unwrap();
        assert_eq!(frame_luma(&bitmap), 30);

        assert!(!reader.seek(0).unwrap());
        let (bitmap, _) = reader.read().unwrap();
        assert_eq!(frame_luma(&bitmap), 10);
    }

    #[test]
    fn seek_past_end_reports_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.y4m");
        write_test_y4m(&path, 2);

        let mut reader = VideoReader::open(&path).unwrap();
        assert!(reader.seek(10).unwrap());
        assert_eq!(reader.pos, 0);
    }

    #[tokio::test]
    async fn advance_moves_cursor_by_speed_multiplier() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.y4m");
        write_test_y4m(&path, 8);

        let source = VideoSource::open(&path, 0, 3).unwrap();
        let sessions = SessionStore::new(0);
        sessions.get_or_create("alice");

        let bitmap = source.acquire(&sessions, "alice", true).await.unwrap();
        assert_eq!(sessions.cursor("alice"), Some(3));
        // Cursor 3 → fourth frame, luma 40.
        assert_eq!(frame_luma(&bitmap), 40);
    }

    #[tokio::test]
    async fn wraparound_resets_the_session_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.y4m");
        write_test_y4m(&path, 2);

        let source = VideoSource::open(&path, 0, 1).unwrap();
        let sessions = SessionStore::new(0);
        sessions.get_or_create("alice");

        // Two sequential reads exhaust the stream...
        source.acquire(&sessions, "alice", false).await.unwrap();
        source.acquire(&sessions, "alice", false).await.unwrap();
        sessions.advance("alice", 2);

        // ...so the next read wraps and rewinds the session too.
        let bitmap = source.acquire(&sessions, "alice", false).await.unwrap();
        assert_eq!(frame_luma(&bitmap), 10);
        assert_eq!(sessions.cursor("alice"), Some(0));
    }

    #[test]
    fn yuv_gray_midpoint_is_neutral() {
        assert_eq!(yuv_to_rgb(128, 128, 128), (128, 128, 128));
        assert_eq!(yuv_to_rgb(0, 128, 128), (0, 0, 0));
        assert_eq!(yuv_to_rgb(255, 128, 128), (255, 255, 255));
    }

    #[tokio::test]
    async fn start_frame_positions_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.y4m");
        write_test_y4m(&path, 4);

        let source = VideoSource::open(&path, 2, 1).unwrap();
        let sessions = SessionStore::new(2);
        let bitmap = source.acquire(&sessions, "alice", false).await.unwrap();
        assert_eq!(frame_luma(&bitmap), 30);
    }
}
