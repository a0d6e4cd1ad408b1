//! Wire pixel-format encoding.
//!
//! Converts a [`RawBitmap`] into one wire [`Frame`]:
//!
//! 1. Bilinear resize to the configured output resolution.
//! 2. Per-pixel channel normalization, optionally quantized to the high
//!    4 bits of each channel (`(c >> 4) / 15`) to shrink the payload.
//! 3. Flatten in **reverse** pixel order (last pixel first). The polling
//!    client reconstructs its texture assuming exactly this order — it is
//!    a wire contract, not an optimization.

use crate::error::CastError;
use crate::frame::{Frame, RawBitmap};

/// Converts raw bitmaps into wire frames at a fixed output resolution.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    width: u32,
    height: u32,
    quantize: bool,
}

impl FrameEncoder {
    /// Encoder producing `width`×`height` frames, optionally quantized.
    pub fn new(width: u32, height: u32, quantize: bool) -> Self {
        Self {
            width,
            height,
            quantize,
        }
    }

    /// Encode one bitmap into a wire frame of length `width * height * 4`.
    ///
    /// Failures here are per-frame: the server degrades them to an empty
    /// frame and the batch still completes.
    pub fn encode(&self, bitmap: &RawBitmap) -> Result<Frame, CastError> {
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(CastError::Encode("source bitmap is empty".into()));
        }

        let resized = if bitmap.width() == self.width && bitmap.height() == self.height {
            bitmap.data().to_vec()
        } else {
            resize_bilinear(bitmap, self.width, self.height)
        };

        let pixel_count = self.width as usize * self.height as usize;
        let mut frame = Vec::with_capacity(pixel_count * 4);
        for i in (0..pixel_count).rev() {
            let p = &resized[i * 4..i * 4 + 4];
            if self.quantize {
                frame.push((p[0] >> 4) as f32 / 15.0);
                frame.push((p[1] >> 4) as f32 / 15.0);
                frame.push((p[2] >> 4) as f32 / 15.0);
            } else {
                frame.push(p[0] as f32 / 255.0);
                frame.push(p[1] as f32 / 255.0);
                frame.push(p[2] as f32 / 255.0);
            }
            frame.push(1.0);
        }
        Ok(frame)
    }
}

// ── Bilinear resize ──────────────────────────────────────────────

/// Resample an RGBA bitmap to `dst_w`×`dst_h` with bilinear filtering.
///
/// Sample positions are pixel centers, so an identity-size resize
/// reproduces the source exactly.
fn resize_bilinear(src: &RawBitmap, dst_w: u32, dst_h: u32) -> Vec<u8> {
    let (sw, sh) = (src.width() as usize, src.height() as usize);
    let (dw, dh) = (dst_w as usize, dst_h as usize);
    let data = src.data();

    let x_ratio = sw as f32 / dw as f32;
    let y_ratio = sh as f32 / dh as f32;

    let mut out = vec![0u8; dw * dh * 4];
    for dy in 0..dh {
        let sy = ((dy as f32 + 0.5) * y_ratio - 0.5).clamp(0.0, (sh - 1) as f32);
        let y0 = sy as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let ty = sy - y0 as f32;

        for dx in 0..dw {
            let sx = ((dx as f32 + 0.5) * x_ratio - 0.5).clamp(0.0, (sw - 1) as f32);
            let x0 = sx as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let tx = sx - x0 as f32;

            let o = (dy * dw + dx) * 4;
            for c in 0..4 {
                let p00 = data[(y0 * sw + x0) * 4 + c] as f32;
                let p10 = data[(y0 * sw + x1) * 4 + c] as f32;
                let p01 = data[(y1 * sw + x0) * 4 + c] as f32;
                let p11 = data[(y1 * sw + x1) * 4 + c] as f32;
                let top = p00 + (p10 - p00) * tx;
                let bottom = p01 + (p11 - p01) * tx;
                out[o + c] = (top + (bottom - top) * ty).round() as u8;
            }
        }
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────
