//! Shared frame types used across the capture/encode pipeline.
//!
//! [`RawBitmap`] is the **internal** representation produced by frame
//! sources; [`Frame`] is the flattened, normalized *wire* representation
//! carried inside batch responses.

use bytes::Bytes;

use crate::error::CastError;

/// One encoded wire frame: flattened `(r, g, b, a)` channel values in
/// `[0, 1]`, four per pixel, in **reverse** pixel order relative to the
/// row-major scan of the source bitmap. An empty `Vec` is the degraded
/// "empty frame" emitted when capture or encoding failed for one slot.
pub type Frame = Vec<f32>;

// ── RawBitmap ────────────────────────────────────────────────────

/// A raw captured image, tightly packed RGBA8 (no row padding).
///
/// Frame sources normalize whatever the OS or decoder hands them
/// (BGRA with stride padding, YUV planes) into this one layout so the
/// encoder only deals with a single pixel format.
#[derive(Debug, Clone)]
pub struct RawBitmap {
    width: u32,
    height: u32,
    data: Bytes,
}

impl RawBitmap {
    /// Wrap an RGBA8 buffer. Fails if the buffer length does not match
    /// `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: impl Into<Bytes>) -> Result<Self, CastError> {
        let data = data.into();
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(CastError::Encode(format!(
                "bitmap buffer is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A single-color bitmap. Used by synthetic sources and tests.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// Bitmap width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Bitmap height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The packed RGBA bytes, `width * height * 4` long.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The RGBA bytes of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        &self.data[offset..offset + 4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgba_validates_length() {
        assert!(RawBitmap::from_rgba(2, 2, vec![0u8; 16]).is_ok());
        assert!(RawBitmap::from_rgba(2, 2, vec![0u8; 15]).is_err());
    }

    #[test]
    fn solid_fills_every_pixel() {
        let bmp = RawBitmap::solid(3, 2, [10, 20, 30, 255]);
        assert_eq!(bmp.data().len(), 3 * 2 * 4);
        assert_eq!(bmp.pixel(2, 1), &[10, 20, 30, 255]);
    }
}
