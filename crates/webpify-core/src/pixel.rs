//! Core pixel and option types shared by the resampler, encoder and worker.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Reasons a pixel buffer or a set of options cannot be processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Byte length does not match `width * height * 4`.
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 4), got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// `width * height * 4` does not fit in `usize`.
    #[error("Image dimensions {width}x{height} are too large")]
    DimensionsOverflow { width: u32, height: u32 },

    /// Width, height or byte sequence is empty.
    #[error("Empty pixel buffer ({width}x{height})")]
    Empty { width: u32, height: u32 },

    /// A resize target dimension is zero.
    #[error("Invalid target dimensions: {width}x{height} (both must be non-zero)")]
    ZeroTarget { width: u32, height: u32 },

    /// Quality factor outside 0..=100.
    #[error("Quality {0} is out of range (0-100)")]
    QualityOutOfRange(u8),
}

/// An RGBA8 interleaved pixel buffer, row-major, stride `width * 4`.
///
/// Fields are public because buffers arrive from external decoders and may be
/// malformed; call [`PixelBuffer::validate`] before relying on the invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA bytes. Length should be width * height * 4.
    pub bytes: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer, checking the length invariant.
    pub fn new(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let buffer = Self {
            width,
            height,
            bytes,
        };
        buffer.validate()?;
        Ok(buffer)
    }

    /// Create a buffer where every pixel has the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut bytes = Vec::with_capacity(count * BYTES_PER_PIXEL);
        for _ in 0..count {
            bytes.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            bytes,
        }
    }

    /// Expected byte length for the stated dimensions, `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        expected_len(self.width, self.height)
    }

    /// Check the structural invariant: non-empty and `bytes.len() == w * h * 4`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.width == 0 || self.height == 0 || self.bytes.is_empty() {
            return Err(ValidationError::Empty {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self
            .expected_len()
            .ok_or(ValidationError::DimensionsOverflow {
                width: self.width,
                height: self.height,
            })?;
        if self.bytes.len() != expected {
            return Err(ValidationError::LengthMismatch {
                expected,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    /// RGBA value at `(x, y)`, or `None` when out of bounds or truncated.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.bytes.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Create a PixelBuffer from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            bytes: img.into_raw(),
        }
    }

    /// Convert into an image::RgbaImage. Returns `None` for malformed buffers.
    pub fn into_rgba_image(self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.bytes)
    }
}

/// Byte length of an RGBA8 buffer with the given dimensions.
///
/// Returns `None` when the length does not fit in `usize`.
pub fn expected_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

/// Per-batch conversion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Encoder quality factor (0 to 100)
    pub quality: u8,
    /// Resample before encoding
    pub resize: bool,
    /// Target (or maximum, with `keep_aspect`) width in pixels
    pub target_width: u32,
    /// Target (or maximum, with `keep_aspect`) height in pixels
    pub target_height: u32,
    /// Fit inside the target box instead of stretching to it
    pub keep_aspect: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            quality: 80,
            resize: false,
            target_width: 800,
            target_height: 600,
            keep_aspect: true,
        }
    }
}

impl ConversionOptions {
    /// Options that only set the quality factor.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    /// Options that resample to `width x height` before encoding.
    pub fn resized(quality: u8, width: u32, height: u32, keep_aspect: bool) -> Self {
        Self {
            quality,
            resize: true,
            target_width: width,
            target_height: height,
            keep_aspect,
        }
    }

    /// Check quality range and, when resizing, non-zero targets.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quality > 100 {
            return Err(ValidationError::QualityOutOfRange(self.quality));
        }
        if self.resize && (self.target_width == 0 || self.target_height == 0) {
            return Err(ValidationError::ZeroTarget {
                width: self.target_width,
                height: self.target_height,
            });
        }
        Ok(())
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
