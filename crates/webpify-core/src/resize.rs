//! Bilinear resampling of RGBA8 pixel buffers.
//!
//! Source coordinates are mapped top-left aligned (`src_x = x * scale`), not
//! pixel-center aligned. At small scale factors this biases the output by up to
//! half a source pixel toward the top-left. The mapping is kept as is; changing
//! it alters output bytes for every resized image.
//!
//! Older documentation called this "bicubic". It is, and always was, a
//! four-neighbour bilinear blend.

use crate::pixel::{
    expected_len, ConversionOptions, PixelBuffer, ValidationError, BYTES_PER_PIXEL,
};

/// Resize a pixel buffer to exact dimensions with bilinear interpolation.
///
/// # Arguments
///
/// * `src` - The source buffer (must satisfy the RGBA8 length invariant)
/// * `target_width` - Target width in pixels
/// * `target_height` - Target height in pixels
///
/// # Returns
///
/// A new buffer of exactly `target_width x target_height` pixels.
///
/// # Errors
///
/// Returns `ValidationError::ZeroTarget` if either target dimension is zero,
/// or the source's own validation error if it is malformed.
pub fn resize(
    src: &PixelBuffer,
    target_width: u32,
    target_height: u32,
) -> Result<PixelBuffer, ValidationError> {
    if target_width == 0 || target_height == 0 {
        return Err(ValidationError::ZeroTarget {
            width: target_width,
            height: target_height,
        });
    }
    src.validate()?;

    let src_w = src.width as usize;
    let src_h = src.height as usize;
    let dst_w = target_width as usize;
    let dst_h = target_height as usize;

    let scale_x = src.width as f64 / target_width as f64;
    let scale_y = src.height as f64 / target_height as f64;

    let data = &src.bytes;
    let len = expected_len(target_width, target_height).ok_or(
        ValidationError::DimensionsOverflow {
            width: target_width,
            height: target_height,
        },
    )?;
    let mut out = vec![0u8; len];

    for y in 0..dst_h {
        let src_y = y as f64 * scale_y;
        let y0 = (src_y.floor() as usize).min(src_h - 1);
        let y1 = (y0 + 1).min(src_h - 1);
        let wy = src_y - y0 as f64;

        for x in 0..dst_w {
            let src_x = x as f64 * scale_x;
            let x0 = (src_x.floor() as usize).min(src_w - 1);
            let x1 = (x0 + 1).min(src_w - 1);
            let wx = src_x - x0 as f64;

            let w00 = (1.0 - wx) * (1.0 - wy);
            let w01 = (1.0 - wx) * wy;
            let w10 = wx * (1.0 - wy);
            let w11 = wx * wy;

            let i00 = (y0 * src_w + x0) * BYTES_PER_PIXEL;
            let i01 = (y1 * src_w + x0) * BYTES_PER_PIXEL;
            let i10 = (y0 * src_w + x1) * BYTES_PER_PIXEL;
            let i11 = (y1 * src_w + x1) * BYTES_PER_PIXEL;
            let dst = (y * dst_w + x) * BYTES_PER_PIXEL;

            for c in 0..BYTES_PER_PIXEL {
                let value = w00 * data[i00 + c] as f64
                    + w01 * data[i01 + c] as f64
                    + w10 * data[i10 + c] as f64
                    + w11 * data[i11 + c] as f64;
                out[dst + c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Ok(PixelBuffer {
        width: target_width,
        height: target_height,
        bytes: out,
    })
}

/// Resize a buffer to fit inside `max_width x max_height`, preserving aspect ratio.
///
/// The limiting side is set to its maximum and the other side is derived from
/// the source aspect ratio. Small images are scaled up to fill the box.
///
/// # Errors
///
/// Same as [`resize`].
pub fn resize_keep_aspect(
    src: &PixelBuffer,
    max_width: u32,
    max_height: u32,
) -> Result<PixelBuffer, ValidationError> {
    if max_width == 0 || max_height == 0 {
        return Err(ValidationError::ZeroTarget {
            width: max_width,
            height: max_height,
        });
    }
    src.validate()?;

    let (width, height) = fit_dimensions(src.width, src.height, max_width, max_height);
    resize(src, width, height)
}

/// Calculate the aspect-preserving dimensions for `resize_keep_aspect`.
///
/// A side that rounds to zero (extreme aspect ratios) is raised to 1.
pub fn fit_dimensions(
    src_width: u32,
    src_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (0, 0);
    }

    let ratio = src_width as f64 / src_height as f64;

    if max_width as f64 / max_height as f64 > ratio {
        // Height is the limiting factor
        let width = (max_height as f64 * ratio).round() as u32;
        (width.max(1), max_height)
    } else {
        // Width is the limiting factor
        let height = (max_width as f64 / ratio).round() as u32;
        (max_width, height.max(1))
    }
}

/// Apply the resize settings of `options` to an owned buffer.
///
/// Returns the source untouched when resizing is disabled or the computed
/// target already matches the source dimensions.
pub fn resize_for_options(
    src: PixelBuffer,
    options: &ConversionOptions,
) -> Result<PixelBuffer, ValidationError> {
    if !options.resize {
        return Ok(src);
    }

    let (width, height) = if options.keep_aspect {
        if options.target_width == 0 || options.target_height == 0 {
            return Err(ValidationError::ZeroTarget {
                width: options.target_width,
                height: options.target_height,
            });
        }
        fit_dimensions(
            src.width,
            src.height,
            options.target_width,
            options.target_height,
        )
    } else {
        (options.target_width, options.target_height)
    };

    if width == src.width && height == src.height {
        src.validate()?;
        return Ok(src);
    }

    resize(&src, width, height)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
