//! Viewport fitting and preview/source coordinate mapping.
//!
//! A loaded background is shown on a preview canvas that may be smaller
//! than the original raster. This module computes the fit-to-viewport
//! scale and provides the inverse mapping from preview-space coordinates
//! back to source-space coordinates, used at export time.
//!
//! # Example
//!
//! ```ignore
//! use aquamark::geometry::fit;
//!
//! let preview = fit(1000, 800, 800, 640).unwrap();
//! assert_eq!((preview.width, preview.height), (800, 640));
//! assert_eq!(preview.ratio, 1.25);
//! ```

use crate::error::AquamarkError;

/// Result of fitting a source raster into a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedPreview {
    /// Preview width in pixels
    pub width: u32,
    /// Preview height in pixels
    pub height: u32,
    /// Multiplier converting preview-space lengths back to source space.
    /// 1.0 when the source already fits the viewport.
    pub ratio: f64,
}

/// Compute the preview dimensions for a source raster in a viewport.
///
/// If the source fits within the viewport on both axes it is shown at
/// its native size (ratio 1.0). Otherwise the constraining axis is
/// clamped to the viewport and the other axis scales proportionally.
///
/// # Arguments
///
/// * `source_w`, `source_h` - dimensions of the original raster
/// * `viewport_w`, `viewport_h` - dimensions of the preview canvas
///
/// # Errors
///
/// Returns `AquamarkError::Input` if any dimension is zero. Callers must
/// not pass degenerate dimensions; they are never silently clamped.
pub fn fit(
    source_w: u32,
    source_h: u32,
    viewport_w: u32,
    viewport_h: u32,
) -> Result<FittedPreview, AquamarkError> {
    if source_w == 0 || source_h == 0 {
        return Err(AquamarkError::Input(format!(
            "source dimensions must be positive, got {}x{}",
            source_w, source_h
        )));
    }
    if viewport_w == 0 || viewport_h == 0 {
        return Err(AquamarkError::Input(format!(
            "viewport dimensions must be positive, got {}x{}",
            viewport_w, viewport_h
        )));
    }

    if source_w <= viewport_w && source_h <= viewport_h {
        return Ok(FittedPreview {
            width: source_w,
            height: source_h,
            ratio: 1.0,
        });
    }

    let source_aspect = source_w as f64 / source_h as f64;
    let viewport_aspect = viewport_w as f64 / viewport_h as f64;

    let (width, height) = if source_aspect > viewport_aspect {
        // Width-constrained: clamp width, scale height
        (viewport_w, (viewport_w as f64 / source_aspect) as u32)
    } else {
        // Height-constrained: clamp height, scale width
        ((viewport_h as f64 * source_aspect) as u32, viewport_h)
    };

    let width = width.max(1);
    let height = height.max(1);

    Ok(FittedPreview {
        width,
        height,
        ratio: source_w as f64 / width as f64,
    })
}

/// Convert a preview-space coordinate to source space.
pub fn to_source_coord(preview_coord: i32, ratio: f64) -> i64 {
    (preview_coord as f64 * ratio) as i64
}

/// Convert a preview-space length to source space.
pub fn to_source_len(preview_len: u32, ratio: f64) -> u32 {
    ((preview_len as f64 * ratio) as u32).max(1)
}
