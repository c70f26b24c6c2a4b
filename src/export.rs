//! Export compositor: flattening at source resolution.
//!
//! Maps the preview-space watermark placement back to the full-resolution
//! background and produces the final output raster:
//!
//! 1. Scale the watermark raster by the preview-to-source ratio
//!    (bicubic, via fast-image-resize).
//! 2. Convert the center anchor to a top-left paste position in source
//!    coordinates.
//! 3. Paste onto a copy of the original background using the watermark's
//!    alpha channel as the mask.
//! 4. Write the flattened raster to the requested path (PNG when the
//!    extension names no known format).
//!
//! This is the only stage operating at full source resolution and can take
//! perceptibly long; callers run it off the interactive thread (see the
//! scheduler module).

use crate::compose::paste_over;
use crate::error::AquamarkError;
use crate::preview::WatermarkPlacement;
use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::{ImageFormat, RgbaImage};
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Scale a watermark raster from preview space to source space.
///
/// A ratio of 1.0 returns an unscaled copy.
pub fn scale_to_source(watermark: &RgbaImage, ratio: f64) -> Result<RgbaImage, AquamarkError> {
    if ratio == 1.0 {
        return Ok(watermark.clone());
    }

    let target_w = ((watermark.width() as f64 * ratio) as u32).max(1);
    let target_h = ((watermark.height() as f64 * ratio) as u32).max(1);

    let src_width = NonZeroU32::new(watermark.width())
        .ok_or_else(|| AquamarkError::Export("watermark width is 0".to_string()))?;
    let src_height = NonZeroU32::new(watermark.height())
        .ok_or_else(|| AquamarkError::Export("watermark height is 0".to_string()))?;
    let dst_width = NonZeroU32::new(target_w)
        .ok_or_else(|| AquamarkError::Export("scaled width is 0".to_string()))?;
    let dst_height = NonZeroU32::new(target_h)
        .ok_or_else(|| AquamarkError::Export("scaled height is 0".to_string()))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        watermark.as_raw().clone(),
        PixelType::U8x4,
    )
    .map_err(|e| AquamarkError::Export(format!("failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::CatmullRom));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| AquamarkError::Export(format!("resize operation failed: {:?}", e)))?;

    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| AquamarkError::Export("failed to create output image buffer".to_string()))
}

/// Flatten the watermark onto a copy of the full-resolution background.
///
/// `anchor` is the watermark center in preview coordinates; `ratio`
/// converts preview space to source space. The paste position is
/// `anchor * ratio - scaled_dimension / 2` on each axis.
pub fn compose_export(
    background: &RgbaImage,
    watermark: &RgbaImage,
    anchor: WatermarkPlacement,
    ratio: f64,
) -> Result<RgbaImage, AquamarkError> {
    let scaled = scale_to_source(watermark, ratio)?;

    let x = (anchor.x as f64 * ratio - scaled.width() as f64 / 2.0) as i64;
    let y = (anchor.y as f64 * ratio - scaled.height() as f64 / 2.0) as i64;

    let mut output = background.clone();
    paste_over(&mut output, &scaled, x, y);

    Ok(output)
}

/// Write a flattened raster to disk.
///
/// The format follows the path extension; an unrecognized or missing
/// extension falls back to PNG.
pub fn write_raster(raster: &RgbaImage, path: &Path) -> Result<(), AquamarkError> {
    let result = match ImageFormat::from_path(path) {
        Ok(_) => raster.save(path),
        Err(_) => raster.save_with_format(path, ImageFormat::Png),
    };

    result.map_err(|e| AquamarkError::Export(format!("{}: {}", path.display(), e)))
}

/// Compose and persist the final output raster.
pub fn export_to_file(
    background: &RgbaImage,
    watermark: &RgbaImage,
    anchor: WatermarkPlacement,
    ratio: f64,
    path: &Path,
) -> Result<(), AquamarkError> {
    let started = Instant::now();

    let output = compose_export(background, watermark, anchor, ratio)?;
    write_raster(&output, path)?;

    info!(
        output = %path.display(),
        width = output.width(),
        height = output.height(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "export complete"
    );

    Ok(())
}
