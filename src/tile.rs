//! Tile compositor for repeating watermark grids.
//!
//! Replicates a rendered watermark into a grid covering the preview
//! viewport. The grid is over-provisioned by a few rows and columns so
//! coverage stays complete wherever the user drags the tiled raster.
//! Diamond mode staggers every odd row by half a cell, producing a
//! brick-like pattern.
//!
//! The gridded raster replaces the single watermark for all downstream
//! placement and compositing.

use crate::constants::TILE_OVERPROVISION;
use crate::style::TileMode;
use image::{imageops, RgbaImage};

/// Replicate a watermark raster into a grid covering `cover_w` x `cover_h`.
///
/// Each cell is the watermark plus `gap` pixels of spacing. With `diamond`
/// set, odd rows are offset to the right by half a cell.
pub fn tile_grid(image: &RgbaImage, gap: u32, diamond: bool, cover_w: u32, cover_h: u32) -> RgbaImage {
    let cell_w = image.width() + gap;
    let cell_h = image.height() + gap;

    let rows = cover_h / cell_h + TILE_OVERPROVISION;
    let cols = cover_w / cell_w + TILE_OVERPROVISION;

    let mut grid = RgbaImage::new(cols * cell_w, rows * cell_h);

    for row in 0..rows {
        for col in 0..cols {
            let mut x = (col * cell_w) as i64;
            let y = (row * cell_h) as i64;

            if diamond && row % 2 == 1 {
                x += (cell_w / 2) as i64;
            }

            imageops::replace(&mut grid, image, x, y);
        }
    }

    grid
}

/// Apply the styled tile mode to a rendered watermark.
///
/// Single mode returns the raster unchanged.
pub fn apply_tiling(
    image: RgbaImage,
    mode: TileMode,
    gap: u32,
    cover_w: u32,
    cover_h: u32,
) -> RgbaImage {
    match mode {
        TileMode::Single => image,
        TileMode::Square => tile_grid(&image, gap, false, cover_w, cover_h),
        TileMode::Diamond => tile_grid(&image, gap, true, cover_w, cover_h),
    }
}
