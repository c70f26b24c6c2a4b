//! Alpha compositing primitives.
//!
//! Shared by the preview and export compositors: pasting a watermark
//! raster onto a target using the watermark's own alpha channel as the
//! mask, so transparent watermark pixels never overwrite background
//! pixels.

use image::{Rgba, RgbaImage};

/// Blend two pixels with the Porter-Duff "over" operator.
pub fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>) -> Rgba<u8> {
    let fg_alpha = foreground[3] as f32 / 255.0;
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0) as u8,
    ])
}

/// Paste an overlay onto a target at (x, y), alpha-blending pixel by
/// pixel and clipping to the target bounds.
///
/// Coordinates may be negative or exceed the target; only the visible
/// region is touched.
pub fn paste_over(target: &mut RgbaImage, overlay: &RgbaImage, x: i64, y: i64) {
    let target_w = target.width() as i64;
    let target_h = target.height() as i64;
    let overlay_w = overlay.width() as i64;
    let overlay_h = overlay.height() as i64;

    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + overlay_w).min(target_w);
    let y_end = (y + overlay_h).min(target_h);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let ox = (tx - x) as u32;
            let oy = (ty - y) as u32;

            let overlay_pixel = overlay.get_pixel(ox, oy);
            if overlay_pixel[3] == 0 {
                continue;
            }

            let target_pixel = target.get_pixel(tx as u32, ty as u32);
            let blended = blend_pixels(*target_pixel, *overlay_pixel);
            target.put_pixel(tx as u32, ty as u32, blended);
        }
    }
}
