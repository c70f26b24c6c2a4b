//! Background and logo loading.
//!
//! Decodes raster files (PNG, BMP, JPEG and friends) into RGBA, fits the
//! background into the preview viewport and produces the downscaled
//! preview copy. Drag-and-drop payloads arrive with brace-wrapping and
//! quoting artifacts; `clean_drop_path` strips them before path use.
//!
//! A load failure leaves no partial state: callers keep whatever session
//! they had.

use crate::error::AquamarkError;
use crate::geometry::{fit, FittedPreview};
use image::imageops::FilterType;
use image::{imageops, DynamicImage, RgbaImage};
use std::path::Path;
use tracing::info;

/// A background ready for the preview canvas.
pub struct LoadedBackground {
    /// The original full-resolution raster
    pub original: RgbaImage,
    /// The preview-resized copy shown on the canvas
    pub preview: RgbaImage,
    /// Fit result, including the preview-to-source ratio
    pub fitted: FittedPreview,
}

/// Strip drag-and-drop payload artifacts from a path string.
///
/// Drop payloads may arrive brace-wrapped (`{C:\path with spaces\a.png}`),
/// with embedded newlines, or surrounded by double quotes.
pub fn clean_drop_path(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .trim_matches(|c| c == '{' || c == '}')
        .replace('\n', "");

    if cleaned.len() >= 2 && cleaned.starts_with('"') && cleaned.ends_with('"') {
        cleaned[1..cleaned.len() - 1].to_string()
    } else {
        cleaned
    }
}

/// Decode an image file into a DynamicImage.
fn decode_image(path: &Path) -> Result<DynamicImage, AquamarkError> {
    image::io::Reader::open(path)
        .map_err(|e| AquamarkError::Decode(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| AquamarkError::Decode(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| AquamarkError::Decode(format!("{}: {}", path.display(), e)))
}

/// Load a background image and fit it into the preview viewport.
///
/// # Errors
///
/// Returns `AquamarkError::Decode` for unreadable or corrupt files and
/// `AquamarkError::Input` for degenerate viewport dimensions.
pub fn load_background(
    path: &Path,
    viewport_w: u32,
    viewport_h: u32,
) -> Result<LoadedBackground, AquamarkError> {
    let original = decode_image(path)?.to_rgba8();

    let fitted = fit(original.width(), original.height(), viewport_w, viewport_h)?;

    let preview = if fitted.ratio == 1.0 {
        original.clone()
    } else {
        imageops::resize(&original, fitted.width, fitted.height, FilterType::CatmullRom)
    };

    info!(
        source = %path.display(),
        source_size = format!("{}x{}", original.width(), original.height()),
        preview_size = format!("{}x{}", fitted.width, fitted.height),
        ratio = fitted.ratio,
        "background loaded"
    );

    Ok(LoadedBackground {
        original,
        preview,
        fitted,
    })
}

/// Load a logo image for an image watermark, converted to RGBA.
pub fn load_logo(path: &Path) -> Result<RgbaImage, AquamarkError> {
    let logo = decode_image(path)?.to_rgba8();

    info!(
        source = %path.display(),
        size = format!("{}x{}", logo.width(), logo.height()),
        "logo loaded"
    );

    Ok(logo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        let img = RgbaImage::from_pixel(w, h, Rgba([120, 130, 140, 255]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_clean_drop_path_braces() {
        assert_eq!(
            clean_drop_path("{C:/photos/my image.png}"),
            "C:/photos/my image.png"
        );
    }

    #[test]
    fn test_clean_drop_path_quotes() {
        assert_eq!(
            clean_drop_path("\"/home/user/photo.jpg\""),
            "/home/user/photo.jpg"
        );
    }

    #[test]
    fn test_clean_drop_path_newlines_and_whitespace() {
        assert_eq!(
            clean_drop_path(" {/tmp/a\n.png} "),
            "/tmp/a.png"
        );
    }

    #[test]
    fn test_clean_drop_path_clean_input_untouched() {
        assert_eq!(clean_drop_path("/tmp/plain.png"), "/tmp/plain.png");
    }

    #[test]
    fn test_clean_drop_path_unbalanced_quote_kept() {
        assert_eq!(clean_drop_path("\"/tmp/odd.png"), "\"/tmp/odd.png");
    }

    // Test: Oversized background is downscaled with the fit ratio
    #[test]
    fn test_load_background_downscales() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "bg.png", 1600, 400);

        let loaded = load_background(&path, 800, 600).unwrap();
        assert_eq!(loaded.original.dimensions(), (1600, 400));
        assert_eq!(loaded.preview.dimensions(), (800, 200));
        assert_eq!(loaded.fitted.ratio, 2.0);
    }

    // Test: Small background keeps its native size
    #[test]
    fn test_load_background_native_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "bg.png", 300, 200);

        let loaded = load_background(&path, 800, 600).unwrap();
        assert_eq!(loaded.preview.dimensions(), (300, 200));
        assert_eq!(loaded.fitted.ratio, 1.0);
        assert_eq!(loaded.preview.as_raw(), loaded.original.as_raw());
    }

    // Test: Missing file is a decode error, no partial state
    #[test]
    fn test_load_background_missing_file() {
        let result = load_background(Path::new("/does/not/exist.png"), 800, 600);
        assert!(matches!(result, Err(AquamarkError::Decode(_))));
    }

    // Test: Corrupt file is a decode error
    #[test]
    fn test_load_background_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"not an image at all").unwrap();

        let result = load_background(&path, 800, 600);
        assert!(matches!(result, Err(AquamarkError::Decode(_))));
    }

    // Test: Logos decode to RGBA whatever the source color type
    #[test]
    fn test_load_logo_converts_to_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.jpg");
        let rgb = image::RgbImage::from_pixel(32, 16, image::Rgb([200, 100, 50]));
        rgb.save(&path).unwrap();

        let logo = load_logo(&path).unwrap();
        assert_eq!(logo.dimensions(), (32, 16));
        assert!(logo.pixels().all(|p| p[3] == 255));
    }
}
