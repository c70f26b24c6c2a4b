//! Watermark style configuration types.
//!
//! This module defines the typed style parameters supplied by the UI layer
//! (or the CLI), validated and snapshotted before each render:
//! - Text watermarks: content, font family, color, size, opacity, rotation
//! - Image watermarks: source path, size, opacity, rotation
//! - Tile mode and gap, shared by both variants
//!
//! Exactly one style is active at a time; replacing it regenerates the
//! rendered watermark.
//!
//! # Example
//!
//! ```yaml
//! type: text
//! text: "Copyright 2025"
//! font: arial
//! color: "#00ADB5"
//! size: 1.5
//! opacity: 60
//! rotation: -45
//! tile: diamond
//! tile_gap: 80
//! ```

use crate::constants::{
    DEFAULT_OPACITY, DEFAULT_ROTATION, DEFAULT_SIZE_SCALAR, DEFAULT_TEXT, DEFAULT_TILE_GAP,
    MAX_OPACITY, MAX_ROTATION, MAX_SIZE_SCALAR, MAX_TILE_GAP, MIN_OPACITY, MIN_ROTATION,
    MIN_SIZE_SCALAR,
};
use crate::error::AquamarkError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Default values
fn default_text() -> String {
    DEFAULT_TEXT.to_string()
}

fn default_color() -> String {
    "#000000".to_string()
}

fn default_size() -> f64 {
    DEFAULT_SIZE_SCALAR
}

fn default_opacity() -> u8 {
    DEFAULT_OPACITY
}

fn default_rotation() -> i32 {
    DEFAULT_ROTATION
}

fn default_tile_gap() -> u32 {
    DEFAULT_TILE_GAP
}

/// Parsed RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Parse a hex color string into RGB components.
///
/// Supports both #RGB and #RRGGBB formats.
///
/// # Examples
///
/// ```ignore
/// let teal = parse_hex_color("#00ADB5").unwrap();
/// assert_eq!(teal, Rgb::new(0, 173, 181));
/// ```
pub fn parse_hex_color(hex: &str) -> Result<Rgb, AquamarkError> {
    let digits = hex
        .strip_prefix('#')
        .ok_or_else(|| AquamarkError::Input("color must start with '#'".to_string()))?;

    let component = |s: &str| {
        u8::from_str_radix(s, 16)
            .map_err(|_| AquamarkError::Input(format!("invalid hex digit in color '{}'", hex)))
    };

    match digits.len() {
        3 => {
            // #RGB format - each digit doubled: 0xF -> 0xFF
            let r = component(&digits[0..1])?;
            let g = component(&digits[1..2])?;
            let b = component(&digits[2..3])?;
            Ok(Rgb::new(r * 17, g * 17, b * 17))
        }
        6 => {
            let r = component(&digits[0..2])?;
            let g = component(&digits[2..4])?;
            let b = component(&digits[4..6])?;
            Ok(Rgb::new(r, g, b))
        }
        n => Err(AquamarkError::Input(format!(
            "color must be #RGB or #RRGGBB format, got {} digits",
            n
        ))),
    }
}

/// Font families offered by the UI layer.
///
/// The list is fixed; resolution to an actual face (always at bold weight)
/// happens in the `fonts` module and may fall back to the embedded face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    Arial,
    CourierNew,
    TimesNewRoman,
    Calibri,
    David,
    SegoeUi,
    #[serde(rename = "dejavu-serif")]
    DejaVuSerif,
    ModernNo20,
}

impl FontFamily {
    /// The family name as known to the system font database.
    pub fn system_name(&self) -> &'static str {
        match self {
            Self::Arial => "Arial",
            Self::CourierNew => "Courier New",
            Self::TimesNewRoman => "Times New Roman",
            Self::Calibri => "Calibri",
            Self::David => "David",
            Self::SegoeUi => "Segoe UI",
            Self::DejaVuSerif => "DejaVu Serif",
            Self::ModernNo20 => "Modern No. 20",
        }
    }
}

impl Default for FontFamily {
    fn default() -> Self {
        Self::Arial
    }
}

/// Whether the watermark is rendered once or repeated in a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TileMode {
    /// One watermark at the anchor position
    Single,
    /// Repeating aligned grid
    Square,
    /// Repeating grid with odd rows offset by half a cell
    Diamond,
}

impl Default for TileMode {
    fn default() -> Self {
        Self::Single
    }
}

/// Watermark style - either text or image.
///
/// Uses a serde tag to distinguish the variants in YAML:
/// ```yaml
/// type: text
/// text: "Copyright"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WatermarkStyle {
    Text(TextStyle),
    Image(ImageStyle),
}

/// Text watermark style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    /// Text content (default: "Text")
    #[serde(default = "default_text")]
    pub text: String,

    /// Font family from the fixed list (default: arial). Weight is
    /// always bold.
    #[serde(default)]
    pub font: FontFamily,

    /// Text color as hex string (default: "#000000")
    #[serde(default = "default_color")]
    pub color: String,

    /// Size scalar, mapped to a pixel font size via `size * BASE_SIZE`
    /// (default: 1.0)
    #[serde(default = "default_size")]
    pub size: f64,

    /// Opacity percentage from 1 to 100 (default: 100)
    #[serde(default = "default_opacity")]
    pub opacity: u8,

    /// Rotation in degrees, positive = counter-clockwise (default: 0)
    #[serde(default = "default_rotation")]
    pub rotation: i32,

    /// Tile mode (default: single)
    #[serde(default)]
    pub tile: TileMode,

    /// Gap between tiles in pixels (default: 50)
    #[serde(default = "default_tile_gap")]
    pub tile_gap: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            text: default_text(),
            font: FontFamily::default(),
            color: default_color(),
            size: default_size(),
            opacity: default_opacity(),
            rotation: default_rotation(),
            tile: TileMode::default(),
            tile_gap: default_tile_gap(),
        }
    }
}

/// Image (logo) watermark style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageStyle {
    /// Path to the logo image file. Decoded to RGBA by the loader; the
    /// decoded raster is re-copied fresh on every render.
    pub source: PathBuf,

    /// Size scalar, mapped to a pixel target height via `size * BASE_SIZE`
    /// (default: 1.0)
    #[serde(default = "default_size")]
    pub size: f64,

    /// Opacity percentage from 1 to 100 (default: 100)
    #[serde(default = "default_opacity")]
    pub opacity: u8,

    /// Rotation in degrees, positive = counter-clockwise (default: 0)
    #[serde(default = "default_rotation")]
    pub rotation: i32,

    /// Tile mode (default: single)
    #[serde(default)]
    pub tile: TileMode,

    /// Gap between tiles in pixels (default: 50)
    #[serde(default = "default_tile_gap")]
    pub tile_gap: u32,
}

fn validate_shared(size: f64, opacity: u8, rotation: i32, tile_gap: u32) -> Result<(), String> {
    if !size.is_finite() || !(MIN_SIZE_SCALAR..=MAX_SIZE_SCALAR).contains(&size) {
        return Err(format!(
            "size must be a finite value between {} and {}, got {}",
            MIN_SIZE_SCALAR, MAX_SIZE_SCALAR, size
        ));
    }

    if !(MIN_OPACITY..=MAX_OPACITY).contains(&opacity) {
        return Err(format!(
            "opacity must be between {} and {}, got {}",
            MIN_OPACITY, MAX_OPACITY, opacity
        ));
    }

    if !(MIN_ROTATION..=MAX_ROTATION).contains(&rotation) {
        return Err(format!(
            "rotation must be between {} and {} degrees, got {}",
            MIN_ROTATION, MAX_ROTATION, rotation
        ));
    }

    if tile_gap > MAX_TILE_GAP {
        return Err(format!(
            "tile gap must be at most {}, got {}",
            MAX_TILE_GAP, tile_gap
        ));
    }

    Ok(())
}

impl TextStyle {
    /// Validate the text watermark style.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.is_empty() {
            return Err("text watermark 'text' field cannot be empty".to_string());
        }

        // Validate hex color format (#RGB or #RRGGBB)
        if let Some(digits) = self.color.strip_prefix('#') {
            let len = digits.len();
            if (len != 3 && len != 6) || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!(
                    "color must be in #RGB or #RRGGBB format with valid hex characters, got '{}'",
                    self.color
                ));
            }
        } else {
            return Err(format!(
                "color must be a hex string starting with '#', got '{}'",
                self.color
            ));
        }

        validate_shared(self.size, self.opacity, self.rotation, self.tile_gap)
    }

    /// The font pixel size this style maps to.
    pub fn font_px(&self) -> u32 {
        (self.size * crate::constants::BASE_SIZE as f64).round() as u32
    }
}

impl ImageStyle {
    /// Validate the image watermark style.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.as_os_str().is_empty() {
            return Err("image watermark 'source' field cannot be empty".to_string());
        }

        validate_shared(self.size, self.opacity, self.rotation, self.tile_gap)
    }

    /// The target pixel height this style maps to.
    pub fn target_height_px(&self) -> u32 {
        (self.size * crate::constants::BASE_SIZE as f64).round() as u32
    }
}

impl WatermarkStyle {
    /// Validate the style.
    pub fn validate(&self) -> Result<(), AquamarkError> {
        let result = match self {
            Self::Text(style) => style.validate(),
            Self::Image(style) => style.validate(),
        };
        result.map_err(AquamarkError::Input)
    }

    /// Tile mode shared by both variants.
    pub fn tile(&self) -> TileMode {
        match self {
            Self::Text(style) => style.tile,
            Self::Image(style) => style.tile,
        }
    }

    /// Tile gap shared by both variants.
    pub fn tile_gap(&self) -> u32 {
        match self {
            Self::Text(style) => style.tile_gap,
            Self::Image(style) => style.tile_gap,
        }
    }
}
