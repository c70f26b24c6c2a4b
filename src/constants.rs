// Constants module - centralized default values for the compositing pipeline
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Watermark sizing
// =============================================================================

/// Multiplier converting the size scalar (0.2 - 8.0) to a pixel size.
/// A size of 1.0 maps to a 60px font height (text) or 60px image height.
pub const BASE_SIZE: u32 = 60;

/// Minimum accepted size scalar
pub const MIN_SIZE_SCALAR: f64 = 0.2;

/// Maximum accepted size scalar
pub const MAX_SIZE_SCALAR: f64 = 8.0;

// =============================================================================
// Style parameter ranges
// =============================================================================

/// Minimum opacity percentage
pub const MIN_OPACITY: u8 = 1;

/// Maximum opacity percentage
pub const MAX_OPACITY: u8 = 100;

/// Minimum rotation in degrees
pub const MIN_ROTATION: i32 = -180;

/// Maximum rotation in degrees
pub const MAX_ROTATION: i32 = 180;

/// Minimum gap between tiles in pixels
pub const MIN_TILE_GAP: u32 = 0;

/// Maximum gap between tiles in pixels
pub const MAX_TILE_GAP: u32 = 200;

// =============================================================================
// Text rendering
// =============================================================================

/// Stroke width in pixels drawn around text glyphs
pub const TEXT_STROKE_WIDTH: i32 = 1;

/// Vertical over-allocation factor for the text canvas. Glyph bounding-box
/// height queries are unreliable for some faces, so the canvas is allocated
/// at twice the reported ink height and re-cropped to the alpha bounding
/// box after drawing.
pub const TEXT_CANVAS_HEIGHT_FACTOR: u32 = 2;

// =============================================================================
// Tiling
// =============================================================================

/// Extra rows/columns added beyond what covers the viewport, so the grid
/// stays full regardless of where the user drags the tiled watermark.
pub const TILE_OVERPROVISION: u32 = 3;

// =============================================================================
// Scheduling
// =============================================================================

/// Minimum interval between consecutive preview renders in milliseconds
pub const PREVIEW_DEBOUNCE_MS: u64 = 500;

// =============================================================================
// Style defaults
// =============================================================================

/// Default text content for a new text watermark
pub const DEFAULT_TEXT: &str = "Text";

/// Default size scalar
pub const DEFAULT_SIZE_SCALAR: f64 = 1.0;

/// Default opacity percentage
pub const DEFAULT_OPACITY: u8 = 100;

/// Default rotation in degrees
pub const DEFAULT_ROTATION: i32 = 0;

/// Default gap between tiles in pixels
pub const DEFAULT_TILE_GAP: u32 = 50;
