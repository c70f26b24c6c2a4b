//! Preview compositor: watermark placement on the preview canvas.
//!
//! Owns the current rendered watermark raster (post-tiling, if tiling is
//! enabled) and its anchor position in preview coordinates. The anchor is
//! the watermark's center point; it is initialized to the canvas center
//! when a watermark is first created, survives style edits, and moves only
//! through the drag protocol.
//!
//! Drag protocol: on press the pointer position is recorded; each move
//! translates the anchor by the delta from the previously recorded pointer
//! position (deltas are cumulative per event, not measured against the
//! press point) and re-records the position; release clears the drag
//! state. Moves without an active drag are ignored.
//!
//! The anchor is never clamped: a watermark may be dragged partially or
//! fully outside the visible canvas.

use crate::compose::paste_over;
use image::RgbaImage;

/// Center position of the watermark in preview coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkPlacement {
    pub x: i32,
    pub y: i32,
}

impl WatermarkPlacement {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Preview-canvas state: background, active watermark raster and anchor.
pub struct PreviewCompositor {
    background: RgbaImage,
    ratio: f64,
    watermark: Option<RgbaImage>,
    anchor: WatermarkPlacement,
    drag_from: Option<(i32, i32)>,
}

impl PreviewCompositor {
    /// Create a compositor over a preview-resized background.
    ///
    /// `ratio` converts preview lengths back to source lengths at export.
    pub fn new(background: RgbaImage, ratio: f64) -> Self {
        let anchor = WatermarkPlacement::new(
            background.width() as i32 / 2,
            background.height() as i32 / 2,
        );
        Self {
            background,
            ratio,
            watermark: None,
            anchor,
            drag_from: None,
        }
    }

    /// Preview canvas dimensions.
    pub fn viewport(&self) -> (u32, u32) {
        (self.background.width(), self.background.height())
    }

    /// Preview-to-source ratio.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// The current anchor (watermark center) in preview coordinates.
    pub fn anchor(&self) -> WatermarkPlacement {
        self.anchor
    }

    /// The active watermark raster, if any.
    pub fn watermark(&self) -> Option<&RgbaImage> {
        self.watermark.as_ref()
    }

    /// Install or replace the rendered watermark raster.
    ///
    /// The first watermark after creation (or after `remove`) is centered
    /// in the viewport. Replacing an existing raster keeps the current
    /// anchor, so repositioning is sticky across style edits.
    pub fn set_watermark(&mut self, raster: RgbaImage) {
        if self.watermark.is_none() {
            self.anchor = WatermarkPlacement::new(
                self.background.width() as i32 / 2,
                self.background.height() as i32 / 2,
            );
        }
        self.watermark = Some(raster);
    }

    /// Discard the watermark and its placement.
    pub fn remove(&mut self) {
        self.watermark = None;
        self.drag_from = None;
    }

    /// Translate the anchor by a pixel delta. Never clamped to the
    /// viewport.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.anchor.x += dx;
        self.anchor.y += dy;
    }

    /// Begin a drag at the given pointer position.
    pub fn press(&mut self, x: i32, y: i32) {
        if self.watermark.is_some() {
            self.drag_from = Some((x, y));
        }
    }

    /// Continue a drag: translate by the delta from the last recorded
    /// pointer position and record the new one. Ignored when no drag is
    /// active.
    pub fn drag_to(&mut self, x: i32, y: i32) {
        if let Some((from_x, from_y)) = self.drag_from {
            self.translate(x - from_x, y - from_y);
            self.drag_from = Some((x, y));
        }
    }

    /// End the drag.
    pub fn release(&mut self) {
        self.drag_from = None;
    }

    /// Whether a drag is currently active.
    pub fn dragging(&self) -> bool {
        self.drag_from.is_some()
    }

    /// Flatten the current overlay state onto a copy of the preview
    /// background.
    pub fn compose(&self) -> RgbaImage {
        let mut canvas = self.background.clone();

        if let Some(watermark) = &self.watermark {
            let x = self.anchor.x as i64 - watermark.width() as i64 / 2;
            let y = self.anchor.y as i64 - watermark.height() as i64 / 2;
            paste_over(&mut canvas, watermark, x, y);
        }

        canvas
    }
}
