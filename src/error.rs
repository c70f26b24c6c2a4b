// Error types module

use std::fmt;

/// Centralized error type for the compositing pipeline
///
/// Categorizes errors into the stages where they occur so callers
/// (the CLI today, a GUI shell tomorrow) can report them appropriately.
#[derive(Debug, Clone)]
pub enum AquamarkError {
    /// Invalid input at a boundary (bad path, non-positive dimensions,
    /// out-of-range style parameter)
    Input(String),

    /// Failed to decode an image file
    Decode(String),

    /// Font resolution failed and no fallback was possible
    Font(String),

    /// Failed to rasterize the watermark
    Render(String),

    /// Failed to composite or write the exported image
    Export(String),
}

impl fmt::Display for AquamarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AquamarkError::Input(msg) => write!(f, "Invalid input: {}", msg),
            AquamarkError::Decode(msg) => write!(f, "Failed to decode image: {}", msg),
            AquamarkError::Font(msg) => write!(f, "Font error: {}", msg),
            AquamarkError::Render(msg) => write!(f, "Failed to render watermark: {}", msg),
            AquamarkError::Export(msg) => write!(f, "Failed to export image: {}", msg),
        }
    }
}

impl std::error::Error for AquamarkError {}
