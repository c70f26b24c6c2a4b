//! Font resolution and caching.
//!
//! Watermark text is always rendered at bold weight. Families from the
//! fixed UI list are resolved against the system font database; lookups
//! are expensive and style sliders fire repeatedly, so resolved faces are
//! cached by (family, pixel size) key. Weight is not part of the key
//! because it is constant.
//!
//! When a family cannot be resolved (missing from the system, headless
//! environment), rendering falls back to an embedded bold face and logs a
//! warning instead of failing the render.

use crate::style::FontFamily;
use ab_glyph::FontArc;
use font_kit::family_name::FamilyName;
use font_kit::properties::{Properties, Weight};
use font_kit::source::SystemSource;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Embedded fallback face (DejaVu Sans Bold - OFL licensed, commonly available).
const EMBEDDED_FONT_DATA: &[u8] = include_bytes!("fonts/DejaVuSans-Bold.ttf");

static FALLBACK_FONT: OnceLock<FontArc> = OnceLock::new();

/// Get the embedded fallback face, initializing it lazily.
pub fn fallback_font() -> FontArc {
    FALLBACK_FONT
        .get_or_init(|| {
            FontArc::try_from_slice(EMBEDDED_FONT_DATA)
                .expect("Failed to load embedded font - this is a bug")
        })
        .clone()
}

/// Cache key for resolved faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FontKey {
    family: FontFamily,
    px: u32,
}

/// Cache of resolved font faces keyed by (family, pixel size).
#[derive(Default)]
pub struct FontCache {
    faces: HashMap<FontKey, FontArc>,
}

impl FontCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a bold face for the given family and pixel size.
    ///
    /// Returns the cached face when the key has been seen before. On a
    /// miss, queries the system font database; if that fails the embedded
    /// face is cached for the key so the lookup is not retried on every
    /// slider tick.
    pub fn resolve(&mut self, family: FontFamily, px: u32) -> FontArc {
        let key = FontKey { family, px };

        if let Some(face) = self.faces.get(&key) {
            return face.clone();
        }

        let face = match load_system_font(family) {
            Some(face) => {
                debug!(family = family.system_name(), px, "resolved system font");
                face
            }
            None => {
                warn!(
                    family = family.system_name(),
                    "font family not found, falling back to embedded face"
                );
                fallback_font()
            }
        };

        self.faces.insert(key, face.clone());
        face
    }

    /// Number of cached faces.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Load a bold face for the family from the system font database.
///
/// Returns None if no match is found or the face data cannot be loaded.
fn load_system_font(family: FontFamily) -> Option<FontArc> {
    let mut props = Properties::new();
    props.weight = Weight::BOLD;

    let handle = SystemSource::new()
        .select_best_match(
            &[FamilyName::Title(family.system_name().to_string())],
            &props,
        )
        .ok()?;

    let font = handle.load().ok()?;
    let data = font.copy_font_data()?;
    FontArc::try_from_vec((*data).clone()).ok()
}
