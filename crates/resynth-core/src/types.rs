//! Shared types for the resynthesis pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{HostError, LayerId};
use crate::writeback::WriteTarget;

/// Re-export `GrayImage` so downstream crates can build coverage planes
/// and inspect fill masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage`: the colour input and output of a synthesizer.
pub use image::RgbImage;

/// Re-export `RgbaImage` so downstream crates can hand layer contents to
/// [`MemoryDocument`](crate::memory::MemoryDocument).
pub use image::RgbaImage;

/// Document dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned pixel rectangle with its origin at the top-left corner.
///
/// Used both for the host-supplied selection bounds and for the working
/// region computed by [`compute_region`](crate::region::compute_region).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (pixels from the document's left edge).
    pub x: u32,
    /// Top edge (pixels from the document's top edge).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge, widened so it cannot overflow.
    #[must_use]
    pub const fn right(self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge, widened so it cannot overflow.
    #[must_use]
    pub const fn bottom(self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// The rectangle's width and height.
    #[must_use]
    pub const fn dimensions(self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Total number of pixels covered.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` if the rectangle lies entirely inside a document of
    /// the given dimensions.
    #[must_use]
    pub const fn fits_within(self, bounds: Dimensions) -> bool {
        self.right() <= bounds.width as u64 && self.bottom() <= bounds.height as u64
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

/// Configuration for one resynthesis run.
///
/// Replaces the host's persisted settings: the caller reads whatever
/// preferences it stores and passes them in explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResynthConfig {
    /// Context pixels added on every side of the selection before clamping
    /// to the document. Must be non-negative.
    pub padding: i32,

    /// Where the synthesized pixels are written.
    pub target: WriteTarget,

    /// Name given to the layer created by
    /// [`WriteTarget::NewLayerBesideSource`].
    pub layer_name: String,
}

impl ResynthConfig {
    /// Default context padding in pixels.
    pub const DEFAULT_PADDING: i32 = 100;

    /// Smallest padding a control surface should offer.
    pub const RECOMMENDED_MIN_PADDING: i32 = 10;

    /// Largest padding a control surface should offer.
    pub const RECOMMENDED_MAX_PADDING: i32 = 2000;

    /// Default name for a newly created result layer.
    pub const DEFAULT_LAYER_NAME: &'static str = "Resynthesize";

    /// Check the configuration for values the pipeline cannot honor.
    ///
    /// Padding outside the recommended range is accepted; only negative
    /// padding is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ResynthError::InvalidPadding`] for negative padding and
    /// [`ResynthError::InvalidConfig`] for a blank layer name when a new
    /// layer is requested.
    pub fn validate(&self) -> Result<(), ResynthError> {
        if self.padding < 0 {
            return Err(ResynthError::InvalidPadding(self.padding));
        }
        if self.target == WriteTarget::NewLayerBesideSource && self.layer_name.trim().is_empty() {
            return Err(ResynthError::InvalidConfig(
                "layer_name must not be blank when creating a new layer".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ResynthConfig {
    fn default() -> Self {
        Self {
            padding: Self::DEFAULT_PADDING,
            target: WriteTarget::default(),
            layer_name: Self::DEFAULT_LAYER_NAME.to_string(),
        }
    }
}

/// Result of a completed resynthesis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResynthOutcome {
    /// Selection bounds as reported by the host.
    pub selection: Rect,

    /// Padded, clamped region that was read and rewritten.
    pub region: Rect,

    /// Layer that received the synthesized pixels.
    pub layer: LayerId,

    /// Whether `layer` was created by this run.
    pub created_layer: bool,

    /// Number of pixels the mask marked for filling.
    pub fill_pixels: u64,
}

/// Which raw buffer an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Interleaved 8-bit RGBA layer pixels.
    Pixels,
    /// One byte per pixel of selection coverage.
    Coverage,
    /// The alpha plane reattached after synthesis.
    Alpha,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pixels => "pixel",
            Self::Coverage => "coverage",
            Self::Alpha => "alpha",
        })
    }
}

/// Errors that can occur during a resynthesis run.
///
/// None of these leave partial writes behind: the document is only
/// written after synthesis and recomposition have fully succeeded.
#[derive(Debug, thiserror::Error)]
pub enum ResynthError {
    /// The selection already spans the whole document, so there are no
    /// unselected context pixels to learn from.
    #[error(
        "the selection covers the entire {bounds} document; unselected context pixels are needed to learn from"
    )]
    SelectionTooLarge {
        /// Document dimensions.
        bounds: Dimensions,
    },

    /// Padding was negative.
    #[error("padding must be non-negative, got {0}")]
    InvalidPadding(i32),

    /// The selection bounds have zero width or height.
    #[error("the selection is empty")]
    EmptySelection,

    /// The selection does not intersect the document.
    #[error("selection {selection} lies outside the {bounds} document")]
    SelectionOutOfBounds {
        /// Selection bounds as reported by the host.
        selection: Rect,
        /// Document dimensions.
        bounds: Dimensions,
    },

    /// The document has no selection.
    #[error("the document has no selection")]
    NoSelection,

    /// The document has no active layer to read from.
    #[error("the document has no active layer")]
    NoActiveLayer,

    /// A buffer's length disagrees with the region it describes.
    #[error(
        "malformed {kind} buffer for a {width}x{height} region: expected {expected} bytes, got {actual}"
    )]
    MalformedBuffer {
        /// Which buffer was malformed.
        kind: BufferKind,
        /// Region width in pixels.
        width: u32,
        /// Region height in pixels.
        height: u32,
        /// Required byte length.
        expected: usize,
        /// Byte length received.
        actual: usize,
    },

    /// The host failed to supply a region buffer.
    #[error("failed to read {kind} buffer from the document: {source}")]
    HostRead {
        /// Which buffer was being read.
        kind: BufferKind,
        /// Host-side cause.
        #[source]
        source: HostError,
    },

    /// The synthesis capability failed, panicked, or returned an image of
    /// the wrong size.
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Writing the result or requesting a redraw failed.
    #[error("write-back failed: {0}")]
    WriteBackFailed(#[source] HostError),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
