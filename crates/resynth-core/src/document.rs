//! The host capability interface: documents, layers and selections.
//!
//! The pipeline never owns pixel storage. Everything it reads or writes
//! goes through [`Document`], which a host application implements over its
//! own layer model. [`MemoryDocument`](crate::memory::MemoryDocument) is
//! the in-process implementation used by tests and the CLI.
//!
//! Mutating methods take `&mut self`: one run holds exclusive access to
//! the document from its first read to its redraw request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Rect};

/// Opaque handle to a layer owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(u64);

impl LayerId {
    /// Wrap a host-side identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The host-side identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failures reported by a [`Document`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The layer handle does not refer to a layer in this document.
    #[error("unknown layer {0}")]
    UnknownLayer(LayerId),

    /// The layer exists but holds no pixels (e.g. a group).
    #[error("layer {0} has no pixel data")]
    NotAPaintLayer(LayerId),

    /// The requested region reaches past the document edge.
    #[error("region {region} exceeds the {bounds} document")]
    OutOfBounds {
        /// Requested region.
        region: Rect,
        /// Document dimensions.
        bounds: Dimensions,
    },

    /// A buffer handed to the host has the wrong length for its region.
    #[error("expected {expected} bytes for region {region}, got {actual}")]
    LengthMismatch {
        /// Target region.
        region: Rect,
        /// Required byte length.
        expected: usize,
        /// Byte length received.
        actual: usize,
    },

    /// The document has no selection to read coverage from.
    #[error("the document has no selection")]
    NoSelection,

    /// Any other host-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Capabilities the pipeline consumes from the host document.
///
/// Pixel buffers are interleaved 8-bit RGBA, row-major, top-to-bottom,
/// exactly `width * height * 4` bytes for the region. Coverage buffers are
/// one byte per pixel, `width * height` bytes, where 0 is unselected and
/// any other value is selected to some degree.
pub trait Document {
    /// Document width and height in pixels.
    fn bounds(&self) -> Dimensions;

    /// The layer the user is working on, if any.
    fn active_layer(&self) -> Option<LayerId>;

    /// Bounding rectangle of the current selection, if any.
    fn selection_bounds(&self) -> Option<Rect>;

    /// Read the RGBA pixels of `layer` inside `region`.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the layer or region is invalid.
    fn read_pixels(&self, layer: LayerId, region: Rect) -> Result<Vec<u8>, HostError>;

    /// Read the selection coverage inside `region`.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if there is no selection or the region is
    /// invalid.
    fn read_coverage(&self, region: Rect) -> Result<Vec<u8>, HostError>;

    /// Replace the RGBA pixels of `layer` inside `region`.
    ///
    /// `layer` may be a detached layer from [`create_layer`](Self::create_layer)
    /// that has not been inserted yet.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the layer or region is invalid or the
    /// buffer length is wrong.
    fn write_pixels(&mut self, layer: LayerId, region: Rect, pixels: &[u8])
    -> Result<(), HostError>;

    /// Create a new, fully transparent paint layer that is not yet part of
    /// the layer stack.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the host refuses to create the layer.
    fn create_layer(&mut self, name: &str) -> Result<LayerId, HostError>;

    /// Insert `layer` into the stack directly above `sibling`, under the
    /// same parent.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if either handle is invalid.
    fn insert_beside(&mut self, layer: LayerId, sibling: LayerId) -> Result<(), HostError>;

    /// Make `layer` the active layer.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the handle is invalid.
    fn set_active_layer(&mut self, layer: LayerId) -> Result<(), HostError>;

    /// Ask the host to recompose and redisplay the document.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the host cannot schedule the refresh.
    fn request_redraw(&mut self) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_id_round_trips_raw_value() {
        assert_eq!(LayerId::new(42).get(), 42);
        assert_eq!(LayerId::new(7).to_string(), "#7");
    }

    #[test]
    fn host_error_messages() {
        assert_eq!(
            HostError::UnknownLayer(LayerId::new(3)).to_string(),
            "unknown layer #3"
        );
        let err = HostError::OutOfBounds {
            region: Rect::new(5, 5, 10, 10),
            bounds: Dimensions::new(8, 8),
        };
        assert_eq!(err.to_string(), "region (5, 5, 10x10) exceeds the 8x8 document");
    }
}
