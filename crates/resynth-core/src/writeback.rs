//! Write-back: put the synthesized region onto a layer and refresh.
//!
//! Two targets are supported, selected by [`WriteTarget`]:
//!
//! - [`InPlace`](WriteTarget::InPlace) overwrites the region on the layer
//!   the pixels were read from.
//! - [`NewLayerBesideSource`](WriteTarget::NewLayerBesideSource) creates a
//!   transparent paint layer, writes the region to it while it is still
//!   detached, then inserts it directly above the source layer (same
//!   parent) and makes it active. The source layer is left untouched.
//!
//! Either way a redraw is requested afterwards. Host failures are not
//! retried; they surface as [`ResynthError::WriteBackFailed`].

use serde::{Deserialize, Serialize};

use crate::document::{Document, LayerId};
use crate::types::{Rect, ResynthError};

/// Selects which layer receives the synthesized pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteTarget {
    /// Overwrite the region on the source layer.
    #[default]
    InPlace,

    /// Write to a new layer inserted directly above the source layer.
    NewLayerBesideSource,
}

impl WriteTarget {
    /// Map a host's "create new layer" checkbox onto a target.
    #[must_use]
    pub const fn from_new_layer_flag(new_layer: bool) -> Self {
        if new_layer {
            Self::NewLayerBesideSource
        } else {
            Self::InPlace
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InPlace => "in place",
            Self::NewLayerBesideSource => "new layer",
        }
    }

    /// Write `pixels` at `region` according to this target, then request a
    /// redraw.
    ///
    /// `layer_name` is only used by
    /// [`NewLayerBesideSource`](Self::NewLayerBesideSource).
    ///
    /// # Errors
    ///
    /// Returns [`ResynthError::WriteBackFailed`] if any host call fails.
    pub fn write_back<D: Document + ?Sized>(
        self,
        document: &mut D,
        source: LayerId,
        region: Rect,
        pixels: &[u8],
        layer_name: &str,
    ) -> Result<WriteOutcome, ResynthError> {
        match self {
            Self::InPlace => write_in_place(document, source, region, pixels),
            Self::NewLayerBesideSource => {
                write_new_layer_beside(document, source, region, pixels, layer_name)
            }
        }
    }
}

/// Which layer a write-back landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Layer that received the pixels.
    pub layer: LayerId,
    /// Whether the layer was created by this write-back.
    pub created: bool,
}

/// Overwrite `region` on `source` and request a redraw.
///
/// # Errors
///
/// Returns [`ResynthError::WriteBackFailed`] if the write or the redraw
/// request fails.
pub fn write_in_place<D: Document + ?Sized>(
    document: &mut D,
    source: LayerId,
    region: Rect,
    pixels: &[u8],
) -> Result<WriteOutcome, ResynthError> {
    document
        .write_pixels(source, region, pixels)
        .map_err(ResynthError::WriteBackFailed)?;
    document
        .request_redraw()
        .map_err(ResynthError::WriteBackFailed)?;
    log::debug!("wrote {region} in place on layer {source}");
    Ok(WriteOutcome {
        layer: source,
        created: false,
    })
}

/// Create a layer, write `region` onto it, insert it above `source`,
/// activate it and request a redraw. `source` itself is never written.
///
/// The pixels go to the layer before it is inserted, so a failed write
/// leaves no empty layer in the stack and the active layer unchanged.
///
/// # Errors
///
/// Returns [`ResynthError::WriteBackFailed`] if creating, inserting or
/// activating the layer, the write, or the redraw request fails.
pub fn write_new_layer_beside<D: Document + ?Sized>(
    document: &mut D,
    source: LayerId,
    region: Rect,
    pixels: &[u8],
    layer_name: &str,
) -> Result<WriteOutcome, ResynthError> {
    let layer = document
        .create_layer(layer_name)
        .map_err(ResynthError::WriteBackFailed)?;
    document
        .write_pixels(layer, region, pixels)
        .map_err(ResynthError::WriteBackFailed)?;
    document
        .insert_beside(layer, source)
        .map_err(ResynthError::WriteBackFailed)?;
    document
        .set_active_layer(layer)
        .map_err(ResynthError::WriteBackFailed)?;
    document
        .request_redraw()
        .map_err(ResynthError::WriteBackFailed)?;
    log::debug!("wrote {region} to new layer {layer} ({layer_name:?}) above {source}");
    Ok(WriteOutcome {
        layer,
        created: true,
    })
}
