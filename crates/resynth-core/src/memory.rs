//! In-memory [`Document`]: a layer stack, an active layer and a selection.
//!
//! Layers are kept in a flat bottom-to-top stack. Groups are entries with
//! no pixels; membership is a parent pointer, and a group's descendants
//! always follow it in the stack. Every paint layer covers the full
//! document.
//!
//! Layers returned by [`Document::create_layer`] are detached until
//! [`Document::insert_beside`] places them, mirroring hosts where node
//! creation and insertion are separate calls.
//!
//! Write and redraw failures can be injected to exercise error paths.

use image::{GrayImage, Luma, Rgba, RgbaImage, imageops};

use crate::buffer::{COVERAGE_CHANNELS, RGBA_CHANNELS, expected_len};
use crate::document::{Document, HostError, LayerId};
use crate::types::{Dimensions, Rect};

#[derive(Debug, Clone)]
enum LayerContent {
    Paint(RgbaImage),
    Group,
}

#[derive(Debug, Clone)]
struct Layer {
    id: LayerId,
    name: String,
    parent: Option<LayerId>,
    content: LayerContent,
}

/// A self-contained document held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    dimensions: Dimensions,
    /// Attached layers, bottom to top.
    layers: Vec<Layer>,
    /// Created but not yet inserted.
    detached: Vec<Layer>,
    next_id: u64,
    active: Option<LayerId>,
    selection: Option<GrayImage>,
    redraw_count: usize,
    write_failure: Option<String>,
    redraw_failure: Option<String>,
}

impl MemoryDocument {
    /// Create an empty document with no layers and no selection.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Other`] if either dimension is zero.
    pub fn new(dimensions: Dimensions) -> Result<Self, HostError> {
        if dimensions.is_empty() {
            return Err(HostError::Other(format!(
                "document dimensions must be non-zero, got {dimensions}"
            )));
        }
        Ok(Self {
            dimensions,
            layers: Vec::new(),
            detached: Vec::new(),
            next_id: 1,
            active: None,
            selection: None,
            redraw_count: 0,
            write_failure: None,
            redraw_failure: None,
        })
    }

    /// Create a document sized to `image` with a single active paint layer
    /// holding it.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Other`] if the image is empty.
    pub fn from_image(name: &str, image: RgbaImage) -> Result<Self, HostError> {
        let (width, height) = image.dimensions();
        let mut doc = Self::new(Dimensions::new(width, height))?;
        let id = doc.allocate_id();
        doc.layers.push(Layer {
            id,
            name: name.to_string(),
            parent: None,
            content: LayerContent::Paint(image),
        });
        doc.active = Some(id);
        Ok(doc)
    }

    /// Append a transparent paint layer to the top of the stack.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if `parent` is not an attached group.
    pub fn add_paint_layer(
        &mut self,
        name: &str,
        parent: Option<LayerId>,
    ) -> Result<LayerId, HostError> {
        let content = LayerContent::Paint(self.blank_layer());
        self.append(name, parent, content)
    }

    /// Append an empty group to the top of the stack.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if `parent` is not an attached group.
    pub fn add_group(&mut self, name: &str, parent: Option<LayerId>) -> Result<LayerId, HostError> {
        self.append(name, parent, LayerContent::Group)
    }

    /// Replace the selection with a full-document coverage plane.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Other`] if the plane's size differs from the
    /// document's.
    pub fn set_selection(&mut self, coverage: GrayImage) -> Result<(), HostError> {
        let (width, height) = coverage.dimensions();
        if Dimensions::new(width, height) != self.dimensions {
            return Err(HostError::Other(format!(
                "selection is {width}x{height} but the document is {}",
                self.dimensions
            )));
        }
        self.selection = Some(coverage);
        Ok(())
    }

    /// Replace the selection with a fully selected rectangle.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::OutOfBounds`] if `rect` leaves the document.
    pub fn select_rect(&mut self, rect: Rect) -> Result<(), HostError> {
        self.check_region(rect)?;
        let mut coverage = GrayImage::new(self.dimensions.width, self.dimensions.height);
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                coverage.put_pixel(x, y, Luma([255]));
            }
        }
        self.selection = Some(coverage);
        Ok(())
    }

    /// Drop the selection.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// The full-document coverage plane, if there is a selection.
    #[must_use]
    pub const fn selection(&self) -> Option<&GrayImage> {
        self.selection.as_ref()
    }

    /// Pixels of a paint layer, attached or detached.
    #[must_use]
    pub fn layer_pixels(&self, layer: LayerId) -> Option<&RgbaImage> {
        match &self.find(layer)?.content {
            LayerContent::Paint(pixels) => Some(pixels),
            LayerContent::Group => None,
        }
    }

    /// Name of a layer, attached or detached.
    #[must_use]
    pub fn layer_name(&self, layer: LayerId) -> Option<&str> {
        self.find(layer).map(|l| l.name.as_str())
    }

    /// Parent of a layer: `None` if the layer is unknown, `Some(None)` at
    /// the top level.
    #[must_use]
    pub fn parent_of(&self, layer: LayerId) -> Option<Option<LayerId>> {
        self.find(layer).map(|l| l.parent)
    }

    /// Attached layers, bottom to top.
    #[must_use]
    pub fn stack(&self) -> Vec<LayerId> {
        self.layers.iter().map(|l| l.id).collect()
    }

    /// How many redraws have been requested.
    #[must_use]
    pub const fn redraw_count(&self) -> usize {
        self.redraw_count
    }

    /// Make the next [`Document::write_pixels`] call fail with `message`.
    pub fn inject_write_failure(&mut self, message: impl Into<String>) {
        self.write_failure = Some(message.into());
    }

    /// Make the next [`Document::request_redraw`] call fail with `message`.
    pub fn inject_redraw_failure(&mut self, message: impl Into<String>) {
        self.redraw_failure = Some(message.into());
    }

    /// Composite all paint layers, bottom to top, with normal source-over
    /// blending. Detached layers are not included.
    #[must_use]
    pub fn flatten(&self) -> RgbaImage {
        let mut out = self.blank_layer();
        for layer in &self.layers {
            let LayerContent::Paint(pixels) = &layer.content else {
                continue;
            };
            for (dst, src) in out.pixels_mut().zip(pixels.pixels()) {
                *dst = blend_over(*dst, *src);
            }
        }
        out
    }

    fn blank_layer(&self) -> RgbaImage {
        RgbaImage::new(self.dimensions.width, self.dimensions.height)
    }

    const fn allocate_id(&mut self) -> LayerId {
        let id = LayerId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn append(
        &mut self,
        name: &str,
        parent: Option<LayerId>,
        content: LayerContent,
    ) -> Result<LayerId, HostError> {
        if let Some(group) = parent {
            let entry = self
                .layers
                .iter()
                .find(|l| l.id == group)
                .ok_or(HostError::UnknownLayer(group))?;
            if !matches!(entry.content, LayerContent::Group) {
                return Err(HostError::Other(format!("layer {group} is not a group")));
            }
        }
        let id = self.allocate_id();
        let layer = Layer {
            id,
            name: name.to_string(),
            parent,
            content,
        };
        // Keep descendants contiguous after their group.
        let index = parent.map_or(self.layers.len(), |group| self.subtree_end(group));
        self.layers.insert(index, layer);
        Ok(id)
    }

    fn find(&self, layer: LayerId) -> Option<&Layer> {
        self.layers
            .iter()
            .chain(self.detached.iter())
            .find(|l| l.id == layer)
    }

    fn layer_mut(&mut self, layer: LayerId) -> Result<&mut Layer, HostError> {
        self.layers
            .iter_mut()
            .chain(self.detached.iter_mut())
            .find(|l| l.id == layer)
            .ok_or(HostError::UnknownLayer(layer))
    }

    fn position(&self, layer: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == layer)
    }

    /// Whether `layer` sits somewhere below `ancestor` in the group tree.
    fn is_descendant(&self, layer: &Layer, ancestor: LayerId) -> bool {
        let mut parent = layer.parent;
        while let Some(id) = parent {
            if id == ancestor {
                return true;
            }
            parent = self.find(id).and_then(|l| l.parent);
        }
        false
    }

    /// Stack index just past `layer` and all of its descendants.
    fn subtree_end(&self, layer: LayerId) -> usize {
        let Some(start) = self.position(layer) else {
            return self.layers.len();
        };
        let mut end = start + 1;
        while end < self.layers.len() && self.is_descendant(&self.layers[end], layer) {
            end += 1;
        }
        end
    }

    fn check_region(&self, region: Rect) -> Result<(), HostError> {
        if region.fits_within(self.dimensions) {
            Ok(())
        } else {
            Err(HostError::OutOfBounds {
                region,
                bounds: self.dimensions,
            })
        }
    }
}

impl Document for MemoryDocument {
    fn bounds(&self) -> Dimensions {
        self.dimensions
    }

    fn active_layer(&self) -> Option<LayerId> {
        self.active
    }

    fn selection_bounds(&self) -> Option<Rect> {
        let coverage = self.selection.as_ref()?;
        let mut min = (u32::MAX, u32::MAX);
        let mut max = (0, 0);
        let mut any = false;
        for (x, y, p) in coverage.enumerate_pixels() {
            if p.0[0] > 0 {
                any = true;
                min = (min.0.min(x), min.1.min(y));
                max = (max.0.max(x), max.1.max(y));
            }
        }
        any.then(|| Rect::new(min.0, min.1, max.0 - min.0 + 1, max.1 - min.1 + 1))
    }

    fn read_pixels(&self, layer: LayerId, region: Rect) -> Result<Vec<u8>, HostError> {
        self.check_region(region)?;
        let entry = self.find(layer).ok_or(HostError::UnknownLayer(layer))?;
        let LayerContent::Paint(pixels) = &entry.content else {
            return Err(HostError::NotAPaintLayer(layer));
        };
        Ok(imageops::crop_imm(pixels, region.x, region.y, region.width, region.height)
            .to_image()
            .into_raw())
    }

    fn read_coverage(&self, region: Rect) -> Result<Vec<u8>, HostError> {
        self.check_region(region)?;
        let coverage = self.selection.as_ref().ok_or(HostError::NoSelection)?;
        let bytes = imageops::crop_imm(coverage, region.x, region.y, region.width, region.height)
            .to_image()
            .into_raw();
        debug_assert_eq!(
            Some(bytes.len()),
            expected_len(region.width, region.height, COVERAGE_CHANNELS)
        );
        Ok(bytes)
    }

    fn write_pixels(
        &mut self,
        layer: LayerId,
        region: Rect,
        pixels: &[u8],
    ) -> Result<(), HostError> {
        if let Some(message) = self.write_failure.take() {
            return Err(HostError::Other(message));
        }
        self.check_region(region)?;
        let expected =
            expected_len(region.width, region.height, RGBA_CHANNELS).unwrap_or(usize::MAX);
        if pixels.len() != expected {
            return Err(HostError::LengthMismatch {
                region,
                expected,
                actual: pixels.len(),
            });
        }
        let patch = RgbaImage::from_raw(region.width, region.height, pixels.to_vec()).ok_or(
            HostError::LengthMismatch {
                region,
                expected,
                actual: pixels.len(),
            },
        )?;

        let entry = self.layer_mut(layer)?;
        let LayerContent::Paint(target) = &mut entry.content else {
            return Err(HostError::NotAPaintLayer(layer));
        };
        imageops::replace(target, &patch, i64::from(region.x), i64::from(region.y));
        Ok(())
    }

    fn create_layer(&mut self, name: &str) -> Result<LayerId, HostError> {
        let id = self.allocate_id();
        self.detached.push(Layer {
            id,
            name: name.to_string(),
            parent: None,
            content: LayerContent::Paint(self.blank_layer()),
        });
        Ok(id)
    }

    fn insert_beside(&mut self, layer: LayerId, sibling: LayerId) -> Result<(), HostError> {
        if layer == sibling {
            return Err(HostError::Other(format!(
                "cannot insert layer {layer} beside itself"
            )));
        }
        let sibling_parent = self
            .layers
            .iter()
            .find(|l| l.id == sibling)
            .map(|l| l.parent)
            .ok_or(HostError::UnknownLayer(sibling))?;

        let mut entry = if let Some(i) = self.detached.iter().position(|l| l.id == layer) {
            self.detached.remove(i)
        } else if let Some(i) = self.position(layer) {
            if matches!(self.layers[i].content, LayerContent::Group) {
                return Err(HostError::Other(format!(
                    "moving group {layer} is not supported"
                )));
            }
            self.layers.remove(i)
        } else {
            return Err(HostError::UnknownLayer(layer));
        };

        entry.parent = sibling_parent;
        let index = self.subtree_end(sibling);
        self.layers.insert(index, entry);
        Ok(())
    }

    fn set_active_layer(&mut self, layer: LayerId) -> Result<(), HostError> {
        if self.position(layer).is_none() {
            return Err(HostError::UnknownLayer(layer));
        }
        self.active = Some(layer);
        Ok(())
    }

    fn request_redraw(&mut self) -> Result<(), HostError> {
        if let Some(message) = self.redraw_failure.take() {
            return Err(HostError::Other(message));
        }
        self.redraw_count += 1;
        Ok(())
    }
}

/// Normal-mode source-over blend of straight-alpha pixels.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    // Fast paths: transparent top leaves the base; opaque top replaces it.
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }

    let ta = f32::from(top[3]) / 255.0;
    let ba = f32::from(base[3]) / 255.0;
    let out_a = ba.mul_add(1.0 - ta, ta);
    let channel = |t: u8, b: u8| {
        let v = f32::from(t).mul_add(ta, f32::from(b) * ba * (1.0 - ta)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
