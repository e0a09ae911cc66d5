//! resynth-core: selection resynthesis for layered raster documents (sans-IO).
//!
//! Regenerates the selected pixels of a layer from their surroundings:
//! region calculation -> buffer reads -> fill mask -> synthesis ->
//! alpha recomposition -> write-back.
//!
//! The synthesis algorithm itself is an external [`Synthesizer`], and the
//! document is reached only through the [`Document`] trait, or bypassed
//! entirely with the buffer-level [`invoke::run`]. This crate has
//! **no I/O dependencies**: file decoding, terminals and engine bindings
//! live in the callers.

pub mod buffer;
pub mod diagnostics;
pub mod document;
pub mod invoke;
pub mod memory;
pub mod pipeline;
pub mod region;
pub mod synth;
pub mod types;
pub mod writeback;

pub use buffer::{FillMask, ImagePlanes};
pub use document::{Document, HostError, LayerId};
pub use memory::MemoryDocument;
pub use pipeline::Pipeline;
pub use region::compute_region;
pub use synth::{SynthesisError, Synthesizer};
pub use types::{
    BufferKind, Dimensions, GrayImage, Rect, ResynthConfig, ResynthError, ResynthOutcome,
    RgbImage, RgbaImage,
};
pub use writeback::{WriteOutcome, WriteTarget};

/// Resynthesize the active layer's selection in one call.
///
/// # Steps
///
/// 1. Validate `config` and compute the padded, clamped region around
///    the selection
/// 2. Read the layer pixels and selection coverage inside the region
/// 3. Split off alpha and binarize coverage into a [`FillMask`]
/// 4. Run `synthesizer` on the RGB image and mask
/// 5. Reattach the original alpha
/// 6. Write back per [`ResynthConfig::target`] and request a redraw
///
/// The document is only written in step 6, so every earlier failure leaves
/// it unchanged.
///
/// # Errors
///
/// Returns [`ResynthError::SelectionTooLarge`] if the selection spans the
/// whole document, [`ResynthError::SynthesisFailed`] if the synthesizer
/// fails, [`ResynthError::WriteBackFailed`] if the host rejects the write,
/// and the other [`ResynthError`] variants for invalid configuration,
/// missing selection or layer, and malformed buffers.
pub fn resynthesize_selection<D, S>(
    document: &mut D,
    config: &ResynthConfig,
    synthesizer: &S,
) -> Result<ResynthOutcome, ResynthError>
where
    D: Document + ?Sized,
    S: Synthesizer + ?Sized,
{
    let result = Pipeline::new(document, config.clone())
        .compute_region()
        .and_then(pipeline::RegionComputed::read_buffers)
        .and_then(pipeline::BuffersRead::derive_mask)
        .and_then(|stage| stage.synthesize(synthesizer))
        .and_then(pipeline::Synthesized::recompose)
        .and_then(pipeline::Recomposed::write_back)
        .map(pipeline::WrittenBack::into_outcome);

    pipeline::log_outcome(result.as_ref());
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Rgb, Rgba};

    use super::*;

    fn fill_white(image: &RgbImage, mask: &FillMask) -> Result<RgbImage, SynthesisError> {
        let mut out = image.clone();
        for (x, y, p) in out.enumerate_pixels_mut() {
            if mask.is_fill(x, y) {
                *p = Rgb([255, 255, 255]);
            }
        }
        Ok(out)
    }

    fn document(width: u32, height: u32) -> MemoryDocument {
        let image = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 200]));
        MemoryDocument::from_image("Background", image).unwrap()
    }

    #[test]
    fn in_place_run_fills_only_the_selection() {
        let mut doc = document(30, 20);
        doc.select_rect(Rect::new(10, 5, 3, 3)).unwrap();

        let outcome =
            resynthesize_selection(&mut doc, &ResynthConfig::default(), &fill_white).unwrap();

        assert_eq!(outcome.selection, Rect::new(10, 5, 3, 3));
        assert_eq!(outcome.region, Rect::new(0, 0, 30, 20));
        assert_eq!(outcome.fill_pixels, 9);
        assert!(!outcome.created_layer);

        let pixels = doc.layer_pixels(outcome.layer).unwrap();
        assert_eq!(pixels.get_pixel(11, 6).0, [255, 255, 255, 200]);
        assert_eq!(pixels.get_pixel(9, 6).0, [0, 0, 0, 200]);
        assert_eq!(doc.redraw_count(), 1);
    }

    #[test]
    fn new_layer_run_reports_created_layer() {
        let mut doc = document(30, 20);
        let source = doc.active_layer().unwrap();
        doc.select_rect(Rect::new(10, 5, 3, 3)).unwrap();
        let config = ResynthConfig {
            padding: 4,
            target: WriteTarget::from_new_layer_flag(true),
            ..ResynthConfig::default()
        };

        let outcome = resynthesize_selection(&mut doc, &config, &fill_white).unwrap();

        assert!(outcome.created_layer);
        assert_eq!(outcome.region, Rect::new(6, 1, 11, 11));
        assert_eq!(doc.stack(), vec![source, outcome.layer]);
        assert_eq!(doc.layer_name(outcome.layer), Some("Resynthesize"));
        assert_eq!(doc.active_layer(), Some(outcome.layer));
    }

    #[test]
    fn whole_document_selection_is_rejected() {
        let mut doc = document(8, 8);
        doc.select_rect(Rect::new(0, 0, 8, 8)).unwrap();
        let result = resynthesize_selection(&mut doc, &ResynthConfig::default(), &fill_white);
        assert!(matches!(result, Err(ResynthError::SelectionTooLarge { .. })));
        assert_eq!(doc.redraw_count(), 0);
    }

    #[test]
    fn works_through_a_trait_object() {
        let mut doc = document(8, 8);
        doc.select_rect(Rect::new(2, 2, 2, 2)).unwrap();
        let document: &mut dyn Document = &mut doc;
        let synthesizer: &dyn Synthesizer = &fill_white;
        let outcome =
            resynthesize_selection(document, &ResynthConfig::default(), synthesizer).unwrap();
        assert_eq!(outcome.fill_pixels, 4);
    }
}
