//! Incremental pipeline: advance a resynthesis run stage by stage,
//! inspecting each intermediate result before continuing.
//!
//! [`resynthesize_selection`](crate::resynthesize_selection) drives a whole
//! run in one call. [`Pipeline`] lets the caller step through it instead:
//!
//! ```rust
//! # use resynth_core::{
//! #     FillMask, MemoryDocument, Pipeline, Rect, ResynthConfig, RgbImage, RgbaImage,
//! # };
//! # use resynth_core::SynthesisError;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut document = MemoryDocument::from_image("Background", RgbaImage::new(64, 64))?;
//! # document.select_rect(Rect::new(20, 20, 8, 8))?;
//! # let synthesizer = |image: &RgbImage, _: &FillMask| -> Result<RgbImage, SynthesisError> {
//! #     Ok(image.clone())
//! # };
//! let outcome = Pipeline::new(&mut document, ResynthConfig::default())
//!     .compute_region()?
//!     .read_buffers()?
//!     .derive_mask()?
//!     .synthesize(&synthesizer)?
//!     .recompose()?
//!     .write_back()?
//!     .into_outcome();
//! assert_eq!(outcome.fill_pixels, 64);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, carrying
//! forward what later stages need. Every stage holds the exclusive borrow
//! of the document, and only [`Recomposed::write_back`] mutates it: a run
//! abandoned or failed at any earlier stage has written nothing.

use crate::buffer::{self, FillMask, ImagePlanes};
use crate::document::{Document, LayerId};
use crate::region;
use crate::synth::Synthesizer;
use crate::types::{
    BufferKind, GrayImage, Rect, ResynthConfig, ResynthError, ResynthOutcome, RgbImage,
};

/// Entry point for a staged run.
pub struct Pipeline;

impl Pipeline {
    /// Start a run over `document` with `config`.
    ///
    /// Nothing is read or validated until
    /// [`compute_region`](Idle::compute_region) is called.
    pub fn new<D: Document + ?Sized>(document: &mut D, config: ResynthConfig) -> Idle<'_, D> {
        Idle { document, config }
    }
}

// ───────────────────────── Stage 0: Idle ─────────────────────────────

/// Run state before anything has been read from the document.
#[must_use = "pipeline stages are consumed by advancing; call .compute_region() to continue"]
pub struct Idle<'d, D: ?Sized> {
    document: &'d mut D,
    config: ResynthConfig,
}

impl<'d, D: Document + ?Sized> Idle<'d, D> {
    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &ResynthConfig {
        &self.config
    }

    /// Find the active layer and selection, compute the padded working
    /// region and validate the rest of the configuration.
    ///
    /// The region is computed before the configuration is validated, so a
    /// whole-document selection is reported as too large even when the
    /// padding is also invalid.
    ///
    /// # Errors
    ///
    /// - [`ResynthError::NoActiveLayer`] or [`ResynthError::NoSelection`]
    ///   if the document lacks either.
    /// - Any error from [`compute_region`](region::compute_region).
    /// - [`ResynthError::InvalidConfig`] if the configuration is otherwise
    ///   invalid.
    pub fn compute_region(self) -> Result<RegionComputed<'d, D>, ResynthError> {
        let source = self
            .document
            .active_layer()
            .ok_or(ResynthError::NoActiveLayer)?;
        let selection = self
            .document
            .selection_bounds()
            .ok_or(ResynthError::NoSelection)?;
        let bounds = self.document.bounds();
        let region = region::compute_region(selection, bounds, self.config.padding)?;
        self.config.validate()?;
        log::debug!(
            "selection {selection} in {bounds} document, padding {} -> region {region}",
            self.config.padding
        );
        Ok(RegionComputed {
            document: self.document,
            config: self.config,
            source,
            selection,
            region,
        })
    }
}

// ───────────────────────── Stage 1: RegionComputed ───────────────────

/// Run state once the working region is known.
#[must_use = "pipeline stages are consumed by advancing; call .read_buffers() to continue"]
pub struct RegionComputed<'d, D: ?Sized> {
    document: &'d mut D,
    config: ResynthConfig,
    source: LayerId,
    selection: Rect,
    region: Rect,
}

impl<'d, D: Document + ?Sized> RegionComputed<'d, D> {
    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &ResynthConfig {
        &self.config
    }

    /// Layer the pixels will be read from.
    #[must_use]
    pub const fn source_layer(&self) -> LayerId {
        self.source
    }

    /// Selection bounds reported by the document.
    #[must_use]
    pub const fn selection(&self) -> Rect {
        self.selection
    }

    /// Padded, clamped working region.
    #[must_use]
    pub const fn region(&self) -> Rect {
        self.region
    }

    /// Read the source layer's pixels and the selection coverage inside
    /// the region, and split the pixels into colour and alpha.
    ///
    /// # Errors
    ///
    /// - [`ResynthError::HostRead`] if the document cannot supply either
    ///   buffer.
    /// - [`ResynthError::MalformedBuffer`] if the pixel buffer has the
    ///   wrong length for the region.
    pub fn read_buffers(self) -> Result<BuffersRead<'d, D>, ResynthError> {
        let pixels = self
            .document
            .read_pixels(self.source, self.region)
            .map_err(|source| ResynthError::HostRead {
                kind: BufferKind::Pixels,
                source,
            })?;
        let coverage = self
            .document
            .read_coverage(self.region)
            .map_err(|source| ResynthError::HostRead {
                kind: BufferKind::Coverage,
                source,
            })?;
        let pixel_bytes = pixels.len();
        let planes = buffer::to_image(&pixels, self.region.width, self.region.height)?;
        log::debug!(
            "read {pixel_bytes} pixel bytes and {} coverage bytes from layer {}",
            coverage.len(),
            self.source
        );
        Ok(BuffersRead {
            document: self.document,
            config: self.config,
            source: self.source,
            selection: self.selection,
            region: self.region,
            planes,
            coverage,
            pixel_bytes,
        })
    }
}

// ───────────────────────── Stage 2: BuffersRead ──────────────────────

/// Run state once the region buffers are in memory.
#[must_use = "pipeline stages are consumed by advancing; call .derive_mask() to continue"]
pub struct BuffersRead<'d, D: ?Sized> {
    document: &'d mut D,
    config: ResynthConfig,
    source: LayerId,
    selection: Rect,
    region: Rect,
    planes: ImagePlanes,
    coverage: Vec<u8>,
    pixel_bytes: usize,
}

impl<'d, D: Document + ?Sized> BuffersRead<'d, D> {
    /// Padded, clamped working region.
    #[must_use]
    pub const fn region(&self) -> Rect {
        self.region
    }

    /// Colour and alpha planes of the region.
    #[must_use]
    pub const fn planes(&self) -> &ImagePlanes {
        &self.planes
    }

    /// Raw selection coverage of the region.
    #[must_use]
    pub fn coverage(&self) -> &[u8] {
        &self.coverage
    }

    /// Length of the pixel buffer the document returned.
    #[must_use]
    pub const fn pixel_bytes(&self) -> usize {
        self.pixel_bytes
    }

    /// Binarize the coverage into a [`FillMask`].
    ///
    /// # Errors
    ///
    /// Returns [`ResynthError::MalformedBuffer`] if the coverage buffer
    /// has the wrong length for the region.
    pub fn derive_mask(self) -> Result<MaskDerived<'d, D>, ResynthError> {
        let mask = buffer::to_mask(&self.coverage, self.region.width, self.region.height)?;
        let fill_pixels = mask.fill_count();
        log::debug!(
            "mask marks {fill_pixels} of {} pixels for filling",
            self.region.pixel_count()
        );
        Ok(MaskDerived {
            document: self.document,
            config: self.config,
            source: self.source,
            selection: self.selection,
            region: self.region,
            planes: self.planes,
            mask,
            fill_pixels,
        })
    }
}

// ───────────────────────── Stage 3: MaskDerived ──────────────────────

/// Run state with the synthesizer's inputs ready.
#[must_use = "pipeline stages are consumed by advancing; call .synthesize() to continue"]
pub struct MaskDerived<'d, D: ?Sized> {
    document: &'d mut D,
    config: ResynthConfig,
    source: LayerId,
    selection: Rect,
    region: Rect,
    planes: ImagePlanes,
    mask: FillMask,
    fill_pixels: u64,
}

impl<'d, D: Document + ?Sized> MaskDerived<'d, D> {
    /// Padded, clamped working region.
    #[must_use]
    pub const fn region(&self) -> Rect {
        self.region
    }

    /// Colour input for the synthesizer.
    #[must_use]
    pub const fn rgb(&self) -> &RgbImage {
        &self.planes.rgb
    }

    /// Binary fill mask for the synthesizer.
    #[must_use]
    pub const fn mask(&self) -> &FillMask {
        &self.mask
    }

    /// Number of pixels marked for filling.
    #[must_use]
    pub const fn fill_pixels(&self) -> u64 {
        self.fill_pixels
    }

    /// Run the synthesizer on the region.
    ///
    /// An empty mask is not an error; the synthesizer is still called.
    ///
    /// # Errors
    ///
    /// Returns [`ResynthError::SynthesisFailed`] if the synthesizer
    /// returns an error, panics, or returns an image whose dimensions
    /// differ from the region's.
    pub fn synthesize<S: Synthesizer + ?Sized>(
        self,
        synthesizer: &S,
    ) -> Result<Synthesized<'d, D>, ResynthError> {
        let rgb = crate::invoke::invoke_synthesizer(synthesizer, &self.planes.rgb, &self.mask)?;
        log::debug!("synthesized {}x{} region", rgb.width(), rgb.height());
        Ok(Synthesized {
            document: self.document,
            config: self.config,
            source: self.source,
            selection: self.selection,
            region: self.region,
            rgb,
            alpha: self.planes.alpha,
            fill_pixels: self.fill_pixels,
        })
    }
}

// ───────────────────────── Stage 4: Synthesized ──────────────────────

/// Run state holding the synthesizer's output.
#[must_use = "pipeline stages are consumed by advancing; call .recompose() to continue"]
pub struct Synthesized<'d, D: ?Sized> {
    document: &'d mut D,
    config: ResynthConfig,
    source: LayerId,
    selection: Rect,
    region: Rect,
    rgb: RgbImage,
    alpha: GrayImage,
    fill_pixels: u64,
}

impl<'d, D: Document + ?Sized> Synthesized<'d, D> {
    /// The synthesized colour image.
    #[must_use]
    pub const fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    /// Reattach the original alpha and flatten to an RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ResynthError::MalformedBuffer`] if the colour and alpha
    /// planes disagree in size.
    pub fn recompose(self) -> Result<Recomposed<'d, D>, ResynthError> {
        let pixels = buffer::from_planes(&self.rgb, &self.alpha)?;
        Ok(Recomposed {
            document: self.document,
            config: self.config,
            source: self.source,
            selection: self.selection,
            region: self.region,
            pixels,
            fill_pixels: self.fill_pixels,
        })
    }
}

// ───────────────────────── Stage 5: Recomposed ───────────────────────

/// Run state with the final RGBA buffer ready to write.
#[must_use = "pipeline stages are consumed by advancing; call .write_back() to continue"]
pub struct Recomposed<'d, D: ?Sized> {
    document: &'d mut D,
    config: ResynthConfig,
    source: LayerId,
    selection: Rect,
    region: Rect,
    pixels: Vec<u8>,
    fill_pixels: u64,
}

impl<'d, D: Document + ?Sized> Recomposed<'d, D> {
    /// Padded, clamped working region.
    #[must_use]
    pub const fn region(&self) -> Rect {
        self.region
    }

    /// The RGBA bytes that will be written.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Write the region according to the configured target and request a
    /// redraw.
    ///
    /// # Errors
    ///
    /// Returns [`ResynthError::WriteBackFailed`] if any host call fails.
    pub fn write_back(self) -> Result<WrittenBack, ResynthError> {
        let written = self.config.target.write_back(
            self.document,
            self.source,
            self.region,
            &self.pixels,
            &self.config.layer_name,
        )?;
        Ok(WrittenBack {
            outcome: ResynthOutcome {
                selection: self.selection,
                region: self.region,
                layer: written.layer,
                created_layer: written.created,
                fill_pixels: self.fill_pixels,
            },
            output_bytes: self.pixels.len(),
        })
    }
}

// ───────────────────────── Stage 6: WrittenBack ──────────────────────

/// Terminal run state. The document borrow has been released.
#[must_use = "call .into_outcome() to retrieve the run result"]
pub struct WrittenBack {
    outcome: ResynthOutcome,
    output_bytes: usize,
}

impl WrittenBack {
    /// What the run did.
    #[must_use]
    pub const fn outcome(&self) -> &ResynthOutcome {
        &self.outcome
    }

    /// Length of the buffer that was written.
    #[must_use]
    pub const fn output_bytes(&self) -> usize {
        self.output_bytes
    }

    /// Consume the pipeline and return the run result.
    #[must_use]
    pub fn into_outcome(self) -> ResynthOutcome {
        self.outcome
    }
}

/// Log how a whole run ended: `info!` on success, `warn!` on failure.
///
/// Shared by every entry point that drives a run to completion.
pub(crate) fn log_outcome(result: Result<&ResynthOutcome, &ResynthError>) {
    match result {
        Ok(outcome) => log::info!(
            "resynthesized {} fill pixels in region {} onto layer {}{}",
            outcome.fill_pixels,
            outcome.region,
            outcome.layer,
            if outcome.created_layer { " (new)" } else { "" },
        ),
        Err(e) => log::warn!("resynthesis aborted: {e}"),
    }
}
