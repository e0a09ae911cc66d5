//! The synthesis capability: an opaque `synthesize(image, mask)` call.
//!
//! # Strategy pattern
//!
//! The algorithm that invents plausible content for the masked pixels
//! lives outside this crate. [`Synthesizer`] is the seam: the pipeline
//! hands it an RGB image and a [`FillMask`] of the same size, and expects
//! back an RGB image of the same size whose masked pixels have been
//! regenerated from the unmasked ones.
//!
//! Any closure of the right shape is a synthesizer, so hosts can wrap an
//! engine binding in a few lines. Implementations may be
//! non-deterministic.

use image::RgbImage;

use crate::buffer::FillMask;

/// Error type returned by a [`Synthesizer`].
///
/// Boxed so that engines can report their own error types unchanged.
pub type SynthesisError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for synthesis engines.
///
/// Input: an RGB image and a binary mask of identical dimensions.
/// Output: an RGB image of identical dimensions with the
/// [`FillMask::FILL`] pixels replaced.
pub trait Synthesizer {
    /// Regenerate the masked pixels of `image`.
    ///
    /// # Errors
    ///
    /// Returns a [`SynthesisError`] if the engine cannot produce a result.
    fn synthesize(&self, image: &RgbImage, mask: &FillMask) -> Result<RgbImage, SynthesisError>;
}

impl<F> Synthesizer for F
where
    F: Fn(&RgbImage, &FillMask) -> Result<RgbImage, SynthesisError>,
{
    fn synthesize(&self, image: &RgbImage, mask: &FillMask) -> Result<RgbImage, SynthesisError> {
        self(image, mask)
    }
}
