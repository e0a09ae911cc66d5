//! Buffer adapter: raw host bytes to structured images and back.
//!
//! Hosts hand the pipeline flat byte streams. This module turns them into
//! the shapes the synthesizer works with:
//!
//! - an RGBA pixel buffer splits into an [`RgbImage`] (passed to the
//!   synthesizer) and an alpha plane (kept aside, never synthesized),
//! - a coverage buffer becomes a strictly binary [`FillMask`],
//! - the synthesizer's RGB output plus the original alpha plane are
//!   interleaved back into an RGBA buffer with the same layout and length
//!   as the input, so writing it to the same region is always valid.
//!
//! Transparency is never altered: only colour inside the fill mask changes.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::types::{BufferKind, Dimensions, ResynthError};

/// Bytes per pixel in a host pixel buffer (R, G, B, A).
pub const RGBA_CHANNELS: usize = 4;

/// Bytes per pixel in a host coverage buffer.
pub const COVERAGE_CHANNELS: usize = 1;

/// A pixel buffer split into colour and transparency.
#[derive(Debug, Clone)]
pub struct ImagePlanes {
    /// Colour channels, handed to the synthesizer.
    pub rgb: RgbImage,
    /// Original alpha channel, reattached after synthesis.
    pub alpha: GrayImage,
}

/// Binary fill mask: which pixels the synthesizer must regenerate.
///
/// Stored as a [`GrayImage`] holding only [`FillMask::FILL`] and
/// [`FillMask::SOURCE`], the convention resynthesis engines expect for
/// their mask input. There is no partial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillMask(GrayImage);

impl FillMask {
    /// Mask value for a pixel to regenerate.
    pub const FILL: u8 = 255;

    /// Mask value for a context pixel.
    pub const SOURCE: u8 = 0;

    /// Build a mask by binarizing any grayscale plane: every non-zero
    /// value becomes [`FILL`](Self::FILL).
    #[must_use]
    pub fn from_coverage(coverage: &GrayImage) -> Self {
        let mut mask = coverage.clone();
        for p in mask.pixels_mut() {
            *p = Luma([binarize(p.0[0])]);
        }
        Self(mask)
    }

    /// Mask width and height.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        let (width, height) = self.0.dimensions();
        Dimensions::new(width, height)
    }

    /// Whether the pixel at `(x, y)` is to be regenerated.
    ///
    /// Out-of-range coordinates are treated as context.
    #[must_use]
    pub fn is_fill(&self, x: u32, y: u32) -> bool {
        self.0
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] == Self::FILL)
    }

    /// Number of pixels to regenerate.
    #[must_use]
    pub fn fill_count(&self) -> u64 {
        self.0
            .pixels()
            .map(|p| u64::from(u8::from(p.0[0] == Self::FILL)))
            .sum()
    }

    /// Borrow the mask as a grayscale image (0 or 255 per pixel).
    #[must_use]
    pub const fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the mask, returning the grayscale image.
    #[must_use]
    pub fn into_gray(self) -> GrayImage {
        self.0
    }
}

/// Threshold one coverage byte: strictly greater than zero means fill.
const fn binarize(coverage: u8) -> u8 {
    if coverage > 0 {
        FillMask::FILL
    } else {
        FillMask::SOURCE
    }
}

/// Byte length of a `width x height` buffer with `channels` bytes per
/// pixel, or `None` if it does not fit in `usize`.
#[must_use]
pub fn expected_len(width: u32, height: u32, channels: usize) -> Option<usize> {
    let width = usize::try_from(width).ok()?;
    let height = usize::try_from(height).ok()?;
    width.checked_mul(height)?.checked_mul(channels)
}

/// Check a buffer's length against its region, producing
/// [`ResynthError::MalformedBuffer`] on mismatch.
fn check_len(
    kind: BufferKind,
    bytes: &[u8],
    width: u32,
    height: u32,
    channels: usize,
) -> Result<(), ResynthError> {
    let expected = expected_len(width, height, channels).unwrap_or(usize::MAX);
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(ResynthError::MalformedBuffer {
            kind,
            width,
            height,
            expected,
            actual: bytes.len(),
        })
    }
}

/// Split an interleaved RGBA buffer into RGB and alpha planes.
///
/// # Errors
///
/// Returns [`ResynthError::MalformedBuffer`] if `pixels` is not exactly
/// `width * height * 4` bytes.
pub fn to_image(pixels: &[u8], width: u32, height: u32) -> Result<ImagePlanes, ResynthError> {
    check_len(BufferKind::Pixels, pixels, width, height, RGBA_CHANNELS)?;

    let pixel_count = pixels.len() / RGBA_CHANNELS;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for px in pixels.chunks_exact(RGBA_CHANNELS) {
        rgb.extend_from_slice(&px[..3]);
        alpha.push(px[3]);
    }

    let malformed = || ResynthError::MalformedBuffer {
        kind: BufferKind::Pixels,
        width,
        height,
        expected: pixels.len(),
        actual: pixels.len(),
    };
    Ok(ImagePlanes {
        rgb: RgbImage::from_raw(width, height, rgb).ok_or_else(malformed)?,
        alpha: GrayImage::from_raw(width, height, alpha).ok_or_else(malformed)?,
    })
}

/// Binarize a coverage buffer into a [`FillMask`].
///
/// Any byte greater than zero marks a pixel to fill; zero marks context.
/// Partial (antialiased) coverage is not preserved.
///
/// # Errors
///
/// Returns [`ResynthError::MalformedBuffer`] if `coverage` is not exactly
/// `width * height` bytes.
pub fn to_mask(coverage: &[u8], width: u32, height: u32) -> Result<FillMask, ResynthError> {
    check_len(BufferKind::Coverage, coverage, width, height, COVERAGE_CHANNELS)?;

    let binary = coverage.iter().copied().map(binarize).collect();
    GrayImage::from_raw(width, height, binary)
        .map(FillMask)
        .ok_or(ResynthError::MalformedBuffer {
            kind: BufferKind::Coverage,
            width,
            height,
            expected: coverage.len(),
            actual: coverage.len(),
        })
}

/// Interleave synthesized RGB with the original alpha plane.
///
/// The result has the layout and length of the buffer originally passed
/// to [`to_image`], with every alpha byte copied unchanged from `alpha`.
///
/// # Errors
///
/// Returns [`ResynthError::MalformedBuffer`] if the planes differ in size.
pub fn from_planes(rgb: &RgbImage, alpha: &GrayImage) -> Result<Vec<u8>, ResynthError> {
    let (width, height) = rgb.dimensions();
    if alpha.dimensions() != (width, height) {
        return Err(ResynthError::MalformedBuffer {
            kind: BufferKind::Alpha,
            width,
            height,
            expected: expected_len(width, height, COVERAGE_CHANNELS).unwrap_or(usize::MAX),
            actual: alpha.as_raw().len(),
        });
    }

    let mut out = Vec::with_capacity(alpha.as_raw().len() * RGBA_CHANNELS);
    for (&Rgb([r, g, b]), &Luma([a])) in rgb.pixels().zip(alpha.pixels()) {
        out.extend_from_slice(&[r, g, b, a]);
    }
    Ok(out)
}
