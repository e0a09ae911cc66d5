//! Stand-in synthesizers for exercising the pipeline without an engine.
//!
//! Neither produces convincing fills. They exist so the CLI can run a
//! complete read -> synthesize -> write cycle on real images.

use resynth_core::{FillMask, RgbImage, SynthesisError};

/// Fill every masked pixel with the mean colour of the context pixels.
///
/// # Errors
///
/// Fails if the mask leaves no context pixels to average.
pub fn flat(image: &RgbImage, mask: &FillMask) -> Result<RgbImage, SynthesisError> {
    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for (x, y, p) in image.enumerate_pixels() {
        if !mask.is_fill(x, y) {
            for (s, &c) in sum.iter_mut().zip(p.0.iter()) {
                *s += u64::from(c);
            }
            count += 1;
        }
    }
    if count == 0 {
        return Err("no context pixels to sample".into());
    }

    let mean = sum.map(|s| u8::try_from(s / count).unwrap_or(u8::MAX));
    let mut out = image.clone();
    for (x, y, p) in out.enumerate_pixels_mut() {
        if mask.is_fill(x, y) {
            p.0 = mean;
        }
    }
    Ok(out)
}

/// Return the input unchanged.
///
/// # Errors
///
/// Never fails.
#[allow(clippy::unnecessary_wraps)]
pub fn identity(image: &RgbImage, _mask: &FillMask) -> Result<RgbImage, SynthesisError> {
    Ok(image.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;
    use resynth_core::buffer::to_mask;

    use super::*;

    #[test]
    fn flat_fills_with_context_mean() {
        let mut image = RgbImage::new(3, 1);
        image.put_pixel(0, 0, Rgb([10, 20, 30]));
        image.put_pixel(1, 0, Rgb([200, 200, 200]));
        image.put_pixel(2, 0, Rgb([30, 40, 50]));
        let mask = to_mask(&[0, 255, 0], 3, 1).unwrap();

        let out = flat(&image, &mask).unwrap();

        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(out.get_pixel(1, 0).0, [20, 30, 40]);
        assert_eq!(out.get_pixel(2, 0).0, [30, 40, 50]);
    }

    #[test]
    fn flat_without_context_fails() {
        let image = RgbImage::new(2, 2);
        let mask = to_mask(&[1; 4], 2, 2).unwrap();
        let err = flat(&image, &mask).unwrap_err();
        assert!(err.to_string().contains("no context"));
    }

    #[test]
    fn identity_returns_input() {
        let image = RgbImage::from_pixel(2, 2, Rgb([4, 5, 6]));
        let mask = to_mask(&[0, 1, 0, 1], 2, 2).unwrap();
        assert_eq!(identity(&image, &mask).unwrap(), image);
    }
}
