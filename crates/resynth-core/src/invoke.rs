//! Synthesis invoker: raw region buffers in, raw synthesized buffer out.
//!
//! Runs the buffer-level half of the pipeline in one call:
//!
//! 1. Split the RGBA buffer into RGB and the original alpha plane
//! 2. Binarize the coverage buffer into a [`FillMask`]
//! 3. Call the [`Synthesizer`] on RGB + mask
//! 4. Check the result has the input's dimensions
//! 5. Reattach the original alpha and flatten back to RGBA bytes
//!
//! Nothing here touches the document. A failure at any step leaves the
//! caller with no output to write.
//!
//! [`run`] is the entry point for hosts that do their own reads and writes
//! and cannot offer a [`Document`](crate::Document): they hand in the
//! region buffers and write the returned bytes back themselves. The
//! staged [`Pipeline`](crate::Pipeline) uses the same buffer adapter and
//! `invoke_synthesizer` step by step instead, so it can report each
//! stage.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use image::RgbImage;

use crate::buffer::{self, FillMask};
use crate::synth::Synthesizer;
use crate::types::{Rect, ResynthError};

/// Synthesize the masked pixels of a region buffer.
///
/// Buffer-level counterpart of
/// [`resynthesize_selection`](crate::resynthesize_selection): no region is
/// computed and nothing is written.
///
/// `pixels` must be `region.width * region.height * 4` bytes of RGBA and
/// `coverage` must be `region.width * region.height` bytes. The returned
/// buffer has the same length as `pixels`, with every alpha byte copied
/// from `pixels`.
///
/// # Errors
///
/// - [`ResynthError::MalformedBuffer`] if either buffer has the wrong
///   length for `region`.
/// - [`ResynthError::SynthesisFailed`] if the synthesizer returns an
///   error, panics, or returns an image of the wrong size.
pub fn run<S: Synthesizer + ?Sized>(
    region: Rect,
    pixels: &[u8],
    coverage: &[u8],
    synthesizer: &S,
) -> Result<Vec<u8>, ResynthError> {
    let planes = buffer::to_image(pixels, region.width, region.height)?;
    let mask = buffer::to_mask(coverage, region.width, region.height)?;
    let rgb = invoke_synthesizer(synthesizer, &planes.rgb, &mask)?;
    buffer::from_planes(&rgb, &planes.alpha)
}

/// Call the synthesizer, converting every failure mode into
/// [`ResynthError::SynthesisFailed`].
///
/// Panics inside the engine are caught so that a misbehaving binding
/// reports an error instead of tearing down the host.
pub(crate) fn invoke_synthesizer<S: Synthesizer + ?Sized>(
    synthesizer: &S,
    image: &RgbImage,
    mask: &FillMask,
) -> Result<RgbImage, ResynthError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| synthesizer.synthesize(image, mask)));

    let output = match outcome {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(ResynthError::SynthesisFailed(e.to_string())),
        Err(payload) => {
            return Err(ResynthError::SynthesisFailed(format!(
                "synthesizer panicked: {}",
                panic_message(payload.as_ref())
            )));
        }
    };

    if output.dimensions() != image.dimensions() {
        let (in_w, in_h) = image.dimensions();
        let (out_w, out_h) = output.dimensions();
        return Err(ResynthError::SynthesisFailed(format!(
            "synthesizer returned a {out_w}x{out_h} image for a {in_w}x{in_h} input"
        )));
    }

    Ok(output)
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::synth::SynthesisError;

    const REGION: Rect = Rect::new(5, 5, 3, 2);

    fn pixels() -> Vec<u8> {
        (0..24).collect()
    }

    fn coverage() -> Vec<u8> {
        vec![0, 0, 1, 0, 200, 0]
    }

    fn fill_with(
        color: [u8; 3],
    ) -> impl Fn(&RgbImage, &FillMask) -> Result<RgbImage, SynthesisError> {
        move |image, mask| {
            let mut out = image.clone();
            for (x, y, p) in out.enumerate_pixels_mut() {
                if mask.is_fill(x, y) {
                    *p = Rgb(color);
                }
            }
            Ok(out)
        }
    }

    #[test]
    fn replaces_only_masked_colour() {
        let input = pixels();
        let out = run(REGION, &input, &coverage(), &fill_with([9, 9, 9])).unwrap();

        assert_eq!(out.len(), input.len());
        for (i, (o, orig)) in out.chunks_exact(4).zip(input.chunks_exact(4)).enumerate() {
            if coverage()[i] > 0 {
                assert_eq!(&o[..3], &[9, 9, 9], "pixel {i} should be filled");
            } else {
                assert_eq!(&o[..3], &orig[..3], "pixel {i} should be untouched");
            }
        }
    }

    #[test]
    fn alpha_survives_even_when_synthesizer_rewrites_everything() {
        let input = pixels();
        let everything = |image: &RgbImage, _: &FillMask| -> Result<RgbImage, SynthesisError> {
            Ok(RgbImage::from_pixel(image.width(), image.height(), Rgb([77, 77, 77])))
        };
        let out = run(REGION, &input, &coverage(), &everything).unwrap();
        for (o, orig) in out.chunks_exact(4).zip(input.chunks_exact(4)) {
            assert_eq!(o[3], orig[3]);
        }
    }

    #[test]
    fn synthesizer_sees_rgb_and_binary_mask() {
        let input = pixels();
        let inspect = |image: &RgbImage, mask: &FillMask| -> Result<RgbImage, SynthesisError> {
            assert_eq!(image.dimensions(), (3, 2));
            assert_eq!(image.get_pixel(0, 0).0, [0, 1, 2]);
            assert_eq!(mask.as_gray().as_raw(), &[0, 0, 255, 0, 255, 0]);
            Ok(image.clone())
        };
        let out = run(REGION, &input, &coverage(), &inspect).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn synthesizer_error_becomes_synthesis_failed() {
        let fail = |_: &RgbImage, _: &FillMask| -> Result<RgbImage, SynthesisError> {
            Err("out of patches".into())
        };
        let result = run(REGION, &pixels(), &coverage(), &fail);
        match result {
            Err(ResynthError::SynthesisFailed(msg)) => assert!(msg.contains("out of patches")),
            other => panic!("expected SynthesisFailed, got {other:?}"),
        }
    }

    #[test]
    fn synthesizer_panic_becomes_synthesis_failed() {
        let explode = |_: &RgbImage, _: &FillMask| -> Result<RgbImage, SynthesisError> {
            panic!("engine crashed")
        };
        let result = run(REGION, &pixels(), &coverage(), &explode);
        match result {
            Err(ResynthError::SynthesisFailed(msg)) => assert!(msg.contains("engine crashed")),
            other => panic!("expected SynthesisFailed, got {other:?}"),
        }
    }

    #[test]
    fn wrong_output_size_becomes_synthesis_failed() {
        let shrink = |_: &RgbImage, _: &FillMask| -> Result<RgbImage, SynthesisError> {
            Ok(RgbImage::new(2, 2))
        };
        let result = run(REGION, &pixels(), &coverage(), &shrink);
        match result {
            Err(ResynthError::SynthesisFailed(msg)) => {
                assert!(msg.contains("2x2"), "message: {msg}");
                assert!(msg.contains("3x2"), "message: {msg}");
            }
            other => panic!("expected SynthesisFailed, got {other:?}"),
        }
    }

    #[test]
    fn malformed_pixels_are_reported_before_synthesis() {
        let never = |_: &RgbImage, _: &FillMask| -> Result<RgbImage, SynthesisError> {
            panic!("synthesizer must not run")
        };
        let result = run(REGION, &pixels()[..20], &coverage(), &never);
        assert!(matches!(result, Err(ResynthError::MalformedBuffer { .. })));
    }

    #[test]
    fn malformed_coverage_is_reported_before_synthesis() {
        let never = |_: &RgbImage, _: &FillMask| -> Result<RgbImage, SynthesisError> {
            panic!("synthesizer must not run")
        };
        let result = run(REGION, &pixels(), &[0; 7], &never);
        assert!(matches!(result, Err(ResynthError::MalformedBuffer { .. })));
    }

    #[test]
    fn empty_mask_still_invokes_the_synthesizer() {
        let calls = std::cell::Cell::new(0);
        let count = |image: &RgbImage, _: &FillMask| -> Result<RgbImage, SynthesisError> {
            calls.set(calls.get() + 1);
            Ok(image.clone())
        };
        let out = run(REGION, &pixels(), &[0; 6], &count).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(out, pixels());
    }
}
