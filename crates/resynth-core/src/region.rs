//! Working-region calculation: pad the selection, clamp to the document.
//!
//! The synthesizer learns from whatever unselected pixels surround the
//! selection, so the region handed to it is the selection grown by
//! `padding` on every side. Growth stops at the document edges; clamping
//! on one or both axes is expected and is not an error.
//!
//! This is the first step of a run and is a pure function of its inputs.

use crate::types::{Dimensions, Rect, ResynthError};

/// Compute the padded, clamped working region for a selection.
///
/// The selection is expanded to `[sel_x - p, sel_x + sel_w + p)` by
/// `[sel_y - p, sel_y + sel_h + p)` and then intersected with
/// `[0, W) x [0, H)`. Arithmetic is done in `i64` so neither the padding
/// nor the far edges can overflow.
///
/// # Errors
///
/// - [`ResynthError::SelectionTooLarge`] if the selection is at least as
///   wide and as tall as the document, whatever the padding. This is
///   checked first, so it wins over an invalid padding.
/// - [`ResynthError::InvalidPadding`] if `padding` is negative.
/// - [`ResynthError::EmptySelection`] if the selection has zero width or
///   height.
/// - [`ResynthError::SelectionOutOfBounds`] if the selection does not
///   intersect the document, leaving an empty region.
pub fn compute_region(
    selection: Rect,
    bounds: Dimensions,
    padding: i32,
) -> Result<Rect, ResynthError> {
    if selection.width >= bounds.width && selection.height >= bounds.height {
        return Err(ResynthError::SelectionTooLarge { bounds });
    }
    if padding < 0 {
        return Err(ResynthError::InvalidPadding(padding));
    }
    if selection.is_empty() {
        return Err(ResynthError::EmptySelection);
    }

    let pad = i64::from(padding);
    let x0 = i64::from(selection.x) - pad;
    let y0 = i64::from(selection.y) - pad;
    let x1 = i64::from(selection.x) + i64::from(selection.width) + pad;
    let y1 = i64::from(selection.y) + i64::from(selection.height) + pad;

    let x = x0.max(0);
    let y = y0.max(0);
    let w = x1.min(i64::from(bounds.width)) - x;
    let h = y1.min(i64::from(bounds.height)) - y;

    if w <= 0 || h <= 0 {
        return Err(ResynthError::SelectionOutOfBounds { selection, bounds });
    }

    // Every value is now within [0, u32::MAX] because it is bounded by the
    // document dimensions.
    let narrow = |v: i64| {
        u32::try_from(v).map_err(|_| ResynthError::SelectionOutOfBounds { selection, bounds })
    };
    Ok(Rect::new(narrow(x)?, narrow(y)?, narrow(w)?, narrow(h)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn interior_selection_grows_on_all_sides() {
        let region = compute_region(
            Rect::new(400, 400, 200, 200),
            Dimensions::new(1000, 1000),
            100,
        )
        .unwrap();
        assert_eq!(region, Rect::new(300, 300, 400, 400));
    }

    #[test]
    fn full_document_selection_is_too_large() {
        for padding in [0, 1, 100, 5000] {
            let result = compute_region(
                Rect::new(0, 0, 500, 500),
                Dimensions::new(500, 500),
                padding,
            );
            assert!(
                matches!(result, Err(ResynthError::SelectionTooLarge { .. })),
                "padding {padding}: expected SelectionTooLarge, got {result:?}",
            );
        }
    }

    #[test]
    fn full_document_selection_wins_over_negative_padding() {
        let result = compute_region(Rect::new(0, 0, 500, 500), Dimensions::new(500, 500), -20);
        assert!(matches!(result, Err(ResynthError::SelectionTooLarge { .. })));
    }

    #[test]
    fn oversized_selection_is_too_large() {
        let result = compute_region(Rect::new(0, 0, 600, 700), Dimensions::new(500, 500), 10);
        assert!(matches!(result, Err(ResynthError::SelectionTooLarge { .. })));
    }

    #[test]
    fn clamps_at_both_low_and_high_edges() {
        let region =
            compute_region(Rect::new(0, 0, 100, 100), Dimensions::new(300, 300), 200).unwrap();
        assert_eq!(region, Rect::new(0, 0, 300, 300));
    }

    #[test]
    fn full_width_but_partial_height_is_allowed() {
        let region =
            compute_region(Rect::new(0, 40, 200, 20), Dimensions::new(200, 100), 10).unwrap();
        assert_eq!(region, Rect::new(0, 30, 200, 40));
    }

    #[test]
    fn padding_covering_whole_document_is_allowed() {
        // Only the selection itself is checked against the document size.
        let region =
            compute_region(Rect::new(10, 10, 5, 5), Dimensions::new(30, 30), 1000).unwrap();
        assert_eq!(region, Rect::new(0, 0, 30, 30));
    }

    #[test]
    fn zero_padding_returns_the_selection() {
        let selection = Rect::new(7, 9, 11, 13);
        let region = compute_region(selection, Dimensions::new(50, 50), 0).unwrap();
        assert_eq!(region, selection);
    }

    #[test]
    fn negative_padding_is_rejected() {
        let result = compute_region(Rect::new(10, 10, 5, 5), Dimensions::new(30, 30), -3);
        assert!(matches!(result, Err(ResynthError::InvalidPadding(-3))));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let result = compute_region(Rect::new(10, 10, 0, 5), Dimensions::new(30, 30), 3);
        assert!(matches!(result, Err(ResynthError::EmptySelection)));
    }

    #[test]
    fn selection_past_the_document_is_rejected() {
        let result = compute_region(Rect::new(40, 0, 5, 5), Dimensions::new(30, 30), 3);
        assert!(matches!(
            result,
            Err(ResynthError::SelectionOutOfBounds { .. })
        ));
    }

    #[test]
    fn selection_overhanging_the_edge_is_clamped() {
        let region =
            compute_region(Rect::new(25, 25, 10, 10), Dimensions::new(30, 30), 2).unwrap();
        assert_eq!(region, Rect::new(23, 23, 7, 7));
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let region = compute_region(
            Rect::new(u32::MAX - 1, 0, 1, 1),
            Dimensions::new(u32::MAX, 10),
            i32::MAX,
        )
        .unwrap();
        assert_eq!(region, Rect::new(2_147_483_647, 0, 2_147_483_648, 10));
    }

    #[test]
    fn regions_stay_inside_the_document() {
        // Exhaustive sweep over small documents, selections and paddings.
        for doc_w in 1..=6 {
            for doc_h in 1..=6 {
                let bounds = Dimensions::new(doc_w, doc_h);
                for x in 0..doc_w {
                    for y in 0..doc_h {
                        for w in 1..=doc_w - x {
                            for h in 1..=doc_h - y {
                                for padding in [0, 1, 2, 7] {
                                    let selection = Rect::new(x, y, w, h);
                                    let result = compute_region(selection, bounds, padding);
                                    if w >= doc_w && h >= doc_h {
                                        assert!(matches!(
                                            result,
                                            Err(ResynthError::SelectionTooLarge { .. })
                                        ));
                                        continue;
                                    }
                                    let region = result.unwrap();
                                    assert!(!region.is_empty());
                                    assert!(
                                        region.fits_within(bounds),
                                        "{region} escapes {bounds} for {selection} p={padding}",
                                    );
                                    // The region always contains the selection.
                                    assert!(region.x <= selection.x && region.y <= selection.y);
                                    assert!(region.right() >= selection.right());
                                    assert!(region.bottom() >= selection.bottom());
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn repeated_calls_agree() {
        let selection = Rect::new(12, 3, 40, 17);
        let bounds = Dimensions::new(64, 32);
        let first = compute_region(selection, bounds, 9).unwrap();
        let second = compute_region(selection, bounds, 9).unwrap();
        assert_eq!(first, second);
    }
}
