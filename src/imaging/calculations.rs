//! Pure calculation functions for geometry, quality ladders and metrics.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Quality;

/// Tolerance used when comparing stepped qualities against the floor.
///
/// `1.0 - 5 * 0.1` is not exactly `0.5` in floating point; without the
/// tolerance the floor itself would be skipped.
const QUALITY_EPSILON: f32 = 1e-6;

/// Calculate dimensions that fit inside a `max_dimension` square.
///
/// Never upscales: if the longer edge already fits, the source dimensions are
/// returned unchanged. Otherwise both edges are scaled by
/// `max_dimension / longer_edge` and rounded to the nearest pixel (minimum 1).
///
/// # Examples
/// ```
/// # use imgfit::imaging::fit_within;
/// assert_eq!(fit_within((4000, 3000), 1024), (1024, 768));
/// assert_eq!(fit_within((800, 600), 1024), (800, 600));
/// ```
pub fn fit_within(source: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);
    if longer <= max_dimension || longer == 0 {
        return source;
    }

    let ratio = max_dimension as f64 / longer as f64;
    let scale = |edge: u32| ((edge as f64 * ratio).round() as u32).clamp(1, max_dimension.max(1));
    (scale(w), scale(h))
}

/// Scale both edges by `factor` (expected in `(0, 1)`), never below 1 pixel.
///
/// Used by the downscale escalation once the quality ladder is exhausted.
pub fn scale_dimensions(source: (u32, u32), factor: f64) -> (u32, u32) {
    let (w, h) = source;
    let scale = |edge: u32| ((edge as f64 * factor).round() as u32).clamp(1, edge.max(1));
    (scale(w), scale(h))
}

/// Build the descending quality ladder `initial, initial - step, …`.
///
/// Every rung is computed from the rung index rather than by repeated
/// subtraction, so the ladder does not drift. The ladder stops at the last
/// rung that is still `>= floor`. A non-positive step yields a single rung.
///
/// # Examples
/// ```
/// # use imgfit::imaging::quality_ladder;
/// let rungs: Vec<u8> = quality_ladder(1.0, 0.5, 0.1)
///     .into_iter()
///     .map(|q| q.percent())
///     .collect();
/// assert_eq!(rungs, vec![100, 90, 80, 70, 60, 50]);
/// ```
pub fn quality_ladder(initial: f32, floor: f32, step: f32) -> Vec<Quality> {
    let mut ladder = vec![Quality::new(initial)];
    if step <= 0.0 {
        return ladder;
    }

    for index in 1.. {
        let q = initial - index as f32 * step;
        if q + QUALITY_EPSILON < floor || q <= 0.0 {
            break;
        }
        // Snap to the floor when we land within rounding noise of it
        let q = if (q - floor).abs() <= QUALITY_EPSILON { floor } else { q };
        ladder.push(Quality::new(q));
    }
    ladder
}

/// Percentage reduction from `original` to `compressed` bytes.
///
/// Negative when the output grew. `None` when `original` is zero, because the
/// ratio is undefined.
pub fn percentage_reduction(original: u64, compressed: u64) -> Option<f64> {
    if original == 0 {
        return None;
    }
    Some((original as f64 - compressed as f64) / original as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // =========================================================================
    // fit_within tests
    // =========================================================================

    #[test]
    fn fit_landscape_to_bound() {
        assert_eq!(fit_within((4000, 3000), 1024), (1024, 768));
    }

    #[test]
    fn fit_portrait_to_bound() {
        assert_eq!(fit_within((3000, 4000), 1024), (768, 1024));
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(fit_within((800, 600), 1024), (800, 600));
        assert_eq!(fit_within((1024, 1024), 1024), (1024, 1024));
    }

    #[test]
    fn fit_extreme_aspect_keeps_one_pixel() {
        // 10000x3 → 1024 x 0.307 → rounds to 0, clamped to 1
        assert_eq!(fit_within((10000, 3), 1024), (1024, 1));
    }

    #[test]
    fn fit_rounds_to_nearest() {
        // 1000x335 → 512 x 171.52 → 172
        assert_eq!(fit_within((1000, 335), 512), (512, 172));
    }

    proptest! {
        #[test]
        fn fit_respects_bound_and_aspect(w in 1u32..20_000, h in 1u32..20_000, max in 1u32..4096) {
            let (fw, fh) = fit_within((w, h), max);

            prop_assert!(fw >= 1 && fh >= 1);
            prop_assert!(fw <= w && fh <= h);
            prop_assert!(fw.max(fh) <= max);

            if w.max(h) > max {
                prop_assert_eq!(fw.max(fh), max);
                // Shorter edge within one pixel of the exact scaled value
                let (short, long, fitted_short) = if w >= h { (h, w, fh) } else { (w, h, fw) };
                let exact = short as f64 * max as f64 / long as f64;
                prop_assert!((fitted_short as f64 - exact).abs() <= 1.0);
            } else {
                prop_assert_eq!((fw, fh), (w, h));
            }
        }
    }

    // =========================================================================
    // scale_dimensions tests
    // =========================================================================

    #[test]
    fn scale_shrinks_both_edges() {
        assert_eq!(scale_dimensions((1000, 500), 0.9), (900, 450));
    }

    #[test]
    fn scale_never_reaches_zero() {
        assert_eq!(scale_dimensions((1, 1), 0.5), (1, 1));
    }

    // =========================================================================
    // quality_ladder tests
    // =========================================================================

    #[test]
    fn ladder_reaches_floor_exactly() {
        let ladder = quality_ladder(1.0, 0.5, 0.1);
        assert_eq!(ladder.len(), 6);
        assert_eq!(ladder.first().unwrap().value(), 1.0);
        assert_eq!(ladder.last().unwrap().value(), 0.5);
    }

    #[test]
    fn ladder_stops_above_floor_when_step_overshoots() {
        // 1.0, 0.7; the next rung 0.4 is below the 0.5 floor
        let ladder = quality_ladder(1.0, 0.5, 0.3);
        let percents: Vec<u8> = ladder.iter().map(|q| q.percent()).collect();
        assert_eq!(percents, vec![100, 70]);
    }

    #[test]
    fn ladder_with_floor_equal_to_initial_has_one_rung() {
        assert_eq!(quality_ladder(1.0, 1.0, 0.1).len(), 1);
    }

    #[test]
    fn ladder_with_zero_step_has_one_rung() {
        assert_eq!(quality_ladder(0.8, 0.5, 0.0).len(), 1);
    }

    #[test]
    fn ladder_is_strictly_decreasing() {
        let ladder = quality_ladder(0.95, 0.1, 0.05);
        assert!(ladder.windows(2).all(|w| w[0].value() > w[1].value()));
        assert!(ladder.iter().all(|q| q.value() >= 0.1 - QUALITY_EPSILON));
    }

    // =========================================================================
    // percentage_reduction tests
    // =========================================================================

    #[test]
    fn reduction_positive_when_smaller() {
        assert_eq!(percentage_reduction(1000, 250), Some(75.0));
    }

    #[test]
    fn reduction_negative_when_grown() {
        assert_eq!(percentage_reduction(1000, 1100), Some(-10.0));
    }

    #[test]
    fn reduction_undefined_for_empty_original() {
        assert_eq!(percentage_reduction(0, 10), None);
    }
}
