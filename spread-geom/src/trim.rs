// SPDX-License-Identifier: MIT
//! Percentage-based trim model.
//!
//! Trims are expressed as fractions (0–100) of the frame they are applied
//! to: top/bottom against the height, left/right against the width. Because
//! the model is proportional, the same configuration produces the same
//! relative crop on a 1280×720 preview frame and a 4000×3000 capture frame,
//! which is the guarantee that makes "what you see is what you capture"
//! hold across the two pipelines.

use crate::{GeomError, PixelRect, Size};

/// Per-edge trim percentages. `left + right` and `top + bottom` must each
/// stay below 100 or the crop is empty and rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrimPct {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl TrimPct {
    pub const fn new(top: f32, bottom: f32, left: f32, right: f32) -> Self {
        Self { top, bottom, left, right }
    }

    /// True when no edge is trimmed at all.
    pub fn is_zero(self) -> bool {
        self.top == 0.0 && self.bottom == 0.0 && self.left == 0.0 && self.right == 0.0
    }
}

/// Convert percentage trims into a pixel crop rectangle for one frame.
///
/// Each percentage is multiplied by the relevant dimension and rounded to
/// the nearest pixel. Fails with [`GeomError::EmptyCrop`] when the trims
/// consume the whole axis; callers must treat that as invalid input, not
/// clamp it to a degenerate size.
pub fn pixel_trim(trim: TrimPct, frame: Size) -> Result<PixelRect, GeomError> {
    for value in [trim.top, trim.bottom, trim.left, trim.right] {
        if !value.is_finite() || value < 0.0 {
            return Err(GeomError::InvalidTrim { value });
        }
    }
    if trim.left + trim.right >= 100.0 {
        return Err(GeomError::EmptyCrop { axis: "horizontal", total: trim.left + trim.right });
    }
    if trim.top + trim.bottom >= 100.0 {
        return Err(GeomError::EmptyCrop { axis: "vertical", total: trim.top + trim.bottom });
    }

    let px = |pct: f32, dim: u32| -> u32 { ((f64::from(pct) / 100.0) * f64::from(dim)).round() as u32 };

    let top = px(trim.top, frame.h);
    let bottom = px(trim.bottom, frame.h);
    let left = px(trim.left, frame.w);
    let right = px(trim.right, frame.w);

    let w = frame.w.saturating_sub(left).saturating_sub(right);
    let h = frame.h.saturating_sub(top).saturating_sub(bottom);
    // Rounding can still eat the last pixel on tiny frames.
    if w == 0 {
        return Err(GeomError::EmptyCrop { axis: "horizontal", total: trim.left + trim.right });
    }
    if h == 0 {
        return Err(GeomError::EmptyCrop { axis: "vertical", total: trim.top + trim.bottom });
    }

    Ok(PixelRect { x: left, y: top, w, h })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrimmed_frame_is_full_rect() {
        let rect = pixel_trim(TrimPct::default(), Size::new(1280, 720)).unwrap();
        assert_eq!(rect, PixelRect::new(0, 0, 1280, 720));
    }

    #[test]
    fn percentages_round_to_nearest_pixel() {
        // 2560×1440 with 10% top / 5% bottom trims.
        let trim = TrimPct::new(10.0, 5.0, 0.0, 0.0);
        let rect = pixel_trim(trim, Size::new(2560, 1440)).unwrap();
        assert_eq!(rect.y, 144);
        assert_eq!(rect.h, 1440 - 144 - 72);
        assert_eq!(rect.w, 2560);
    }

    #[test]
    fn overfull_axis_is_rejected_for_every_frame_size() {
        let trim = TrimPct::new(0.0, 0.0, 60.0, 50.0);
        for size in [Size::new(640, 480), Size::new(1920, 1080), Size::new(8000, 6000)] {
            assert!(matches!(
                pixel_trim(trim, size),
                Err(GeomError::EmptyCrop { axis: "horizontal", .. })
            ));
        }
    }

    #[test]
    fn negative_and_nan_trims_are_rejected() {
        let frame = Size::new(1280, 720);
        assert!(pixel_trim(TrimPct::new(-1.0, 0.0, 0.0, 0.0), frame).is_err());
        assert!(pixel_trim(TrimPct::new(f32::NAN, 0.0, 0.0, 0.0), frame).is_err());
    }

    #[test]
    fn proportional_coverage_is_scale_invariant() {
        // Same aspect ratio at two scales: relative coverage matches ±1 px.
        let trim = TrimPct::new(7.5, 3.25, 12.0, 1.5);
        let small = pixel_trim(trim, Size::new(1280, 720)).unwrap();
        let large = pixel_trim(trim, Size::new(2560, 1440)).unwrap();
        assert!((i64::from(large.x) - 2 * i64::from(small.x)).abs() <= 2);
        assert!((i64::from(large.w) - 2 * i64::from(small.w)).abs() <= 2);
        assert!((i64::from(large.y) - 2 * i64::from(small.y)).abs() <= 2);
        assert!((i64::from(large.h) - 2 * i64::from(small.h)).abs() <= 2);
    }
}
