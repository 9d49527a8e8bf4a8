// SPDX-License-Identifier: MIT
//! Fill-mode placement and field-of-view normalization.
//!
//! `plan_blit` answers "where does a source frame land on a destination
//! surface" for the three fill modes; `fov_crop` answers "how much of a
//! high-resolution sensor should be visible at all" so that swapping a
//! 720p camera for a 4K one does not make the page look zoomed out.

use crate::{GeomError, PixelRect, Size};

/// How a transformed image is placed into a target surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillMode {
    /// Whole source visible, letterbox/pillarbox padding as needed.
    #[default]
    Contain,
    /// Surface fully covered, source overflow cropped equally on both ends.
    Cover,
    /// Same geometry as `Cover`; kept distinct because callers treat the
    /// overflow as a deliberate crop rather than incidental.
    Crop,
}

/// Centered scale result of [`fit_scale`]. `x`/`y` may be negative under
/// `Cover`/`Crop` when the scaled source overflows the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitPlacement {
    pub scale: f32,
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

/// Blit geometry in both coordinate spaces: the source window to read and
/// the destination rectangle to write. `dst` is always inside the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub src: PixelRect,
    pub dst: PixelRect,
}

/// Rounding slack below which the scaled edge snaps to the surface edge.
/// Prefer exact edge-to-edge fill over a 1-pixel letterbox sliver; beyond
/// this the mismatch is real aspect difference and must not be distorted.
const EDGE_SNAP_PX: i64 = 2;

/// Scale `src` into `dst` under `fill`, centered.
pub fn fit_scale(src: Size, dst: Size, fill: FillMode) -> FitPlacement {
    if src.is_empty() || dst.is_empty() {
        return FitPlacement { scale: 0.0, x: 0, y: 0, w: 0, h: 0 };
    }
    let sx = dst.w as f64 / src.w as f64;
    let sy = dst.h as f64 / src.h as f64;
    let scale = match fill {
        FillMode::Contain => sx.min(sy),
        FillMode::Cover | FillMode::Crop => sx.max(sy),
    };
    let mut w = (f64::from(src.w) * scale).round() as i64;
    let mut h = (f64::from(src.h) * scale).round() as i64;
    if (w - i64::from(dst.w)).abs() <= EDGE_SNAP_PX {
        w = i64::from(dst.w);
    }
    if (h - i64::from(dst.h)).abs() <= EDGE_SNAP_PX {
        h = i64::from(dst.h);
    }
    let w = w.max(1) as u32;
    let h = h.max(1) as u32;
    FitPlacement {
        scale: scale as f32,
        x: (i64::from(dst.w) - i64::from(w)) as i32 / 2,
        y: (i64::from(dst.h) - i64::from(h)) as i32 / 2,
        w,
        h,
    }
}

/// Resolve [`fit_scale`] into a source window and an in-bounds destination
/// rectangle, ready for the raster path.
///
/// Under `Contain` the full source maps to a centered sub-rect of the
/// surface; under `Cover`/`Crop` a centered window of the source maps to
/// the full surface.
pub fn plan_blit(src: Size, surface: Size, fill: FillMode) -> Placement {
    let fit = fit_scale(src, surface, fill);
    if fit.scale <= 0.0 {
        return Placement { src: PixelRect::full(src), dst: PixelRect::new(0, 0, 0, 0) };
    }
    match fill {
        FillMode::Contain => Placement {
            src: PixelRect::full(src),
            dst: PixelRect::new(fit.x.max(0) as u32, fit.y.max(0) as u32, fit.w.min(surface.w), fit.h.min(surface.h)),
        },
        FillMode::Cover | FillMode::Crop => {
            // Window of the source that lands on the surface once scaled.
            let win_w = ((f64::from(surface.w) / f64::from(fit.scale)).round() as u32).clamp(1, src.w);
            let win_h = ((f64::from(surface.h) / f64::from(fit.scale)).round() as u32).clamp(1, src.h);
            Placement {
                src: PixelRect::new((src.w - win_w) / 2, (src.h - win_h) / 2, win_w, win_h),
                dst: PixelRect::full(surface),
            }
        }
    }
}

/// Ratio above which a sensor is considered oversized for the baseline
/// field of view. Empirical: a 2.5× linear factor keeps subjects at a
/// consistent apparent size across the sensors the scanner supports.
pub const DEFAULT_FOV_RATIO: f32 = 2.5;

/// Normalize the apparent field of view of a frame against a baseline
/// resolution. Returns the centered crop window to use: the full frame
/// when neither axis exceeds `base × max_ratio`, otherwise a window of
/// `min(w, base.w·r) × min(h, base.h·r)`.
pub fn fov_crop(size: Size, base: Size, max_ratio: f32) -> PixelRect {
    if size.is_empty() || base.is_empty() {
        return PixelRect::full(size);
    }
    let rw = size.w as f32 / base.w as f32;
    let rh = size.h as f32 / base.h as f32;
    if rw <= max_ratio && rh <= max_ratio {
        return PixelRect::full(size);
    }
    let w = size.w.min((base.w as f64 * f64::from(max_ratio)).round() as u32).max(1);
    let h = size.h.min((base.h as f64 * f64::from(max_ratio)).round() as u32).max(1);
    PixelRect::new((size.w - w) / 2, (size.h - h) / 2, w, h)
}

/// Proportional downscale target with the longest edge clamped to
/// `max_edge`. Never upscales.
pub fn shrink_to_edge(size: Size, max_edge: u32) -> Size {
    let long = size.w.max(size.h);
    if long <= max_edge || long == 0 {
        return size;
    }
    let s = f64::from(max_edge) / f64::from(long);
    Size {
        w: ((f64::from(size.w) * s).round() as u32).max(1),
        h: ((f64::from(size.h) * s).round() as u32).max(1),
    }
}

/// A rectangle expressed as fractions of frame width/height, so the same
/// region applies to any sensor resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl NormalizedRect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Resolve against a concrete frame size. The result is always fully
    /// contained in the frame; components outside `[0, 1]` or spans past
    /// the far edge are rejected.
    pub fn to_pixels(self, frame: Size) -> Result<PixelRect, GeomError> {
        for (component, value) in [("x", self.x), ("y", self.y), ("w", self.w), ("h", self.h)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(GeomError::InvalidNormalizedRect { component, value });
            }
        }
        if self.x + self.w > 1.0 + f32::EPSILON {
            return Err(GeomError::InvalidNormalizedRect { component: "x+w", value: self.x + self.w });
        }
        if self.y + self.h > 1.0 + f32::EPSILON {
            return Err(GeomError::InvalidNormalizedRect { component: "y+h", value: self.y + self.h });
        }
        let x = ((f64::from(self.x) * f64::from(frame.w)).floor() as u32).min(frame.w.saturating_sub(1));
        let y = ((f64::from(self.y) * f64::from(frame.h)).floor() as u32).min(frame.h.saturating_sub(1));
        let w = ((f64::from(self.w) * f64::from(frame.w)).round() as u32).clamp(1, frame.w - x);
        let h = ((f64::from(self.h) * f64::from(frame.h)).round() as u32).clamp(1, frame.h - y);
        Ok(PixelRect { x, y, w, h })
    }
}
