// SPDX-License-Identifier: MIT
//! # spread-geom: Frame Geometry for Dual-Camera Spread Capture
//!
//! Pure geometry shared by the live preview renderer, the full-resolution
//! capture pipeline, and the ROI pattern detector. Nothing in this crate
//! performs I/O or holds state: every function receives its inputs and
//! returns its outputs, which is what makes concurrent use across two
//! camera sides (and worker offload) safe.
//!
//! ## Key components
//!
//! - [`trim`]: percentage-based trim model, fractions of the *current*
//!   frame, so the same settings apply to any sensor resolution.
//! - [`rotate`]: rotated bounding sizes and the affine rotation matrix.
//!   Positive degrees is always a **clockwise** visual rotation in y-down
//!   raster coordinates; back-ends working in y-up space negate at the
//!   call site.
//! - [`fit`]: fill-mode placement (`contain`/`cover`/`crop`) and
//!   field-of-view normalization, so a higher-resolution sensor does not
//!   look zoomed out next to a lower-resolution one.
//! - [`raster`]: the CPU execution path: BGRA crop, quarter-turn and
//!   arbitrary-angle rotation, SIMD scaling via `fast_image_resize` with
//!   a scalar nearest-neighbor fallback.
//!
//! ## Coordinate model
//!
//! All pixel rectangles are in y-down raster space with the origin at the
//! top-left of the frame. Trim percentages are evaluated against the frame
//! they are applied to, never cached across frames.

pub mod fit;
pub mod raster;
pub mod rotate;
pub mod trim;

pub use fit::{FillMode, FitPlacement, Placement};
pub use trim::TrimPct;

/// A 2D size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// True when either dimension is zero (camera not warmed up yet).
    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Byte length of a tightly packed BGRA buffer of this size.
    pub fn bgra_len(self) -> usize {
        self.w as usize * self.h as usize * 4
    }
}

/// An axis-aligned pixel rectangle, origin top-left, y-down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// The full extent of `size`.
    pub fn full(size: Size) -> Self {
        Self { x: 0, y: 0, w: size.w, h: size.h }
    }

    pub fn size(self) -> Size {
        Size { w: self.w, h: self.h }
    }

    /// True when this rect lies entirely inside a frame of `size`.
    pub fn contained_in(self, size: Size) -> bool {
        self.x.checked_add(self.w).is_some_and(|r| r <= size.w)
            && self.y.checked_add(self.h).is_some_and(|b| b <= size.h)
    }
}

/// Geometry failures. Always detected before any buffer allocation; an
/// empty crop is an explicit invalid marker, never a degenerate rectangle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeomError {
    #[error("{axis} trim percentages total {total:.1}%, leaving no pixels")]
    EmptyCrop { axis: &'static str, total: f32 },
    #[error("trim percentage must be a non-negative finite number, got {value}")]
    InvalidTrim { value: f32 },
    #[error("normalized rect component out of [0, 1]: {component} = {value}")]
    InvalidNormalizedRect { component: &'static str, value: f32 },
}
