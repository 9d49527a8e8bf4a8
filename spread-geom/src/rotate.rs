// SPDX-License-Identifier: MIT
//! Rotation geometry.
//!
//! Sign convention: **positive degrees rotate clockwise as the user sees
//! it**. In y-down raster coordinates the standard rotation matrix
//! `[cos −sin; sin cos]` already turns content clockwise on screen, so this
//! module uses it directly. Any call site that renders through a y-up
//! back-end must negate the angle before building its own transform. Two
//! back-ends disagreeing on this sign is the classic source of
//! preview/capture mismatch, so the convention lives here and nowhere else.

use crate::Size;

/// Number of clockwise quarter turns when `degrees` is (close to) a
/// multiple of 90, else `None`. Tolerates float noise from settings math.
pub fn quarter_turns(degrees: f32) -> Option<u8> {
    let norm = degrees.rem_euclid(360.0);
    for (turns, angle) in [(0u8, 0.0f32), (1, 90.0), (2, 180.0), (3, 270.0)] {
        if (norm - angle).abs() < 1e-3 || (norm - angle - 360.0).abs() < 1e-3 {
            return Some(turns);
        }
    }
    None
}

/// Size of the axis-aligned bounding box after rotating `size` by
/// `degrees`. Quarter turns are exact (90/270 swap the axes); arbitrary
/// angles use `ceil(h·|sinθ| + w·|cosθ|)` per axis.
pub fn rotated_size(size: Size, degrees: f32) -> Size {
    match quarter_turns(degrees) {
        Some(0) | Some(2) => size,
        Some(_) => Size { w: size.h, h: size.w },
        None => {
            let rad = f64::from(degrees).to_radians();
            let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
            let (w, h) = (f64::from(size.w), f64::from(size.h));
            Size {
                w: (h * sin + w * cos).ceil() as u32,
                h: (h * cos + w * sin).ceil() as u32,
            }
        }
    }
}

/// Affine rotation about `(cx, cy)`, row-major `[[a, b, tx], [d, e, ty]]`,
/// mapping `(x, y)` to `(a·x + b·y + tx, d·x + e·y + ty)`.
///
/// Positive `degrees` is clockwise on screen (y-down space, see module
/// docs).
pub fn rotation_about(cx: f32, cy: f32, degrees: f32) -> [[f32; 3]; 2] {
    let rad = degrees.to_radians();
    let (s, c) = rad.sin_cos();
    [
        [c, -s, cx - c * cx + s * cy],
        [s, c, cy - s * cx - c * cy],
    ]
}

/// Apply an affine matrix from [`rotation_about`] to a point.
pub fn apply(m: &[[f32; 3]; 2], x: f32, y: f32) -> (f32, f32) {
    (
        m[0][0] * x + m[0][1] * y + m[0][2],
        m[1][0] * x + m[1][1] * y + m[1][2],
    )
}
