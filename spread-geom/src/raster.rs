// SPDX-License-Identifier: MIT
//! CPU raster path: BGRA crop, rotate, scale and letterbox fill.
//!
//! The preferred scaling engine is `fast_image_resize` (SIMD). When it
//! cannot be used (buffer layout it rejects, or an initialization failure
//! on exotic targets) callers switch to [`RenderBackend::Scalar`], a plain
//! nearest-neighbor path that produces visually equivalent output: same
//! rotation direction, same crop semantics, same centering. The backend is
//! chosen once at start-up or on first failure, never re-checked per frame.

use fast_image_resize as fir;
use fir::images::{TypedCroppedImageMut, TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::fit::Placement;
use crate::rotate::rotated_size;
use crate::{PixelRect, Size};

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("output buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },
    #[error("source stride differs from packed rows but no staging buffer was provided")]
    StrideMismatchAndNoStaging,
    #[error("resize failed: {0}")]
    Resize(#[from] fir::ResizeError),
    #[error("image buffer rejected: {0}")]
    ImageBuf(#[from] fir::ImageBufferError),
    #[error("crop rejected: {0}")]
    Crop(#[from] fir::CropBoxError),
}

/// Which scaling engine executes blits. `Simd` is preferred; `Scalar` is
/// the mandatory fallback when the vision library path is unavailable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderBackend {
    #[default]
    Simd,
    Scalar,
}

/// Pre-allocated scratch used to compact strided input to tightly packed
/// rows, and as the intermediate for crop extraction. One per task, never
/// shared across camera sides.
pub struct Staging {
    pub(crate) buf: Vec<u8>,
}

impl Staging {
    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    pub fn ensure_len(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for Staging {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

/// Extract `roi` from a (possibly strided) BGRA buffer into `staging` as
/// tightly packed rows. `roi` must be contained in the source.
pub fn crop_bgra(src: &[u8], src_pitch: usize, roi: PixelRect, staging: &mut Staging) {
    let row_bytes = roi.w as usize * 4;
    staging.ensure_len(row_bytes * roi.h as usize);
    let mut off = 0usize;
    for r in 0..roi.h as usize {
        let row_off = (roi.y as usize + r) * src_pitch + roi.x as usize * 4;
        staging.buf[off..off + row_bytes].copy_from_slice(&src[row_off..row_off + row_bytes]);
        off += row_bytes;
    }
}

/// Rotate a packed BGRA image by `turns` clockwise quarter turns into
/// `dst`, resizing it as needed. Returns the rotated size.
pub fn rotate_quarter_bgra(src: &[u8], size: Size, turns: u8, dst: &mut Vec<u8>) -> Size {
    let out = match turns & 3 {
        0 | 2 => size,
        _ => Size { w: size.h, h: size.w },
    };
    dst.resize(out.bgra_len(), 0);
    if turns & 3 == 0 {
        dst.copy_from_slice(&src[..out.bgra_len()]);
        return out;
    }
    let (w, h) = (size.w as usize, size.h as usize);
    for y in 0..h {
        for x in 0..w {
            // Clockwise on screen, y-down raster space.
            let (ox, oy) = match turns & 3 {
                1 => (h - 1 - y, x),
                2 => (w - 1 - x, h - 1 - y),
                _ => (y, w - 1 - x),
            };
            let s = (y * w + x) * 4;
            let d = (oy * out.w as usize + ox) * 4;
            dst[d..d + 4].copy_from_slice(&src[s..s + 4]);
        }
    }
    out
}

/// Rotate a packed BGRA image by an arbitrary angle (positive = clockwise
/// on screen) into its axis-aligned bounding box, nearest-neighbor sampled,
/// background-filled where the box extends past the source.
pub fn rotate_arbitrary_bgra(src: &[u8], size: Size, degrees: f32, bg: [u8; 4], dst: &mut Vec<u8>) -> Size {
    let out = rotated_size(size, degrees);
    dst.resize(out.bgra_len(), 0);
    // Inverse mapping: walk output pixels, rotate back by -degrees into
    // source space (same sign convention as rotate::rotation_about).
    let rad = f64::from(-degrees).to_radians();
    let (s, c) = rad.sin_cos();
    let (src_cx, src_cy) = (f64::from(size.w) / 2.0, f64::from(size.h) / 2.0);
    let (out_cx, out_cy) = (f64::from(out.w) / 2.0, f64::from(out.h) / 2.0);
    let (w, h) = (size.w as usize, size.h as usize);
    for oy in 0..out.h as usize {
        for ox in 0..out.w as usize {
            let dx = ox as f64 + 0.5 - out_cx;
            let dy = oy as f64 + 0.5 - out_cy;
            let sx = c * dx - s * dy + src_cx - 0.5;
            let sy = s * dx + c * dy + src_cy - 0.5;
            let d = (oy * out.w as usize + ox) * 4;
            let (rx, ry) = (sx.round(), sy.round());
            if rx >= 0.0 && ry >= 0.0 && (rx as usize) < w && (ry as usize) < h {
                let sidx = (ry as usize * w + rx as usize) * 4;
                dst[d..d + 4].copy_from_slice(&src[sidx..sidx + 4]);
            } else {
                dst[d..d + 4].copy_from_slice(&bg);
            }
        }
    }
    out
}

#[inline]
pub fn fill_bgra(dst: &mut [u8], bg: [u8; 4]) {
    for px in dst.chunks_exact_mut(4) {
        px.copy_from_slice(&bg);
    }
}

/// Scale the `placement.src` window of a BGRA source into the
/// `placement.dst` rectangle of a surface-sized `dst` buffer, filling the
/// rest with `bg` (letterbox/pillarbox).
///
/// `src_stride_bytes`: bytes per source row; when it differs from packed
/// rows the input is compacted through `staging` first (the SIMD engine
/// requires packed buffers).
#[allow(clippy::too_many_arguments)]
pub fn scale_blit(
    backend: RenderBackend,
    resizer: &mut Resizer,
    src_bgra: &[u8],
    src: Size,
    src_stride_bytes: Option<usize>,
    placement: Placement,
    surface: Size,
    dst: &mut [u8],
    bg: [u8; 4],
    mut staging: Option<&mut Staging>,
) -> Result<(), RasterError> {
    let need = surface.bgra_len();
    if dst.len() < need {
        return Err(RasterError::BufferTooSmall { need, have: dst.len() });
    }
    if placement.dst.w == 0 || placement.dst.h == 0 {
        fill_bgra(&mut dst[..need], bg);
        return Ok(());
    }

    let tight_row_bytes = src.w as usize * 4;
    let packed: &[u8] = match src_stride_bytes {
        Some(pitch) if pitch != tight_row_bytes => {
            let st = staging.as_deref_mut().ok_or(RasterError::StrideMismatchAndNoStaging)?;
            st.ensure_len(tight_row_bytes * src.h as usize);
            compact_rows(src_bgra, pitch, st.buf.as_mut_slice(), tight_row_bytes, src.h as usize);
            st.as_slice()
        }
        _ => src_bgra,
    };

    fill_bgra(&mut dst[..need], bg);

    match backend {
        RenderBackend::Simd => {
            let src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, packed)?;
            let mut dst_image = TypedImage::<U8x4>::from_buffer(surface.w, surface.h, dst)?;
            let mut roi = TypedCroppedImageMut::from_ref(
                &mut dst_image,
                placement.dst.x,
                placement.dst.y,
                placement.dst.w,
                placement.dst.h,
            )?;
            let opts = ResizeOptions::new()
                .crop(
                    f64::from(placement.src.x),
                    f64::from(placement.src.y),
                    f64::from(placement.src.w),
                    f64::from(placement.src.h),
                )
                .use_alpha(false);
            resizer.resize_typed::<U8x4>(&src_view, &mut roi, &opts)?;
        }
        RenderBackend::Scalar => {
            scale_nearest(packed, src, placement, surface, dst);
        }
    }
    Ok(())
}

/// Nearest-neighbor fallback, same crop and centering semantics as the
/// SIMD path.
fn scale_nearest(packed: &[u8], src: Size, placement: Placement, surface: Size, dst: &mut [u8]) {
    let sw = placement.src.w as f64;
    let sh = placement.src.h as f64;
    let dw = placement.dst.w as f64;
    let dh = placement.dst.h as f64;
    for dy in 0..placement.dst.h as usize {
        let sy = (((dy as f64 + 0.5) * sh / dh) as u32 + placement.src.y).min(src.h - 1) as usize;
        let drow = (placement.dst.y as usize + dy) * surface.w as usize;
        for dx in 0..placement.dst.w as usize {
            let sx = (((dx as f64 + 0.5) * sw / dw) as u32 + placement.src.x).min(src.w - 1) as usize;
            let s = (sy * src.w as usize + sx) * 4;
            let d = (drow + placement.dst.x as usize + dx) * 4;
            dst[d..d + 4].copy_from_slice(&packed[s..s + 4]);
        }
    }
}

#[inline]
fn compact_rows(src: &[u8], src_pitch: usize, dst: &mut [u8], row_bytes: usize, rows: usize) {
    for r in 0..rows {
        let s = &src[r * src_pitch..r * src_pitch + row_bytes];
        let d = &mut dst[r * row_bytes..(r + 1) * row_bytes];
        d.copy_from_slice(s);
    }
}
