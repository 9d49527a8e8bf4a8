//! ROI pattern detection on live frames.
//!
//! Regions are fractions of the frame, so the same watch region works for
//! every sensor resolution. The decode itself sits behind
//! [`PatternDecoder`]; the default implementation is `rqrr`. A miss is
//! `None`; patterns being absent is the steady state, not a failure.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use spread_geom::fit::NormalizedRect;
use spread_geom::{PixelRect, Size};
use tracing::{debug, trace};

use crate::config::CameraSide;
use crate::enhance::FILTER_SWEEP;
use crate::error::ScanResult;
use crate::frame::RawFrame;

/// Region watched by default: the top-right quadrant, where the pattern
/// card is clipped to the right-hand page.
pub const DEFAULT_MONITOR_REGION: NormalizedRect = NormalizedRect::new(0.5, 0.0, 0.5, 0.5);

/// Minimum quiet period between two emissions of the same code on the same
/// side. Cameras see the card for many consecutive frames; without this
/// every frame would re-trigger the workflow.
pub const DEDUP_COOLDOWN: Duration = Duration::from_secs(2);

/// Black-box decoder over an 8-bit grayscale raster. Returns the decoded
/// payload, or `None` when no pattern is present.
pub trait PatternDecoder: Send + Sync {
    fn decode(&self, gray: &[u8], width: u32, height: u32) -> Option<String>;
}

/// Default decoder backed by `rqrr`. Takes the first grid that decodes;
/// multiple simultaneous patterns in one region do not occur in practice.
#[derive(Clone, Copy, Debug, Default)]
pub struct RqrrDecoder;

impl PatternDecoder for RqrrDecoder {
    fn decode(&self, gray: &[u8], width: u32, height: u32) -> Option<String> {
        let w = width as usize;
        let mut img =
            rqrr::PreparedImage::prepare_from_greyscale(w, height as usize, |x, y| gray[y * w + x]);
        for grid in img.detect_grids() {
            if let Ok((_meta, content)) = grid.decode() {
                return Some(content);
            }
        }
        None
    }
}

struct SideCache {
    last_code: String,
    seen_at: Instant,
}

/// Per-side pattern detector with dedup.
///
/// The two side caches are independent locks: the same code on opposite
/// sides emits twice, and neither side ever waits on the other.
pub struct RoiDetector<D = RqrrDecoder> {
    decoder: D,
    cooldown: Duration,
    caches: [Mutex<Option<SideCache>>; 2],
}

impl Default for RoiDetector<RqrrDecoder> {
    fn default() -> Self {
        Self::new(RqrrDecoder)
    }
}

impl<D: PatternDecoder> RoiDetector<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder, cooldown: DEDUP_COOLDOWN, caches: [Mutex::new(None), Mutex::new(None)] }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Decode within a fractional sub-region of the frame. Invalid regions
    /// are a typed error; a clean decode miss is `Ok(None)`.
    pub fn detect_in_region(
        &self,
        side: CameraSide,
        frame: &RawFrame,
        region: NormalizedRect,
    ) -> ScanResult<Option<String>> {
        let roi = region.to_pixels(frame.size())?;
        Ok(self.run(side, frame, roi, false))
    }

    /// Decode against the whole frame. Fallback for when the pattern card
    /// was not held inside the watch region.
    pub fn detect_full_frame(&self, side: CameraSide, frame: &RawFrame) -> Option<String> {
        self.run(side, frame, PixelRect::full(frame.size()), false)
    }

    /// [`Self::detect_in_region`] plus a contrast/brightness sweep when the
    /// plain decode misses. Slower; meant for explicit retries under bad
    /// lighting, not the per-frame path.
    pub fn detect_with_filter_sweep(
        &self,
        side: CameraSide,
        frame: &RawFrame,
        region: NormalizedRect,
    ) -> ScanResult<Option<String>> {
        let roi = region.to_pixels(frame.size())?;
        Ok(self.run(side, frame, roi, true))
    }

    fn run(&self, side: CameraSide, frame: &RawFrame, roi: PixelRect, sweep: bool) -> Option<String> {
        if roi.w == 0 || roi.h == 0 {
            return None;
        }
        let gray = extract_gray(frame, roi);
        let prepared = prepare(&gray, roi.size(), frame.size());
        let mut code = self.decoder.decode(prepared.as_raw(), prepared.width(), prepared.height());

        if code.is_none() && sweep {
            for preset in FILTER_SWEEP {
                let mut adjusted = gray.clone();
                preset.apply_gray(&mut adjusted);
                let prepared = prepare(&adjusted, roi.size(), frame.size());
                code = self.decoder.decode(prepared.as_raw(), prepared.width(), prepared.height());
                if code.is_some() {
                    trace!(side = %side, ?preset, "filter sweep recovered a decode");
                    break;
                }
            }
        }

        let code = code?;
        if self.should_emit(side, &code) {
            debug!(side = %side, len = code.len(), "pattern decoded");
            Some(code)
        } else {
            None
        }
    }

    /// True once per code per cooldown window. A different code always
    /// emits immediately and replaces the cached one.
    fn should_emit(&self, side: CameraSide, code: &str) -> bool {
        let mut guard = match self.caches[side.index()].lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        let emit = match guard.as_ref() {
            Some(cache) if cache.last_code == code => now.duration_since(cache.seen_at) >= self.cooldown,
            _ => true,
        };
        if emit {
            *guard = Some(SideCache { last_code: code.to_string(), seen_at: now });
        }
        emit
    }
}

/// Copy the luma of `roi` out of a (possibly strided) BGRA frame.
fn extract_gray(frame: &RawFrame, roi: PixelRect) -> Vec<u8> {
    let mut gray = Vec::with_capacity(roi.w as usize * roi.h as usize);
    for y in roi.y..roi.y + roi.h {
        for x in roi.x..roi.x + roi.w {
            gray.push(frame.luma(x, y));
        }
    }
    gray
}

/// Upscale, blur and binarize a grayscale region for decoding.
///
/// Small rasters get 2x, full video frames 3x: the pattern occupies a
/// small fraction of a video frame and the decoder needs module edges
/// several pixels wide. The light blur knocks out sensor noise before the
/// fixed-threshold binarize.
fn prepare(gray: &[u8], roi: Size, frame: Size) -> GrayImage {
    let factor = if frame.w >= 1280 { 3 } else { 2 };
    let img = GrayImage::from_raw(roi.w, roi.h, gray.to_vec())
        .unwrap_or_else(|| GrayImage::new(roi.w, roi.h));
    let upscaled = image::imageops::resize(
        &img,
        roi.w * factor,
        roi.h * factor,
        image::imageops::FilterType::Triangle,
    );
    let blurred = gaussian_blur_f32(&upscaled, 0.8);
    let mut out = blurred.into_raw();
    for px in out.iter_mut() {
        *px = if *px < 128 { 0 } else { 255 };
    }
    GrayImage::from_raw(roi.w * factor, roi.h * factor, out)
        .unwrap_or_else(|| GrayImage::new(roi.w * factor, roi.h * factor))
}
