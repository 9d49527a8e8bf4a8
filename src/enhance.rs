//! Quality enhancement for captured pages.
//!
//! Two consumers: the capture pipeline's optional post-handoff pass
//! (brightness/contrast/white-balance normalization that *replaces* the
//! stored HD image without ever delaying the first hand-off), and the
//! pattern detector's filter sweep (a short list of contrast/brightness
//! presets tried in sequence when the plain decode fails under uneven
//! lighting).

use tracing::debug;

/// Producer of replacement HD images. Runs strictly after the original
/// capture result has been handed back; its output is a replacement, not
/// an addition.
pub trait Enhancer: Send + Sync {
    /// Enhance a packed BGRA image in place.
    fn enhance_bgra(&self, pixels: &mut [u8], width: u32, height: u32);
}

/// Default document enhancement: gray-world white balance followed by a
/// percentile contrast stretch. Deliberately conservative: page
/// legibility, not beauty.
#[derive(Clone, Copy, Debug)]
pub struct DocumentEnhancer {
    /// Fraction of pixels ignored at each histogram tail when stretching.
    pub clip_fraction: f32,
}

impl Default for DocumentEnhancer {
    fn default() -> Self {
        Self { clip_fraction: 0.01 }
    }
}

impl Enhancer for DocumentEnhancer {
    fn enhance_bgra(&self, pixels: &mut [u8], width: u32, height: u32) {
        let n = width as usize * height as usize;
        if n == 0 || pixels.len() < n * 4 {
            return;
        }
        gray_world_balance(pixels, n);
        let (lo, hi) = luma_percentiles(pixels, n, self.clip_fraction);
        if hi > lo {
            stretch_contrast(pixels, n, lo, hi);
        }
        debug!(width, height, lo, hi, "enhanced capture in place");
    }
}

/// Gray-world assumption: the average of a document spread should be
/// neutral. Scales each channel toward the overall mean.
fn gray_world_balance(pixels: &mut [u8], n: usize) {
    let mut sums = [0u64; 3];
    for px in pixels[..n * 4].chunks_exact(4) {
        sums[0] += u64::from(px[0]);
        sums[1] += u64::from(px[1]);
        sums[2] += u64::from(px[2]);
    }
    let means = sums.map(|s| s as f64 / n as f64);
    let gray = (means[0] + means[1] + means[2]) / 3.0;
    if means.iter().any(|&m| m < 1.0) {
        return; // black frame, nothing to balance
    }
    let gains = means.map(|m| (gray / m).clamp(0.5, 2.0));
    for px in pixels[..n * 4].chunks_exact_mut(4) {
        for c in 0..3 {
            px[c] = (f64::from(px[c]) * gains[c]).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Low/high luma bounds with `clip` of the mass cut from each tail.
fn luma_percentiles(pixels: &[u8], n: usize, clip: f32) -> (u8, u8) {
    let mut hist = [0u32; 256];
    for px in pixels[..n * 4].chunks_exact(4) {
        let y = (u32::from(px[2]) * 299 + u32::from(px[1]) * 587 + u32::from(px[0]) * 114) / 1000;
        hist[y as usize] += 1;
    }
    let cut = (n as f64 * f64::from(clip)) as u32;
    let mut lo = 0u8;
    let mut acc = 0u32;
    for (i, &c) in hist.iter().enumerate() {
        acc += c;
        if acc > cut {
            lo = i as u8;
            break;
        }
    }
    let mut hi = 255u8;
    acc = 0;
    for (i, &c) in hist.iter().enumerate().rev() {
        acc += c;
        if acc > cut {
            hi = i as u8;
            break;
        }
    }
    (lo, hi)
}

fn stretch_contrast(pixels: &mut [u8], n: usize, lo: u8, hi: u8) {
    let span = f32::from(hi) - f32::from(lo);
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = (((i as f32 - f32::from(lo)) / span) * 255.0).clamp(0.0, 255.0) as u8;
    }
    for px in pixels[..n * 4].chunks_exact_mut(4) {
        for c in 0..3 {
            px[c] = lut[px[c] as usize];
        }
    }
}

/// One contrast/brightness preset of the detector's filter sweep.
#[derive(Clone, Copy, Debug)]
pub struct FilterPreset {
    /// Multiplier around mid-gray; 1.0 is neutral.
    pub contrast: f32,
    /// Additive offset after contrast.
    pub brightness: i16,
}

/// Sweep order tuned for page corners under desk lamps: boost contrast
/// first, then lift shadows, then crush highlights.
pub const FILTER_SWEEP: [FilterPreset; 4] = [
    FilterPreset { contrast: 1.4, brightness: 0 },
    FilterPreset { contrast: 1.8, brightness: 20 },
    FilterPreset { contrast: 1.2, brightness: 45 },
    FilterPreset { contrast: 2.2, brightness: -25 },
];

impl FilterPreset {
    /// Apply to an 8-bit grayscale buffer.
    pub fn apply_gray(&self, gray: &mut [u8]) {
        for v in gray.iter_mut() {
            let adjusted = (f32::from(*v) - 128.0) * self.contrast + 128.0 + f32::from(self.brightness);
            *v = adjusted.clamp(0.0, 255.0) as u8;
        }
    }
}
