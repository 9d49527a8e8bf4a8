//! Frame and surface abstractions at the boundary of the core.
//!
//! Frames come from an external camera-access collaborator; surfaces
//! belong to the UI. The core reads frames, writes surfaces, and never
//! holds on to either beyond one operation.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use spread_geom::{PixelRect, Size};

use crate::error::ScanResult;

/// One decoded camera frame: packed or strided BGRA, immutable. The core
/// only reads regions of it; cloning shares the pixel buffer.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row. Equals `width * 4` for tightly packed data.
    pub stride: usize,
    pub data: Arc<Vec<u8>>,
}

impl RawFrame {
    /// A tightly packed frame.
    pub fn packed(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, stride: width as usize * 4, data: Arc::new(data) }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_packed(&self) -> bool {
        self.stride == self.width as usize * 4
    }

    /// Luma (BT.601) of the pixel at `(x, y)`; used by the pattern
    /// detector's grayscale sampling.
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let i = y as usize * self.stride + x as usize * 4;
        let (b, g, r) = (self.data[i] as u32, self.data[i + 1] as u32, self.data[i + 2] as u32);
        ((r * 299 + g * 587 + b * 114) / 1000) as u8
    }
}

/// Per-side live frame source. Implemented by the camera-access
/// collaborator; the core treats it as a black box.
#[async_trait]
pub trait FrameSource: Send {
    /// Current sensor dimensions. `0×0` means the camera has not warmed
    /// up yet; the preview skips the tick and retries, never errors.
    fn dimensions(&self) -> Size;

    /// Snapshot the most recent frame at full sensor resolution.
    async fn latest_frame(&mut self) -> ScanResult<RawFrame>;
}

/// Per-side on-screen pixel buffer the preview renderer blits into every
/// display tick.
pub trait RenderSurface: Send {
    fn size(&self) -> Size;

    /// Present one packed BGRA raster of exactly `size` pixels.
    fn present(&mut self, pixels: &[u8], size: Size);
}

/// Pixel rectangle and output size produced by the transform engine for
/// one frame. Computed fresh on every invocation because the config can change
/// between frames, so nothing here is ever cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformResult {
    pub crop: PixelRect,
    pub out: Size,
}

/// One encoded output image plus the raw pixels it was encoded from.
#[derive(Clone, Debug)]
pub struct PixelImage {
    pub width: u32,
    pub height: u32,
    /// JPEG-encoded bytes, ready for storage or transfer.
    pub encoded: Vec<u8>,
}

impl PixelImage {
    /// `data:` URL form for direct handoff to a web UI.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.encoded)
        )
    }
}

/// The two outputs of one capture trigger for one side. Owned by the
/// caller once returned; the core keeps no reference after handoff.
#[derive(Clone, Debug)]
pub struct CaptureResult {
    /// Correlation id of the request that produced this result. Matches
    /// the id on any later enhancement event.
    pub correlation_id: u64,
    /// Full-resolution trimmed-and-rotated image.
    pub hd: PixelImage,
    /// Proportional thumbnail, longest edge ≤ 320 px.
    pub ld: PixelImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_reads_through_stride() {
        // 1×1 logical frame inside a padded row: white pixel.
        let mut data = vec![0u8; 16];
        data[0] = 255;
        data[1] = 255;
        data[2] = 255;
        let frame = RawFrame { width: 1, height: 1, stride: 16, data: Arc::new(data) };
        assert_eq!(frame.luma(0, 0), 255);
        assert!(!frame.is_packed());
    }

    #[test]
    fn data_url_is_prefixed_jpeg() {
        let img = PixelImage { width: 1, height: 1, encoded: vec![0xFF, 0xD8, 0xFF] };
        assert!(img.to_data_url().starts_with("data:image/jpeg;base64,"));
    }
}
