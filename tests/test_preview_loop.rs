//! Preview renderer integration: per-side lifecycle, letterboxed output
//! and live config updates.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::RecordingSurface;
use spreadcap::spread_geom::Size;
use spreadcap::{
    CameraSide, ConfigPatch, FrameSource, FrameTransformConfig, PreviewRenderer, RawFrame,
    ScanResult,
};
use async_trait::async_trait;

/// Source that always returns the same solid-color frame.
struct SolidSource {
    size: Size,
    color: [u8; 4],
}

#[async_trait]
impl FrameSource for SolidSource {
    fn dimensions(&self) -> Size {
        self.size
    }

    async fn latest_frame(&mut self) -> ScanResult<RawFrame> {
        let mut data = vec![0u8; self.size.bgra_len()];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&self.color);
        }
        Ok(RawFrame::packed(self.size.w, self.size.h, data))
    }
}

#[tokio::test(start_paused = true)]
async fn wide_frame_is_letterboxed_into_square_surface() {
    common::init_tracing();
    let surface = RecordingSurface::new(Size::new(64, 64));
    let presents = surface.presents.clone();
    let last = surface.last.clone();

    let mut renderer = PreviewRenderer::new();
    renderer.start(
        CameraSide::Left,
        SolidSource { size: Size::new(120, 60), color: [10, 20, 30, 255] },
        surface,
        FrameTransformConfig::default(),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(presents.load(Ordering::SeqCst) > 0);

    let raster = last.lock().unwrap().clone();
    assert_eq!(raster.len(), Size::new(64, 64).bgra_len());
    // Top row is a letterbox band, the center is page content.
    assert_eq!(&raster[0..4], &[0, 0, 0, 255], "top-left must be background");
    let center = (32 * 64 + 32) * 4;
    assert_eq!(&raster[center..center + 4], &[10, 20, 30, 255], "center must be content");

    renderer.stop(CameraSide::Left);
}

#[tokio::test(start_paused = true)]
async fn sides_start_and_stop_independently() {
    let left_surface = RecordingSurface::new(Size::new(32, 32));
    let right_surface = RecordingSurface::new(Size::new(32, 32));
    let left_presents = left_surface.presents.clone();
    let right_presents = right_surface.presents.clone();

    let mut renderer = PreviewRenderer::new();
    let color = [100, 100, 100, 255];
    renderer.start(
        CameraSide::Left,
        SolidSource { size: Size::new(48, 48), color },
        left_surface,
        FrameTransformConfig::default(),
    );
    renderer.start(
        CameraSide::Right,
        SolidSource { size: Size::new(48, 48), color },
        right_surface,
        FrameTransformConfig::default(),
    );

    tokio::time::sleep(Duration::from_millis(60)).await;
    renderer.stop(CameraSide::Left);
    let left_frozen = left_presents.load(Ordering::SeqCst);
    assert!(left_frozen > 0);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(left_presents.load(Ordering::SeqCst), left_frozen);
    assert!(
        right_presents.load(Ordering::SeqCst) > left_frozen,
        "the right side keeps ticking after the left stops"
    );
    renderer.stop(CameraSide::Right);
    assert!(!renderer.is_running(CameraSide::Right));
}

#[tokio::test(start_paused = true)]
async fn rotation_update_applies_on_a_later_tick() {
    // A wide frame in a wide surface fills it edge to edge; after a 90°
    // rotation the content turns into a vertical pillarboxed column.
    let surface = RecordingSurface::new(Size::new(128, 64));
    let last = surface.last.clone();

    let mut renderer = PreviewRenderer::new();
    renderer.start(
        CameraSide::Left,
        SolidSource { size: Size::new(128, 64), color: [200, 150, 100, 255] },
        surface,
        FrameTransformConfig::default(),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    {
        let raster = last.lock().unwrap();
        assert_eq!(&raster[0..4], &[200, 150, 100, 255], "unrotated frame fills the surface");
    }

    let patch = ConfigPatch { rotation_degrees: Some(90.0), ..Default::default() };
    assert!(renderer.update_config(CameraSide::Left, &patch));
    tokio::time::sleep(Duration::from_millis(50)).await;
    {
        let raster = last.lock().unwrap();
        assert_eq!(&raster[0..4], &[0, 0, 0, 255], "rotated frame pillarboxes the left edge");
        let center = (32usize * 128 + 64) * 4;
        assert_eq!(&raster[center..center + 4], &[200, 150, 100, 255]);
    }
    renderer.stop(CameraSide::Left);
}
