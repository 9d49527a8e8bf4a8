//! Live per-side preview loop.
//!
//! One tokio interval task per active side, ticking at display rate. A
//! tick reads the source dimensions (0×0 means the camera is still warming
//! up, so skip without an error), fetches the newest frame, applies the transform
//! chain (optional trim, rotation, FOV normalization, fit scaling) and
//! presents the letterboxed result. A failed tick is skipped and the loop
//! keeps going; the preview must survive a flaky camera indefinitely.
//!
//! Config changes arrive on a `watch` channel and take effect on the next
//! tick. The scaling backend degrades from SIMD to scalar once, at the
//! first raster failure, and stays there for the life of the task.

use std::time::Duration;

use fast_image_resize::Resizer;
use spread_geom::fit::{DEFAULT_FOV_RATIO, fov_crop, plan_blit};
use spread_geom::raster::{RenderBackend, Staging, crop_bgra, rotate_arbitrary_bgra, rotate_quarter_bgra, scale_blit};
use spread_geom::rotate::quarter_turns;
use spread_geom::trim::pixel_trim;
use spread_geom::{PixelRect, Size};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{CameraSide, ConfigPatch, FOV_BASE, FrameTransformConfig};
use crate::error::{ScanError, ScanResult};
use crate::frame::{FrameSource, RenderSurface};

/// Letterbox bands are opaque black.
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

#[derive(Clone, Copy, Debug)]
pub struct PreviewOptions {
    /// Whether the configured trim is applied in the preview. Off by
    /// default: the operator aligns the page against the full sensor view
    /// and the trim only shapes the captured output.
    pub apply_trim: bool,
    /// Tick period; the default approximates a 60 Hz display.
    pub tick: Duration,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self { apply_trim: false, tick: Duration::from_millis(16) }
    }
}

struct SideHandle {
    task: JoinHandle<()>,
    config_tx: watch::Sender<FrameTransformConfig>,
}

/// Owner of the per-side preview tasks. `Idle → Running → Idle` per side;
/// starting an already-running side restarts it with the new collaborators.
#[derive(Default)]
pub struct PreviewRenderer {
    sides: [Option<SideHandle>; 2],
}

impl PreviewRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<S, R>(&mut self, side: CameraSide, source: S, surface: R, config: FrameTransformConfig)
    where
        S: FrameSource + 'static,
        R: RenderSurface + 'static,
    {
        self.start_with_options(side, source, surface, config, PreviewOptions::default());
    }

    pub fn start_with_options<S, R>(
        &mut self,
        side: CameraSide,
        source: S,
        surface: R,
        config: FrameTransformConfig,
        options: PreviewOptions,
    ) where
        S: FrameSource + 'static,
        R: RenderSurface + 'static,
    {
        self.stop(side);
        let (config_tx, config_rx) = watch::channel(config);
        let task = tokio::spawn(run_side(side, source, surface, config_rx, options));
        info!(%side, "preview started");
        self.sides[side.index()] = Some(SideHandle { task, config_tx });
    }

    /// Abort the side's tick task and release its render resources. A
    /// no-op when the side is idle.
    pub fn stop(&mut self, side: CameraSide) {
        if let Some(handle) = self.sides[side.index()].take() {
            handle.task.abort();
            info!(%side, "preview stopped");
        }
    }

    /// Merge a partial config change; it is picked up on the next tick.
    /// Returns `false` when the side has no running preview.
    pub fn update_config(&self, side: CameraSide, patch: &ConfigPatch) -> bool {
        match &self.sides[side.index()] {
            Some(handle) => {
                handle.config_tx.send_modify(|cfg| cfg.apply(patch));
                debug!(%side, "preview config updated");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, side: CameraSide) -> bool {
        self.sides[side.index()].is_some()
    }
}

impl Drop for PreviewRenderer {
    fn drop(&mut self) {
        for side in CameraSide::BOTH {
            self.stop(side);
        }
    }
}

/// Reused per-task pixel buffers. One set per side task; never shared.
#[derive(Default)]
struct Scratch {
    crop: Staging,
    rotated: Vec<u8>,
    out: Vec<u8>,
}

async fn run_side<S, R>(
    side: CameraSide,
    mut source: S,
    mut surface: R,
    mut config_rx: watch::Receiver<FrameTransformConfig>,
    options: PreviewOptions,
) where
    S: FrameSource,
    R: RenderSurface,
{
    let mut interval = tokio::time::interval(options.tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut backend = RenderBackend::default();
    let mut resizer = Resizer::new();
    let mut scratch = Scratch::default();

    loop {
        interval.tick().await;
        let config = *config_rx.borrow_and_update();
        match tick(&mut source, &mut surface, config, options, backend, &mut resizer, &mut scratch).await {
            Ok(()) => {}
            Err(ScanError::Raster(err)) if backend == RenderBackend::Simd => {
                // Chosen once: from here on this side renders scalar.
                warn!(%side, error = %err, "vision-library scaling unavailable, switching to scalar rendering");
                backend = RenderBackend::Scalar;
            }
            Err(err) => {
                debug!(%side, error = %err, "preview tick skipped");
            }
        }
    }
}

async fn tick<S, R>(
    source: &mut S,
    surface: &mut R,
    config: FrameTransformConfig,
    options: PreviewOptions,
    backend: RenderBackend,
    resizer: &mut Resizer,
    scratch: &mut Scratch,
) -> ScanResult<()>
where
    S: FrameSource,
    R: RenderSurface,
{
    let dims = source.dimensions();
    let surf = surface.size();
    if dims.is_empty() || surf.is_empty() {
        return Ok(());
    }

    let frame = source.latest_frame().await?;
    if frame.size().is_empty() {
        return Ok(());
    }

    let crop = if options.apply_trim {
        pixel_trim(config.trim(), frame.size())?
    } else {
        PixelRect::full(frame.size())
    };
    crop_bgra(&frame.data, frame.stride, crop, &mut scratch.crop);

    let rotated_size = match quarter_turns(config.rotation_degrees) {
        Some(turns) => rotate_quarter_bgra(scratch.crop.as_slice(), crop.size(), turns, &mut scratch.rotated),
        None => rotate_arbitrary_bgra(
            scratch.crop.as_slice(),
            crop.size(),
            config.rotation_degrees,
            BACKGROUND,
            &mut scratch.rotated,
        ),
    };

    // FOV normalization, then placement of the visible window.
    let fov = fov_crop(rotated_size, FOV_BASE, DEFAULT_FOV_RATIO);
    let mut placement = plan_blit(fov.size(), surf, config.fill_mode);
    placement.src.x += fov.x;
    placement.src.y += fov.y;

    scratch.out.resize(surf.bgra_len(), 0);
    scale_blit(
        backend,
        resizer,
        &scratch.rotated,
        rotated_size,
        None,
        placement,
        surf,
        &mut scratch.out,
        BACKGROUND,
        None,
    )?;

    surface.present(&scratch.out, surf);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanResult;
    use crate::frame::RawFrame;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    struct TestSource {
        size: Arc<(AtomicU32, AtomicU32)>,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSource for TestSource {
        fn dimensions(&self) -> Size {
            Size::new(self.size.0.load(Ordering::SeqCst), self.size.1.load(Ordering::SeqCst))
        }

        async fn latest_frame(&mut self) -> ScanResult<RawFrame> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let dims = self.dimensions();
            Ok(RawFrame::packed(dims.w, dims.h, vec![50u8; dims.bgra_len()]))
        }
    }

    struct TestSurface {
        presents: Arc<AtomicUsize>,
    }

    impl RenderSurface for TestSurface {
        fn size(&self) -> Size {
            Size::new(64, 64)
        }

        fn present(&mut self, pixels: &[u8], size: Size) {
            assert_eq!(pixels.len(), size.bgra_len());
            self.presents.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn harness(w: u32, h: u32) -> (TestSource, TestSurface, Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<(AtomicU32, AtomicU32)>) {
        let size = Arc::new((AtomicU32::new(w), AtomicU32::new(h)));
        let fetches = Arc::new(AtomicUsize::new(0));
        let presents = Arc::new(AtomicUsize::new(0));
        let source = TestSource { size: size.clone(), fetches: fetches.clone() };
        let surface = TestSurface { presents: presents.clone() };
        (source, surface, fetches, presents, size)
    }

    #[tokio::test(start_paused = true)]
    async fn running_preview_presents_every_tick() {
        let (source, surface, _fetches, presents, _size) = harness(120, 90);
        let mut renderer = PreviewRenderer::new();
        renderer.start(CameraSide::Left, source, surface, FrameTransformConfig::default());
        assert!(renderer.is_running(CameraSide::Left));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(presents.load(Ordering::SeqCst) >= 3, "expected several presented ticks");

        renderer.stop(CameraSide::Left);
        assert!(!renderer.is_running(CameraSide::Left));
        let after_stop = presents.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(presents.load(Ordering::SeqCst), after_stop, "stopped side must not render");
    }

    #[tokio::test(start_paused = true)]
    async fn warming_up_camera_is_skipped_without_frame_reads() {
        let (source, surface, fetches, presents, size) = harness(0, 0);
        let mut renderer = PreviewRenderer::new();
        renderer.start(CameraSide::Right, source, surface, FrameTransformConfig::default());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 0, "0×0 dims must not be fetched");
        assert_eq!(presents.load(Ordering::SeqCst), 0);

        // Camera comes up; the loop recovers on its own.
        size.0.store(120, Ordering::SeqCst);
        size.1.store(90, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(presents.load(Ordering::SeqCst) > 0);
        renderer.stop(CameraSide::Right);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_source_never_kills_the_loop() {
        struct FlakySource {
            calls: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl FrameSource for FlakySource {
            fn dimensions(&self) -> Size {
                Size::new(32, 32)
            }

            async fn latest_frame(&mut self) -> ScanResult<RawFrame> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 0 {
                    Err(crate::error::ScanError::device(
                        crate::error::DeviceErrorKind::Busy,
                        "intermittent",
                    ))
                } else {
                    Ok(RawFrame::packed(32, 32, vec![10u8; 32 * 32 * 4]))
                }
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let presents = Arc::new(AtomicUsize::new(0));
        let mut renderer = PreviewRenderer::new();
        renderer.start(
            CameraSide::Left,
            FlakySource { calls: calls.clone() },
            TestSurface { presents: presents.clone() },
            FrameTransformConfig::default(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        let calls_n = calls.load(Ordering::SeqCst);
        let presents_n = presents.load(Ordering::SeqCst);
        assert!(calls_n >= 4, "loop must keep polling through failures, got {calls_n}");
        assert!(presents_n >= 1 && presents_n < calls_n);
        renderer.stop(CameraSide::Left);
    }

    #[tokio::test(start_paused = true)]
    async fn config_updates_reach_a_running_side_only() {
        let (source, surface, _f, _p, _s) = harness(64, 64);
        let mut renderer = PreviewRenderer::new();
        renderer.start(CameraSide::Left, source, surface, FrameTransformConfig::default());

        let patch = ConfigPatch { rotation_degrees: Some(90.0), ..Default::default() };
        assert!(renderer.update_config(CameraSide::Left, &patch));
        assert!(!renderer.update_config(CameraSide::Right, &patch));
        renderer.stop(CameraSide::Left);
    }
}
