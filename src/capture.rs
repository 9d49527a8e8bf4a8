//! Full-resolution capture pipeline.
//!
//! A capture snapshots one raw frame, validates the trim geometry before
//! any pixel work, then crops, rotates and encodes, preferably inside a
//! parallel execution context so the caller's thread stays free, with a
//! transparent synchronous fallback when the context fails. Every request
//! carries a unique correlation id; responses are matched by id, never by
//! side, because two captures for one side can exist briefly around the
//! slot hand-over.
//!
//! Each transform call builds its own scratch buffers. The two sides share
//! the pipeline object but no mutable pixel state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use fast_image_resize::Resizer;
use spread_geom::fit::{FillMode, plan_blit, shrink_to_edge};
use spread_geom::raster::{RenderBackend, Staging, crop_bgra, rotate_arbitrary_bgra, rotate_quarter_bgra, scale_blit};
use spread_geom::rotate::{quarter_turns, rotated_size};
use spread_geom::trim::pixel_trim;
use spread_geom::Size;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{CameraSide, FrameTransformConfig};
use crate::enhance::Enhancer;
use crate::error::{ScanError, ScanResult};
use crate::frame::{CaptureResult, FrameSource, PixelImage, RawFrame, TransformResult};

/// Longest edge of the LD thumbnail.
pub const LD_MAX_EDGE: u32 = 320;

const HD_JPEG_QUALITY: u8 = 92;
const LD_JPEG_QUALITY: u8 = 75;

/// One unit of offloaded work: a frame plus the transform to apply.
pub struct TransformRequest {
    pub correlation_id: u64,
    pub frame: RawFrame,
    pub config: FrameTransformConfig,
}

/// The encoded outputs, addressed by the id of the request that produced
/// them.
pub struct TransformResponse {
    pub correlation_id: u64,
    pub hd: PixelImage,
    pub ld: PixelImage,
}

/// Isolated execution context for the crop+rotate+encode work. Failures
/// here are recoverable: the pipeline logs them and re-runs the same
/// request synchronously with an identical output contract.
#[async_trait]
pub trait ParallelContext: Send + Sync {
    async fn execute(&self, request: TransformRequest) -> ScanResult<TransformResponse>;
}

/// Default context: the runtime's blocking thread pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockingPoolContext;

#[async_trait]
impl ParallelContext for BlockingPoolContext {
    async fn execute(&self, request: TransformRequest) -> ScanResult<TransformResponse> {
        tokio::task::spawn_blocking(move || transform_and_encode(request))
            .await
            .map_err(|join_err| ScanError::ParallelContext(join_err.to_string()))?
    }
}

/// Replacement HD image produced by the post-handoff enhancement pass.
pub struct EnhancedCapture {
    pub side: CameraSide,
    pub correlation_id: u64,
    pub hd: PixelImage,
}

/// Per-side capture front end. Cheap to share behind an `Arc`.
pub struct CapturePipeline<C = BlockingPoolContext> {
    context: C,
    next_id: AtomicU64,
    in_flight: [AtomicBool; 2],
    enhancer: Option<Arc<dyn Enhancer>>,
    enhanced_tx: Option<mpsc::Sender<EnhancedCapture>>,
}

impl Default for CapturePipeline<BlockingPoolContext> {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePipeline<BlockingPoolContext> {
    pub fn new() -> Self {
        Self::with_context(BlockingPoolContext)
    }
}

impl<C: ParallelContext> CapturePipeline<C> {
    pub fn with_context(context: C) -> Self {
        Self {
            context,
            next_id: AtomicU64::new(0),
            in_flight: [AtomicBool::new(false), AtomicBool::new(false)],
            enhancer: None,
            enhanced_tx: None,
        }
    }

    /// Enable the post-handoff enhancement pass. Replacement images arrive
    /// on the returned channel, matched to their capture by correlation
    /// id; the original result has always been handed back first.
    pub fn with_enhancer(mut self, enhancer: Arc<dyn Enhancer>) -> (Self, mpsc::Receiver<EnhancedCapture>) {
        let (tx, rx) = mpsc::channel(8);
        self.enhancer = Some(enhancer);
        self.enhanced_tx = Some(tx);
        (self, rx)
    }

    /// Capture one spread side. At most one capture per side may be
    /// outstanding; a second request while one is in flight is rejected
    /// rather than silently overlapped.
    pub async fn capture<S: FrameSource>(
        &self,
        side: CameraSide,
        source: &mut S,
        config: FrameTransformConfig,
    ) -> ScanResult<CaptureResult> {
        let _slot = SlotGuard::acquire(&self.in_flight[side.index()], side)?;

        let frame = source.latest_frame().await?;
        // Geometry is validated before any buffer is touched; an overfull
        // trim never reaches the worker.
        plan_transform(&config, frame.size())?;

        let correlation_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(%side, correlation_id, w = frame.width, h = frame.height, "capture started");

        let request = TransformRequest { correlation_id, frame: frame.clone(), config };
        let response = match self.context.execute(request).await {
            Ok(response) if response.correlation_id == correlation_id => response,
            Ok(response) => {
                warn!(
                    %side,
                    expected = correlation_id,
                    got = response.correlation_id,
                    "context answered with a foreign correlation id, re-running synchronously"
                );
                transform_and_encode(TransformRequest { correlation_id, frame: frame.clone(), config })?
            }
            Err(err) => {
                warn!(%side, correlation_id, error = %err, "parallel context failed, re-running synchronously");
                transform_and_encode(TransformRequest { correlation_id, frame: frame.clone(), config })?
            }
        };

        if let (Some(enhancer), Some(tx)) = (&self.enhancer, &self.enhanced_tx) {
            spawn_enhancement(side, correlation_id, response.hd.clone(), enhancer.clone(), tx.clone());
        }

        info!(%side, correlation_id, hd_w = response.hd.width, hd_h = response.hd.height, "capture complete");
        Ok(CaptureResult { correlation_id, hd: response.hd, ld: response.ld })
    }
}

/// Releases the side's capture slot on every exit path.
struct SlotGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SlotGuard<'a> {
    fn acquire(flag: &'a AtomicBool, side: CameraSide) -> ScanResult<Self> {
        if flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(ScanError::CaptureBusy { side });
        }
        Ok(Self { flag })
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Resolve the capture geometry for one frame: the trim window and the
/// rotated output size. Evaluated fresh per request against the frame it
/// applies to, never cached.
pub fn plan_transform(config: &FrameTransformConfig, frame: Size) -> ScanResult<TransformResult> {
    let crop = pixel_trim(config.trim(), frame)?;
    let out = rotated_size(crop.size(), config.rotation_degrees);
    Ok(TransformResult { crop, out })
}

/// The synchronous core: crop, rotate, encode HD, derive LD. Used both by
/// the default context (on a blocking thread) and by the fallback path
/// (in-process).
pub fn transform_and_encode(request: TransformRequest) -> ScanResult<TransformResponse> {
    let TransformRequest { correlation_id, frame, config } = request;

    let plan = plan_transform(&config, frame.size())?;
    let crop = plan.crop;
    let mut staging = Staging::with_capacity(crop.size().bgra_len());
    crop_bgra(&frame.data, frame.stride, crop, &mut staging);

    let mut rotated = Vec::new();
    let out_size = match quarter_turns(config.rotation_degrees) {
        Some(turns) => rotate_quarter_bgra(staging.as_slice(), crop.size(), turns, &mut rotated),
        None => rotate_arbitrary_bgra(
            staging.as_slice(),
            crop.size(),
            config.rotation_degrees,
            [0, 0, 0, 255],
            &mut rotated,
        ),
    };

    let hd = encode_jpeg(&rotated, out_size, HD_JPEG_QUALITY)?;
    let ld = make_thumbnail(&rotated, out_size)?;
    Ok(TransformResponse { correlation_id, hd, ld })
}

/// Proportional downscale to [`LD_MAX_EDGE`], then a lighter encode.
fn make_thumbnail(bgra: &[u8], size: Size) -> ScanResult<PixelImage> {
    let ld_size = shrink_to_edge(size, LD_MAX_EDGE);
    if ld_size == size {
        return encode_jpeg(bgra, size, LD_JPEG_QUALITY);
    }
    let placement = plan_blit(size, ld_size, FillMode::Contain);
    let mut resizer = Resizer::new();
    let mut small = vec![0u8; ld_size.bgra_len()];
    let blit = scale_blit(
        RenderBackend::Simd,
        &mut resizer,
        bgra,
        size,
        None,
        placement,
        ld_size,
        &mut small,
        [0, 0, 0, 255],
        None,
    );
    if let Err(err) = blit {
        warn!(error = %err, "thumbnail scaling fell back to the scalar path");
        scale_blit(
            RenderBackend::Scalar,
            &mut resizer,
            bgra,
            size,
            None,
            placement,
            ld_size,
            &mut small,
            [0, 0, 0, 255],
            None,
        )?;
    }
    encode_jpeg(&small, ld_size, LD_JPEG_QUALITY)
}

fn encode_jpeg(bgra: &[u8], size: Size, quality: u8) -> ScanResult<PixelImage> {
    let mut rgb = vec![0u8; size.w as usize * size.h as usize * 3];
    for (src, dst) in bgra.chunks_exact(4).zip(rgb.chunks_exact_mut(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
    let mut encoded = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, quality).encode(
        &rgb,
        size.w,
        size.h,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(PixelImage { width: size.w, height: size.h, encoded })
}

/// Decode, enhance and re-encode the HD image off the async threads, then
/// publish the replacement. Best-effort: an enhancement failure leaves the
/// already-delivered original standing.
fn spawn_enhancement(
    side: CameraSide,
    correlation_id: u64,
    hd: PixelImage,
    enhancer: Arc<dyn Enhancer>,
    tx: mpsc::Sender<EnhancedCapture>,
) {
    tokio::task::spawn_blocking(move || {
        let replacement = match enhance_encoded(&hd, enhancer.as_ref()) {
            Ok(img) => img,
            Err(err) => {
                warn!(%side, correlation_id, error = %err, "enhancement pass failed, original stands");
                return;
            }
        };
        if tx.blocking_send(EnhancedCapture { side, correlation_id, hd: replacement }).is_err() {
            debug!(%side, correlation_id, "enhancement receiver gone, replacement dropped");
        }
    });
}

fn enhance_encoded(hd: &PixelImage, enhancer: &dyn Enhancer) -> ScanResult<PixelImage> {
    let decoded = image::load_from_memory(&hd.encoded)?.to_rgba8();
    let (w, h) = decoded.dimensions();
    let mut bgra = decoded.into_raw();
    for px in bgra.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    enhancer.enhance_bgra(&mut bgra, w, h);
    encode_jpeg(&bgra, Size::new(w, h), HD_JPEG_QUALITY)
}
