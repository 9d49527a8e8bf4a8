//! Shared fixtures for the spreadcap integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use spreadcap::spread_geom::Size;
use spreadcap::{DeviceErrorKind, FrameSource, PatternDecoder, RawFrame, RenderSurface, ScanError, ScanResult};

/// Route crate logs to the test harness; `RUST_LOG` filters apply.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A BGRA frame with a per-pixel gradient, so transforms move real data.
pub fn gradient_frame(w: u32, h: u32) -> RawFrame {
    let mut data = vec![0u8; (w * h * 4) as usize];
    for (i, px) in data.chunks_exact_mut(4).enumerate() {
        px[0] = (i % 256) as u8;
        px[1] = ((i / 7) % 256) as u8;
        px[2] = ((i / 13) % 256) as u8;
        px[3] = 255;
    }
    RawFrame::packed(w, h, data)
}

/// A frame whose rows carry trailing padding, as camera drivers often
/// deliver them.
pub fn strided_frame(w: u32, h: u32, pad_bytes: usize) -> RawFrame {
    let stride = w as usize * 4 + pad_bytes;
    let mut data = vec![0u8; stride * h as usize];
    for y in 0..h as usize {
        for x in 0..w as usize {
            let i = y * stride + x * 4;
            data[i] = (x % 256) as u8;
            data[i + 2] = (y % 256) as u8;
            data[i + 3] = 255;
        }
    }
    RawFrame { width: w, height: h, stride, data: Arc::new(data) }
}

/// Frame source that replays a fixed script of results, then repeats the
/// last one.
pub struct ScriptedSource {
    script: VecDeque<ScanResult<RawFrame>>,
    last: Option<RawFrame>,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = ScanResult<RawFrame>>) -> Self {
        Self { script: frames.into_iter().collect(), last: None }
    }

    pub fn single(frame: RawFrame) -> Self {
        Self::new([Ok(frame)])
    }

    pub fn unavailable(kind: DeviceErrorKind) -> Self {
        Self::new([Err(ScanError::device(kind, "scripted failure"))])
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    fn dimensions(&self) -> Size {
        match (&self.last, self.script.front()) {
            (_, Some(Ok(frame))) => frame.size(),
            (Some(frame), _) => frame.size(),
            _ => Size::new(0, 0),
        }
    }

    async fn latest_frame(&mut self) -> ScanResult<RawFrame> {
        match self.script.pop_front() {
            Some(Ok(frame)) => {
                self.last = Some(frame.clone());
                Ok(frame)
            }
            Some(Err(err)) => Err(err),
            None => match &self.last {
                Some(frame) => Ok(frame.clone()),
                None => Err(ScanError::device(DeviceErrorKind::NotFound, "script exhausted")),
            },
        }
    }
}

/// Render surface that counts presents and keeps the last raster.
pub struct RecordingSurface {
    size: Size,
    pub presents: Arc<AtomicUsize>,
    pub last: Arc<Mutex<Vec<u8>>>,
}

impl RecordingSurface {
    pub fn new(size: Size) -> Self {
        Self { size, presents: Arc::new(AtomicUsize::new(0)), last: Arc::new(Mutex::new(Vec::new())) }
    }
}

impl RenderSurface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn present(&mut self, pixels: &[u8], size: Size) {
        assert_eq!(pixels.len(), size.bgra_len());
        self.presents.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = pixels.to_vec();
    }
}

/// Decoder that records the raster dimensions it was handed and answers
/// from a fixed script.
pub struct RecordingDecoder {
    pub seen: Arc<Mutex<Vec<(u32, u32)>>>,
    pub answers: Mutex<VecDeque<Option<String>>>,
}

impl RecordingDecoder {
    pub fn new(answers: impl IntoIterator<Item = Option<String>>) -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            answers: Mutex::new(answers.into_iter().collect()),
        }
    }
}

impl PatternDecoder for RecordingDecoder {
    fn decode(&self, _gray: &[u8], width: u32, height: u32) -> Option<String> {
        self.seen.lock().unwrap().push((width, height));
        self.answers.lock().unwrap().pop_front().flatten()
    }
}
