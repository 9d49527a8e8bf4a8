// SPDX-License-Identifier: MIT
//! # spreadcap: Dual-Camera Document Spread Capture
//!
//! Core engine for a two-camera book scanner: each camera films one page
//! of an open spread, and this crate turns the raw sensor frames into
//! aligned live previews, full-resolution page captures and decoded
//! pattern codes.
//!
//! ## Architecture
//!
//! - [`preview`]: one tokio interval task per active side, ticking at
//!   display rate, transforming and letterboxing the newest frame into a
//!   caller-provided [`RenderSurface`]. Per-tick failures are skipped,
//!   never fatal.
//! - [`capture`]: asynchronous full-resolution captures (trim, rotate,
//!   HD JPEG plus a proportional LD thumbnail) executed in a parallel
//!   context with a transparent synchronous fallback. One capture per
//!   side at a time; requests and responses are matched by correlation
//!   id, never by side name.
//! - [`detect`]: ROI pattern decoding over fractional watch regions,
//!   with per-side dedup, a full-frame fallback and a filter sweep for
//!   bad lighting.
//! - [`wedge`]: the scanner-gun keystroke classifier, separating wedge
//!   scanner bursts from human typing using timing alone.
//! - [`enhance`]: optional post-handoff image enhancement that replaces
//!   the stored HD bytes without ever delaying the first result.
//!
//! The geometry itself (trims, rotation, field-of-view normalization,
//! fit scaling, the CPU raster path) lives in the [`spread_geom`] member
//! crate and is pure: no I/O, no hidden state, safe to call from both
//! sides and from worker threads concurrently.
//!
//! ## Collaborators
//!
//! Device access, UI and storage stay outside. The crate consumes a
//! [`FrameSource`] and [`RenderSurface`] per side, an optional
//! [`ParallelContext`] and a [`PatternDecoder`], and exposes plain async
//! operations plus channels for enhancement events and wedge codes.

pub mod capture;
pub mod config;
pub mod detect;
pub mod enhance;
pub mod error;
pub mod frame;
pub mod preview;
pub mod wedge;

pub use spread_geom;

pub use capture::{
    BlockingPoolContext, CapturePipeline, EnhancedCapture, LD_MAX_EDGE, ParallelContext,
    TransformRequest, TransformResponse, plan_transform,
};
pub use config::{CameraSide, ConfigPatch, FOV_BASE, FrameTransformConfig, SideSettings};
pub use detect::{DEFAULT_MONITOR_REGION, PatternDecoder, RoiDetector, RqrrDecoder};
pub use enhance::{DocumentEnhancer, Enhancer};
pub use error::{DeviceErrorKind, ScanError, ScanResult};
pub use frame::{CaptureResult, FrameSource, PixelImage, RawFrame, RenderSurface, TransformResult};
pub use preview::{PreviewOptions, PreviewRenderer};
pub use wedge::{KeyEvent, WedgeClassifier, WedgeHandle, WedgeKey, spawn_wedge};
