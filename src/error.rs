//! Error taxonomy for the capture core.
//!
//! Four classes of failure, handled very differently:
//!
//! - geometry problems are caught before any buffer allocation and come
//!   back as [`ScanError::InvalidGeometry`], never a panic;
//! - device problems carry a [`DeviceErrorKind`] so the caller can render
//!   a precise message (permission vs. missing vs. busy);
//! - parallel-context problems are recoverable by design: the pipeline
//!   logs them and falls back to the synchronous path, so they only
//!   surface when the fallback itself fails;
//! - a pattern that simply is not there is **not** an error: decode misses
//!   are `Option::None` throughout.
//!
//! Nothing in this crate terminates the process. The preview renderer
//! survives per-tick failures indefinitely and the capture pipeline always
//! resolves its future.

use crate::config::CameraSide;

/// Why a raw frame could not be obtained. Each variant maps to a distinct
/// user-facing message in the UI collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// The operator declined (or revoked) camera access.
    PermissionDenied,
    /// The configured device is not attached.
    NotFound,
    /// Another process holds the device open.
    Busy,
    /// The device exists but cannot satisfy the requested constraints.
    Unsupported,
}

impl std::fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "device not found",
            Self::Busy => "device in use",
            Self::Unsupported => "constraints not satisfiable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Trim/rotation produced an empty or invalid crop.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(#[from] spread_geom::GeomError),

    /// No raw frame obtainable from the frame source.
    #[error("camera unavailable ({kind}): {detail}")]
    DeviceUnavailable { kind: DeviceErrorKind, detail: String },

    /// Offload setup or execution failed *and* the synchronous fallback
    /// failed too. Context failures alone are logged and recovered.
    #[error("parallel context failure: {0}")]
    ParallelContext(String),

    /// A capture for this side is already outstanding. Stricter than the
    /// original workflow, which allowed unguarded overlap per side.
    #[error("capture already in flight for {side} side")]
    CaptureBusy { side: CameraSide },

    /// Raster transform failed on both backends.
    #[error("raster transform failed: {0}")]
    Raster(#[from] spread_geom::raster::RasterError),

    /// Image encoding failed.
    #[error("encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl ScanError {
    pub fn device(kind: DeviceErrorKind, detail: impl Into<String>) -> Self {
        Self::DeviceUnavailable { kind, detail: detail.into() }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
