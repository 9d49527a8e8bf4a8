//! Per-side transform configuration.
//!
//! The trim and rotation values live in an explicit value object passed
//! into every geometry call; no global mutable state is consulted inside
//! the transform code. The UI/settings collaborator owns the values and
//! pushes changes through [`ConfigPatch`]; the core only reads them.

use serde::{Deserialize, Serialize};
use spread_geom::{FillMode, Size, TrimPct};

/// One of exactly two logical camera roles. All per-side state is keyed by
/// this; the sides are symmetric and fully independent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSide {
    Left,
    Right,
}

impl CameraSide {
    pub const BOTH: [CameraSide; 2] = [CameraSide::Left, CameraSide::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Stable slot index for per-side arrays.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

impl std::fmt::Display for CameraSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transform settings for one camera side.
///
/// Trim values are percentages (0–100) of the frame they are applied to.
/// Rotation is in degrees, positive clockwise as the user sees it; the UI
/// only exercises {0, 90, 180, 270} but the geometry tolerates anything.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrameTransformConfig {
    pub trim_top_pct: f32,
    pub trim_bottom_pct: f32,
    pub trim_left_pct: f32,
    pub trim_right_pct: f32,
    pub rotation_degrees: f32,
    #[serde(skip)]
    pub fill_mode: FillMode,
}

impl Default for FrameTransformConfig {
    fn default() -> Self {
        Self {
            trim_top_pct: 0.0,
            trim_bottom_pct: 0.0,
            trim_left_pct: 0.0,
            trim_right_pct: 0.0,
            rotation_degrees: 0.0,
            fill_mode: FillMode::Contain,
        }
    }
}

impl FrameTransformConfig {
    pub fn trim(&self) -> TrimPct {
        TrimPct::new(self.trim_top_pct, self.trim_bottom_pct, self.trim_left_pct, self.trim_right_pct)
    }

    /// Reject configurations whose trims leave no pixels on some axis.
    /// Validation happens here and again inside the geometry, since a patch can
    /// arrive between validation and use.
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("trimTopPct", self.trim_top_pct),
            ("trimBottomPct", self.trim_bottom_pct),
            ("trimLeftPct", self.trim_left_pct),
            ("trimRightPct", self.trim_right_pct),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{name} must be a non-negative number, got {v}"));
            }
        }
        if self.trim_left_pct + self.trim_right_pct >= 100.0 {
            return Err("left + right trim must stay below 100%".to_string());
        }
        if self.trim_top_pct + self.trim_bottom_pct >= 100.0 {
            return Err("top + bottom trim must stay below 100%".to_string());
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(v) = patch.trim_top_pct {
            self.trim_top_pct = v;
        }
        if let Some(v) = patch.trim_bottom_pct {
            self.trim_bottom_pct = v;
        }
        if let Some(v) = patch.trim_left_pct {
            self.trim_left_pct = v;
        }
        if let Some(v) = patch.trim_right_pct {
            self.trim_right_pct = v;
        }
        if let Some(v) = patch.rotation_degrees {
            self.rotation_degrees = v;
        }
        if let Some(v) = patch.fill_mode {
            self.fill_mode = v;
        }
    }
}

/// Partial update pushed by the settings collaborator. Only the fields
/// present change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigPatch {
    pub trim_top_pct: Option<f32>,
    pub trim_bottom_pct: Option<f32>,
    pub trim_left_pct: Option<f32>,
    pub trim_right_pct: Option<f32>,
    pub rotation_degrees: Option<f32>,
    #[serde(skip)]
    pub fill_mode: Option<FillMode>,
}

/// Flat two-side settings document, matching the layout the external
/// settings store persists (one record holding both sides).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SideSettings {
    pub left_trim_top: f32,
    pub left_trim_bottom: f32,
    pub left_trim_left: f32,
    pub left_trim_right: f32,
    pub left_camera_rotate: f32,
    pub right_trim_top: f32,
    pub right_trim_bottom: f32,
    pub right_trim_left: f32,
    pub right_trim_right: f32,
    pub right_camera_rotate: f32,
}

impl SideSettings {
    pub fn config_for(&self, side: CameraSide) -> FrameTransformConfig {
        let (top, bottom, left, right, rot) = match side {
            CameraSide::Left => (
                self.left_trim_top,
                self.left_trim_bottom,
                self.left_trim_left,
                self.left_trim_right,
                self.left_camera_rotate,
            ),
            CameraSide::Right => (
                self.right_trim_top,
                self.right_trim_bottom,
                self.right_trim_left,
                self.right_trim_right,
                self.right_camera_rotate,
            ),
        };
        FrameTransformConfig {
            trim_top_pct: top,
            trim_bottom_pct: bottom,
            trim_left_pct: left,
            trim_right_pct: right,
            rotation_degrees: rot,
            fill_mode: FillMode::Contain,
        }
    }
}

/// Baseline field of view: the lowest sensor mode the scanner supports.
/// Frames from sensors more than [`spread_geom::fit::DEFAULT_FOV_RATIO`]
/// times larger are center-cropped so subjects keep a consistent apparent
/// size.
pub const FOV_BASE: Size = Size::new(1280, 720);
