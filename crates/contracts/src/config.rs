//! Operator configuration contracts shared across crates.
//!
//! Everything here is supplied once at operator construction and treated as
//! immutable for the operator's lifetime.

use serde::{Deserialize, Serialize};

use crate::Transform;

/// Correlation engine limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum buffered payloads per channel; pushes beyond it are rejected
    #[serde(default = "default_max_buffer_depth")]
    pub max_buffer_depth: usize,

    /// Maximum timestamps awaiting certification; the oldest is superseded beyond it
    #[serde(default = "default_max_pending_timestamps")]
    pub max_pending_timestamps: usize,
}

fn default_max_buffer_depth() -> usize {
    1024
}

fn default_max_pending_timestamps() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_buffer_depth: default_max_buffer_depth(),
            max_pending_timestamps: default_max_pending_timestamps(),
        }
    }
}

/// Camera intrinsics and mounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSetup {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Horizontal field of view in degrees
    pub fov_deg: f64,
    /// Sensor-to-vehicle mounting transform
    pub transform: Transform,
}

impl Default for CameraSetup {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fov_deg: 90.0,
            transform: Transform::default(),
        }
    }
}

/// Depth payload the synthetic producer puts on the depth channel.
/// The obstacle location operator accepts either kind regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthSourceKind {
    /// Dense depth frames from a depth camera co-located with the RGB camera
    #[default]
    DepthFrame,
    /// Point clouds in the camera sensor frame
    PointCloud,
}

/// Geolocation resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeolocationConfig {
    /// Payload generated for the depth channel
    #[serde(default)]
    pub depth_source: DepthSourceKind,

    /// Search radius around the detection centroid, in pixels
    #[serde(default = "default_validity_radius_px")]
    pub validity_radius_px: f64,
}

fn default_validity_radius_px() -> f64 {
    3.0
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            depth_source: DepthSourceKind::default(),
            validity_radius_px: default_validity_radius_px(),
        }
    }
}

/// Constants of the affine deadline model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineConfig {
    /// Deadline at the reference speed (ms)
    #[serde(default = "default_baseline_ms")]
    pub baseline_ms: f64,

    /// Speed at which the baseline applies (m/s)
    #[serde(default = "default_reference_speed_mps")]
    pub reference_speed_mps: f64,

    /// Deadline reduction per m/s above the reference (ms)
    #[serde(default = "default_sensitivity_ms_per_mps")]
    pub sensitivity_ms_per_mps: f64,

    /// Results above this are flagged for calibration review (ms)
    #[serde(default = "default_max_plausible_ms")]
    pub max_plausible_ms: f64,
}

fn default_baseline_ms() -> f64 {
    400.0
}

fn default_reference_speed_mps() -> f64 {
    10.0
}

fn default_sensitivity_ms_per_mps() -> f64 {
    10.0
}

fn default_max_plausible_ms() -> f64 {
    1000.0
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            baseline_ms: default_baseline_ms(),
            reference_speed_mps: default_reference_speed_mps(),
            sensitivity_ms_per_mps: default_sensitivity_ms_per_mps(),
            max_plausible_ms: default_max_plausible_ms(),
        }
    }
}
