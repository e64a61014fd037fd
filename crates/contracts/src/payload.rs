//! Payload - 通道数据载荷
//!
//! Everything a producer can put on an input channel, and everything an
//! operator emits on its output channel.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Location, Transform, Vector3};

/// 数据载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// 相机图像
    Camera(CameraFrame),

    /// 稠密深度图
    Depth(DepthFrame),

    /// 点云 (传感器坐标系)
    PointCloud(PointCloud),

    /// 车辆位姿与运动学
    Pose(VehiclePose),

    /// 障碍物 / 检测结果列表
    Obstacles(Vec<Obstacle>),

    /// 决策时限估计
    TimeToDecision(TimeToDecision),
}

impl Payload {
    /// Short variant name used in logs, errors and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Camera(_) => "camera",
            Self::Depth(_) => "depth",
            Self::PointCloud(_) => "point_cloud",
            Self::Pose(_) => "pose",
            Self::Obstacles(_) => "obstacles",
            Self::TimeToDecision(_) => "time_to_decision",
        }
    }
}

/// 相机图像
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// BGRA8 像素数据
    pub data: Bytes,
}

/// 稠密深度图，按行存储，单位：米
///
/// Non-finite or non-positive entries mean "no depth at this pixel".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub depths: Vec<f32>,
}

impl DepthFrame {
    /// Frame filled with one depth value.
    pub fn uniform(width: u32, height: u32, depth: f32) -> Self {
        Self {
            width,
            height,
            depths: vec![depth; width as usize * height as usize],
        }
    }

    /// Valid depth at pixel `(x, y)`, `None` when out of bounds or invalid.
    pub fn depth_at(&self, x: i64, y: i64) -> Option<f32> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.depths
            .get(idx)
            .copied()
            .filter(|d| d.is_finite() && *d > 0.0)
    }

    pub fn set_depth(&mut self, x: u32, y: u32, depth: f32) {
        let idx = y as usize * self.width as usize + x as usize;
        if let Some(slot) = self.depths.get_mut(idx) {
            *slot = depth;
        }
    }
}

/// 点云，点坐标位于深度传感器坐标系 (x 前, y 右, z 上)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Location>,
}

/// 车辆位姿
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehiclePose {
    /// 世界坐标系位姿
    pub transform: Transform,
    /// 前向速度 (m/s)
    pub forward_speed: f64,
    /// 速度向量 (m/s)
    pub velocity: Vector3,
}

/// 二维检测框 (像素)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoundingBox2D {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }
}

/// Detection geometry as produced by the detector/tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundingShape {
    /// Image-plane box in pixels
    Box2D(BoundingBox2D),
    /// Point estimate in the camera sensor frame (x forward, y right, z up)
    Point3D(Location),
}

/// 障碍物
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u64,

    /// 类别 (e.g., "vehicle", "person")
    pub label: String,

    /// 置信度 [0, 1]
    pub confidence: f64,

    #[serde(default)]
    pub bounding_shape: Option<BoundingShape>,

    /// 世界坐标系位姿，仅由定位算子填写
    #[serde(default)]
    pub transform: Option<Transform>,
}

impl Obstacle {
    pub fn new(id: u64, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            id,
            label: label.into(),
            confidence,
            bounding_shape: None,
            transform: None,
        }
    }

    pub fn with_shape(mut self, shape: BoundingShape) -> Self {
        self.bounding_shape = Some(shape);
        self
    }
}

/// Decision-latency budget for one pose sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeToDecision {
    /// Budget in milliseconds, unclamped
    pub deadline_ms: f64,

    /// Set when the value falls outside the plausible calibration range
    #[serde(default)]
    pub flagged: bool,
}
