//! 坐标变换与相机模型
//!
//! Frames:
//! - world / vehicle / sensor: x forward, y right, z up (metres, left-handed)
//! - camera view: x right, y down, z forward (pixel projection happens here)
//!
//! Rotations follow the simulator convention: pitch about y, yaw about z,
//! roll about x, in degrees.

use contracts::{CameraSetup, Location, Rotation, Transform};
use nalgebra::{Matrix3, Vector3};

/// Rigid transform as a rotation matrix plus translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Build from a simulator transform (location + pitch/yaw/roll)
    pub fn from_transform(transform: &Transform) -> Self {
        let Rotation { pitch, yaw, roll } = transform.rotation;
        let (sp, cp) = pitch.to_radians().sin_cos();
        let (sy, cy) = yaw.to_radians().sin_cos();
        let (sr, cr) = roll.to_radians().sin_cos();

        #[rustfmt::skip]
        let rotation = Matrix3::new(
            cp * cy, cy * sp * sr - sy * cr, -cy * sp * cr - sy * sr,
            sy * cp, sy * sp * sr + cy * cr, -sy * sp * cr + cy * sr,
            sp,      -cp * sr,               cp * cr,
        );
        let Location { x, y, z } = transform.location;

        Self {
            rotation,
            translation: Vector3::new(x, y, z),
        }
    }

    /// `self ∘ other`: apply `other` first, then `self`
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn inverse(&self) -> RigidTransform {
        let rotation = self.rotation.transpose();
        RigidTransform {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    pub fn transform_point(&self, point: &Location) -> Location {
        let p = self.rotation * Vector3::new(point.x, point.y, point.z) + self.translation;
        Location::new(p.x, p.y, p.z)
    }
}

/// Pinhole intrinsics derived from image size and horizontal field of view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(width: u32, height: u32, fov_deg: f64) -> Self {
        let focal = width as f64 / (2.0 * (fov_deg.to_radians() / 2.0).tan());
        Self {
            width,
            height,
            focal,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        }
    }

    pub fn from_setup(setup: &CameraSetup) -> Self {
        Self::new(setup.width, setup.height, setup.fov_deg)
    }

    /// 内参矩阵 K
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal, 0.0, self.cx, //
            0.0, self.focal, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Pixel of a sensor-frame point, `None` when it is not in front of the camera
    pub fn project(&self, point: &Location) -> Option<(f64, f64)> {
        if point.x <= 0.0 {
            return None;
        }
        let view = sensor_to_view(point);
        let pixel = self.matrix() * view;
        Some((pixel.x / pixel.z, pixel.y / pixel.z))
    }

    /// Sensor-frame point at pixel `(u, v)` whose forward distance is `depth`
    pub fn unproject(&self, u: f64, v: f64, depth: f64) -> Location {
        let view = Vector3::new(
            (u - self.cx) * depth / self.focal,
            (v - self.cy) * depth / self.focal,
            depth,
        );
        view_to_sensor(&view)
    }

    pub fn contains(&self, u: f64, v: f64) -> bool {
        u >= 0.0 && v >= 0.0 && u < self.width as f64 && v < self.height as f64
    }
}

/// camera view (x right, y down, z forward) -> sensor (x forward, y right, z up)
fn view_to_sensor(view: &Vector3<f64>) -> Location {
    Location::new(view.z, view.x, -view.y)
}

fn sensor_to_view(point: &Location) -> Vector3<f64> {
    Vector3::new(point.y, -point.z, point.x)
}
