//! Geolocation resolver: detections + depth + pose -> world locations
//!
//! For every detection the image-plane centroid is looked up in the depth
//! source, unprojected into the camera sensor frame and carried into the world
//! through the camera mount and the vehicle pose. Detections without a valid
//! depth sample near their centroid are omitted, never guessed.

use contracts::{
    BoundingShape, CameraSetup, DepthFrame, GeolocationConfig, Obstacle, PointCloud, Rotation,
    Transform, VehiclePose,
};
use tracing::{debug, trace};

use crate::geometry::{CameraIntrinsics, RigidTransform};

/// Depth data aligned with one set of detections
#[derive(Debug, Clone, Copy)]
pub enum DepthSource<'a> {
    /// Dense depth image co-located with the camera
    Frame(&'a DepthFrame),
    /// Points in the camera sensor frame
    Cloud(&'a PointCloud),
}

/// Result of one resolution
#[derive(Debug, Clone, PartialEq)]
pub struct GeolocationOutcome {
    /// Detections with a world transform, in input order
    pub obstacles: Vec<Obstacle>,
    /// Detections dropped for lack of a depth sample
    pub omitted: usize,
}

/// Resolves detection centroids to world locations.
#[derive(Debug, Clone)]
pub struct GeolocationResolver {
    intrinsics: CameraIntrinsics,
    mount: RigidTransform,
    validity_radius_px: f64,
}

impl GeolocationResolver {
    pub fn new(camera: &CameraSetup, config: &GeolocationConfig) -> Self {
        Self {
            intrinsics: CameraIntrinsics::from_setup(camera),
            mount: RigidTransform::from_transform(&camera.transform),
            validity_radius_px: config.validity_radius_px.max(0.0),
        }
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Resolve every detection against `depth` and `pose`.
    pub fn resolve(
        &self,
        obstacles: Vec<Obstacle>,
        depth: DepthSource<'_>,
        pose: &VehiclePose,
    ) -> GeolocationOutcome {
        let camera_to_world = RigidTransform::from_transform(&pose.transform).compose(&self.mount);
        let total = obstacles.len();

        let resolved: Vec<Obstacle> = obstacles
            .into_iter()
            .filter_map(|mut obstacle| {
                let Some((u, v)) = self.centroid(&obstacle) else {
                    debug!(obstacle_id = obstacle.id, "No usable centroid, obstacle omitted");
                    return None;
                };
                let Some(distance) = self.sample_depth(depth, u, v) else {
                    debug!(
                        obstacle_id = obstacle.id,
                        u, v, "No valid depth near centroid, obstacle omitted"
                    );
                    return None;
                };

                let camera_point = self.intrinsics.unproject(u, v, distance);
                let world = camera_to_world.transform_point(&camera_point);
                trace!(
                    obstacle_id = obstacle.id,
                    x = world.x,
                    y = world.y,
                    z = world.z,
                    "Obstacle located"
                );
                obstacle.transform = Some(Transform::new(world, Rotation::default()));
                Some(obstacle)
            })
            .collect();

        let omitted = total - resolved.len();
        GeolocationOutcome {
            obstacles: resolved,
            omitted,
        }
    }

    /// Image-plane centroid of a detection
    fn centroid(&self, obstacle: &Obstacle) -> Option<(f64, f64)> {
        match obstacle.bounding_shape? {
            BoundingShape::Box2D(bbox) => Some(bbox.center()),
            BoundingShape::Point3D(point) => self.intrinsics.project(&point),
        }
    }

    /// Forward distance at `(u, v)`, or the nearest valid sample within the radius
    fn sample_depth(&self, depth: DepthSource<'_>, u: f64, v: f64) -> Option<f64> {
        match depth {
            DepthSource::Frame(frame) => self.sample_frame(frame, u, v),
            DepthSource::Cloud(cloud) => self.sample_cloud(cloud, u, v),
        }
    }

    fn sample_frame(&self, frame: &DepthFrame, u: f64, v: f64) -> Option<f64> {
        let radius = self.validity_radius_px;
        let (width, height) = (frame.width as f64, frame.height as f64);
        // 质心离图像超过搜索半径时不可能命中任何像素
        if !(u.is_finite() && v.is_finite())
            || u < -radius - 1.0
            || v < -radius - 1.0
            || u > width + radius
            || v > height + radius
        {
            return None;
        }

        let px = u.round() as i64;
        let py = v.round() as i64;
        if let Some(depth) = frame.depth_at(px, py) {
            return Some(depth as f64);
        }

        let reach = radius.min(width.max(height)).floor() as i64;
        let mut best: Option<(i64, f32)> = None;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let dist2 = dx * dx + dy * dy;
                if dist2 as f64 > radius * radius {
                    continue;
                }
                if best.is_some_and(|(d, _)| d <= dist2) {
                    continue;
                }
                if let Some(depth) = frame.depth_at(px + dx, py + dy) {
                    best = Some((dist2, depth));
                }
            }
        }
        best.map(|(_, depth)| depth as f64)
    }

    fn sample_cloud(&self, cloud: &PointCloud, u: f64, v: f64) -> Option<f64> {
        let radius2 = self.validity_radius_px * self.validity_radius_px;
        cloud
            .points
            .iter()
            .filter_map(|point| {
                let (pu, pv) = self.intrinsics.project(point)?;
                let dist2 = (pu - u).powi(2) + (pv - v).powi(2);
                (dist2 <= radius2).then_some((dist2, point.x))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, forward)| forward)
    }
}
