//! Obstacle location finder
//!
//! Correlates detections, depth and vehicle pose (plus, optionally, the camera
//! frame) for one timestamp and emits the detections that could be placed in
//! the world.

use contracts::{
    CameraSetup, ChannelId, EngineConfig, GeolocationConfig, LogicalTimestamp, Payload,
    PipelineBlueprint,
};
use sync_engine::{Correlate, CorrelationEngine, SyncError};
use tracing::debug;

use crate::geolocation::{DepthSource, GeolocationResolver};
use crate::OperatorError;

pub const OBSTACLE_LOCATION: &str = "obstacle_location";

/// Running totals of the resolver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationStats {
    pub resolved: u64,
    pub omitted: u64,
}

/// 障碍物定位算子
#[derive(Debug, Clone)]
pub struct ObstacleLocationFinder {
    resolver: GeolocationResolver,
    with_camera: bool,
    stats: LocationStats,
}

impl ObstacleLocationFinder {
    pub fn new(camera: &CameraSetup, geolocation: &GeolocationConfig, with_camera: bool) -> Self {
        Self {
            resolver: GeolocationResolver::new(camera, geolocation),
            with_camera,
            stats: LocationStats::default(),
        }
    }

    pub fn from_blueprint(blueprint: &PipelineBlueprint) -> Self {
        Self::new(
            &blueprint.camera,
            &blueprint.geolocation,
            blueprint.operators.camera_channel,
        )
    }

    /// Input channels in the order the inputs reach `correlate`
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = vec![
            ChannelId::OBSTACLES.into(),
            ChannelId::DEPTH.into(),
            ChannelId::POSE.into(),
        ];
        if self.with_camera {
            channels.push(ChannelId::CAMERA.into());
        }
        channels
    }

    pub fn into_engine(self, config: &EngineConfig) -> Result<CorrelationEngine<Self>, SyncError> {
        let channels = self.channels();
        CorrelationEngine::new(config, &channels, self)
    }

    pub fn stats(&self) -> LocationStats {
        self.stats
    }
}

impl Correlate for ObstacleLocationFinder {
    type Input = Payload;
    type Output = Payload;
    type Error = OperatorError;

    fn name(&self) -> &str {
        OBSTACLE_LOCATION
    }

    fn correlate(
        &mut self,
        timestamp: &LogicalTimestamp,
        inputs: Vec<Payload>,
    ) -> Result<Payload, OperatorError> {
        let expected = if self.with_camera { 4 } else { 3 };
        if inputs.len() != expected {
            return Err(OperatorError::InputCount {
                expected,
                found: inputs.len(),
            });
        }

        let mut inputs = inputs.into_iter();
        let (Some(obstacles), Some(depth), Some(pose)) = (inputs.next(), inputs.next(), inputs.next())
        else {
            return Err(OperatorError::InputCount {
                expected,
                found: 0,
            });
        };

        let obstacles = match obstacles {
            Payload::Obstacles(obstacles) => obstacles,
            other => {
                return Err(OperatorError::unexpected(
                    ChannelId::OBSTACLES,
                    "obstacles",
                    other.kind(),
                ))
            }
        };
        let pose = match pose {
            Payload::Pose(pose) => pose,
            other => return Err(OperatorError::unexpected(ChannelId::POSE, "pose", other.kind())),
        };
        if let Some(camera) = inputs.next() {
            // aligned and consumed, the resolver works from depth alone
            if !matches!(camera, Payload::Camera(_)) {
                return Err(OperatorError::unexpected(
                    ChannelId::CAMERA,
                    "camera",
                    camera.kind(),
                ));
            }
        }

        // depth 通道可以混合携带深度图和点云，按消息类型选择
        let depth = match &depth {
            Payload::Depth(frame) => DepthSource::Frame(frame),
            Payload::PointCloud(cloud) => DepthSource::Cloud(cloud),
            other => {
                return Err(OperatorError::unexpected(
                    ChannelId::DEPTH,
                    "depth or point_cloud",
                    other.kind(),
                ))
            }
        };

        let detected = obstacles.len();
        let outcome = self.resolver.resolve(obstacles, depth, &pose);
        self.stats.resolved += outcome.obstacles.len() as u64;
        self.stats.omitted += outcome.omitted as u64;
        observability::record_geolocation(outcome.obstacles.len(), outcome.omitted);

        debug!(
            timestamp = %timestamp,
            detected,
            located = outcome.obstacles.len(),
            omitted = outcome.omitted,
            "Obstacles located"
        );

        Ok(Payload::Obstacles(outcome.obstacles))
    }
}
