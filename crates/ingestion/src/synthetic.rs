//! Synthetic driver source
//!
//! 无模拟器环境下的数据源：按仿真步长为每个通道生成 payload，
//! 随后发送同一时间戳的 watermark (`[game_time_ms]`)。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    BoundingBox2D, BoundingShape, CameraFrame, CameraSetup, ChannelId, DepthFrame,
    DepthSourceKind, Location, Obstacle, Payload, PointCloud, Rotation, Transform, Vector3,
    VehiclePose,
};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{IngestionError, Result};
use crate::pipeline::{ChannelReport, ChannelSender};

/// A payload the source leaves out (the watermark is still sent)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPayload {
    pub channel: ChannelId,
    pub tick: u64,
}

/// Synthetic source configuration
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Number of ticks per channel; `None` runs until stopped
    pub ticks: Option<u64>,

    /// Simulation step (ms); tick `n` carries timestamp `[n * step_ms]`
    pub step_ms: u64,

    /// Wall-clock pause between ticks; zero sends as fast as the queue allows
    pub interval: Duration,

    pub camera: CameraSetup,

    /// Payload kind of the depth channel
    pub depth_source: DepthSourceKind,

    /// Mean forward speed (m/s)
    pub base_speed: f64,

    /// Amplitude of the speed oscillation (m/s)
    pub speed_amplitude: f64,

    /// Detections per tick
    pub obstacle_count: usize,

    /// Forward distance of every detection (m)
    pub obstacle_distance: f64,

    /// Fault injection
    pub skip_payloads: Vec<SkippedPayload>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            ticks: Some(100),
            step_ms: 100,
            interval: Duration::ZERO,
            camera: CameraSetup::default(),
            depth_source: DepthSourceKind::DepthFrame,
            base_speed: 10.0,
            speed_amplitude: 5.0,
            obstacle_count: 3,
            obstacle_distance: 20.0,
            skip_payloads: Vec::new(),
        }
    }
}

impl SyntheticConfig {
    /// Timestamp (ms) carried by tick `tick`
    pub fn timestamp_ms(&self, tick: u64) -> u64 {
        tick * self.step_ms
    }
}

/// Synthetic driver source
///
/// One task per channel, each writing payload + watermark per tick.
pub struct SyntheticSource {
    config: Arc<SyntheticConfig>,
    running: Arc<AtomicBool>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config: Arc::new(config),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// 启动：每个通道一个写入任务
    pub fn start(&self, senders: Vec<ChannelSender>) -> Vec<JoinHandle<Result<ChannelReport>>> {
        self.running.store(true, Ordering::SeqCst);

        senders
            .into_iter()
            .map(|sender| {
                let config = self.config.clone();
                let running = self.running.clone();
                tokio::spawn(drive_channel(config, running, sender))
            })
            .collect()
    }

    /// 停止所有通道（当前 tick 完成后生效）
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Payload of `channel` at `tick`, `None` for channels the scene has no
    /// data for or payloads skipped by fault injection
    pub fn payload_at(&self, channel: &str, tick: u64) -> Option<Payload> {
        payload_at(&self.config, channel, tick)
    }
}

async fn drive_channel(
    config: Arc<SyntheticConfig>,
    running: Arc<AtomicBool>,
    sender: ChannelSender,
) -> Result<ChannelReport> {
    let channel = sender.channel().clone();
    let mut report = ChannelReport {
        channel: channel.clone(),
        ticks: 0,
        payloads: 0,
    };

    if !is_known_channel(&channel) {
        warn!(channel = %channel, "synthetic source has no data for channel, sending watermarks only");
    }
    debug!(channel = %channel, ticks = ?config.ticks, step_ms = config.step_ms, "synthetic source started");

    let mut tick = 0u64;
    while running.load(Ordering::Relaxed) {
        tick += 1;
        if config.ticks.is_some_and(|n| tick > n) {
            break;
        }
        let timestamp = config.timestamp_ms(tick);

        let sent = async {
            if let Some(payload) = payload_at(&config, &channel, tick) {
                sender.send_payload(timestamp, payload).await?;
                report.payloads += 1;
            }
            sender.send_watermark(timestamp).await
        }
        .await;

        match sent {
            Ok(()) => report.ticks += 1,
            Err(IngestionError::ChannelClosed { .. }) => {
                debug!(channel = %channel, "synthetic channel closed");
                break;
            }
            Err(e) => return Err(e),
        }
        trace!(channel = %channel, timestamp, "tick sent");

        if !config.interval.is_zero() {
            tokio::time::sleep(config.interval).await;
        }
    }

    debug!(channel = %channel, ticks = report.ticks, "synthetic source stopped");
    Ok(report)
}

fn is_known_channel(channel: &str) -> bool {
    [
        ChannelId::OBSTACLES,
        ChannelId::DEPTH,
        ChannelId::POSE,
        ChannelId::CAMERA,
    ]
    .contains(&channel)
}

fn payload_at(config: &SyntheticConfig, channel: &str, tick: u64) -> Option<Payload> {
    let skipped = config
        .skip_payloads
        .iter()
        .any(|s| s.tick == tick && s.channel == channel);
    if skipped {
        return None;
    }

    match channel {
        ChannelId::POSE => Some(Payload::Pose(pose_at(config, tick))),
        ChannelId::OBSTACLES => Some(Payload::Obstacles(detections(config))),
        ChannelId::DEPTH => Some(depth(config)),
        ChannelId::CAMERA => {
            let CameraSetup { width, height, .. } = config.camera;
            Some(Payload::Camera(CameraFrame {
                width,
                height,
                data: Bytes::from(vec![128u8; bgra_len(width, height)]),
            }))
        }
        _ => None,
    }
}

/// Byte length of a BGRA image
fn bgra_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

fn speed_at(config: &SyntheticConfig, seconds: f64) -> f64 {
    config.base_speed + config.speed_amplitude * (seconds * 0.5).sin()
}

fn pose_at(config: &SyntheticConfig, tick: u64) -> VehiclePose {
    let seconds = config.timestamp_ms(tick) as f64 / 1000.0;
    let speed = speed_at(config, seconds);
    // closed-form integral of speed_at
    let x = config.base_speed * seconds + 2.0 * config.speed_amplitude * (1.0 - (seconds * 0.5).cos());

    VehiclePose {
        transform: Transform::new(Location::new(x, 0.0, 0.0), Rotation::default()),
        forward_speed: speed,
        velocity: Vector3::new(speed, 0.0, 0.0),
    }
}

/// Pixel centres of the detections, spread along the horizon row
fn detection_pixels(config: &SyntheticConfig) -> Vec<(f64, f64)> {
    let CameraSetup { width, height, .. } = config.camera;
    let (w, h) = (width as f64, height as f64);
    let n = config.obstacle_count;
    (0..n)
        .map(|i| (w * (i as f64 + 1.0) / (n as f64 + 1.0), h / 2.0))
        .collect()
}

fn detections(config: &SyntheticConfig) -> Vec<Obstacle> {
    detection_pixels(config)
        .into_iter()
        .enumerate()
        .map(|(i, (u, v))| {
            let label = if i % 2 == 0 { "vehicle" } else { "person" };
            Obstacle::new(i as u64 + 1, label, 0.9).with_shape(BoundingShape::Box2D(
                BoundingBox2D::new(u - 20.0, u + 20.0, v - 20.0, v + 20.0),
            ))
        })
        .collect()
}

fn depth(config: &SyntheticConfig) -> Payload {
    let CameraSetup {
        width,
        height,
        fov_deg,
        ..
    } = config.camera;
    let distance = config.obstacle_distance;

    match config.depth_source {
        DepthSourceKind::DepthFrame => {
            Payload::Depth(DepthFrame::uniform(width, height, distance as f32))
        }
        DepthSourceKind::PointCloud => {
            let focal = width as f64 / (2.0 * (fov_deg.to_radians() / 2.0).tan());
            let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
            let points = detection_pixels(config)
                .into_iter()
                .map(|(u, v)| {
                    Location::new(
                        distance,
                        (u - cx) * distance / focal,
                        -(v - cy) * distance / focal,
                    )
                })
                .collect();
            Payload::PointCloud(PointCloud { points })
        }
    }
}
