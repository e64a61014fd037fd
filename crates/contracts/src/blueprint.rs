//! PipelineBlueprint - Config Loader 输出
//!
//! 描述完整的管道配置：引擎限制、相机、定位、时限模型、启用的算子、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{CameraSetup, ChannelId, DeadlineConfig, EngineConfig, GeolocationConfig};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的管道配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 引擎限制 (每个算子实例各自一份)
    #[serde(default)]
    pub engine: EngineConfig,

    /// 相机内参与安装位姿
    #[serde(default)]
    pub camera: CameraSetup,

    /// 障碍物定位配置
    #[serde(default)]
    pub geolocation: GeolocationConfig,

    /// 决策时限模型常数
    #[serde(default)]
    pub deadline: DeadlineConfig,

    /// 启用的算子
    #[serde(default)]
    pub operators: OperatorsConfig,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 算子开关
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorsConfig {
    /// Obstacle location finder (obstacles + depth + pose [+ camera])
    #[serde(default = "default_enabled")]
    pub obstacle_location: bool,

    /// Time-to-decision estimator (pose)
    #[serde(default = "default_enabled")]
    pub time_to_decision: bool,

    /// Also correlate the camera channel in the obstacle location finder
    #[serde(default)]
    pub camera_channel: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for OperatorsConfig {
    fn default() -> Self {
        Self {
            obstacle_location: true,
            time_to_decision: true,
            camera_channel: false,
        }
    }
}

impl PipelineBlueprint {
    /// Input channels of the obstacle location finder, in registration order
    pub fn obstacle_location_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = vec![
            ChannelId::OBSTACLES.into(),
            ChannelId::DEPTH.into(),
            ChannelId::POSE.into(),
        ];
        if self.operators.camera_channel {
            channels.push(ChannelId::CAMERA.into());
        }
        channels
    }

    /// Number of enabled operators
    pub fn enabled_operator_count(&self) -> usize {
        usize::from(self.operators.obstacle_location) + usize::from(self.operators.time_to_decision)
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// JSON Lines 文件输出
    File,
}
