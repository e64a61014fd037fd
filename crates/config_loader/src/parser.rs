//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, PipelineBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<PipelineBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::parse("TOML", e))
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<PipelineBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::parse("JSON", e))
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DepthSourceKind, SinkType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[camera]
width = 1280
height = 720
fov_deg = 70.0
[camera.transform.location]
x = 1.5
y = 0.0
z = 1.4
[camera.transform.rotation]
pitch = 0.0
yaw = 0.0
roll = 0.0

[geolocation]
depth_source = "point_cloud"

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.camera.width, 1280);
        assert_eq!(bp.geolocation.depth_source, DepthSourceKind::PointCloud);
        assert_eq!(bp.geolocation.validity_radius_px, 3.0);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Log);
        assert_eq!(bp.sinks[0].queue_capacity, 100);
    }

    #[test]
    fn test_parse_empty_toml_uses_defaults() {
        let bp = parse_toml("").unwrap();
        assert_eq!(bp.engine.max_buffer_depth, 1024);
        assert_eq!(bp.deadline.baseline_ms, 400.0);
        assert!(bp.operators.obstacle_location && bp.operators.time_to_decision);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "engine": { "max_buffer_depth": 64 },
            "deadline": { "baseline_ms": 450.0 },
            "operators": { "obstacle_location": false },
            "sinks": [{ "name": "out", "sink_type": "file", "params": { "base_path": "/tmp/out" } }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.engine.max_buffer_depth, 64);
        assert_eq!(bp.engine.max_pending_timestamps, 256);
        assert_eq!(bp.deadline.baseline_ms, 450.0);
        assert_eq!(bp.deadline.reference_speed_mps, 10.0);
        assert!(!bp.operators.obstacle_location);
        assert_eq!(bp.sinks[0].params["base_path"], "/tmp/out");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::Parse { .. }));
    }

    #[test]
    fn test_unknown_sink_type_rejected() {
        let content = r#"
[[sinks]]
name = "net"
sink_type = "network"
"#;
        assert!(matches!(
            parse_toml(content),
            Err(ContractError::Parse { .. })
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
