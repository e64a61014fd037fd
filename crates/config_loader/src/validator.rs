//! 配置校验模块
//!
//! 校验规则：
//! - 至少启用一个算子
//! - 引擎缓冲与挂起上限 > 0
//! - 相机分辨率 > 0，fov 在 (0, 180) 之间
//! - 定位搜索半径有限且 >= 0
//! - 时限模型常数有限，敏感度 >= 0 (时限随速度单调不增)
//! - sink 名称非空且唯一，队列容量 > 0

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_operators(blueprint)?;
    validate_engine(blueprint)?;
    validate_camera(blueprint)?;
    validate_geolocation(blueprint)?;
    validate_deadline(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_operators(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.enabled_operator_count() == 0 {
        return Err(ContractError::invalid(
            "operators",
            "at least one operator must be enabled",
        ));
    }
    Ok(())
}

fn validate_engine(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let engine = &blueprint.engine;
    if engine.max_buffer_depth == 0 {
        return Err(ContractError::invalid(
            "engine.max_buffer_depth",
            "max_buffer_depth must be > 0",
        ));
    }
    if engine.max_pending_timestamps == 0 {
        return Err(ContractError::invalid(
            "engine.max_pending_timestamps",
            "max_pending_timestamps must be > 0",
        ));
    }
    Ok(())
}

fn validate_camera(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let camera = &blueprint.camera;
    if camera.width == 0 || camera.height == 0 {
        return Err(ContractError::invalid(
            "camera.width / camera.height",
            format!(
                "image size must be > 0, got {}x{}",
                camera.width, camera.height
            ),
        ));
    }
    if !(camera.fov_deg > 0.0 && camera.fov_deg < 180.0) {
        return Err(ContractError::invalid(
            "camera.fov_deg",
            format!("fov_deg must be in (0, 180), got {}", camera.fov_deg),
        ));
    }
    Ok(())
}

fn validate_geolocation(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let radius = blueprint.geolocation.validity_radius_px;
    if !radius.is_finite() || radius < 0.0 {
        return Err(ContractError::invalid(
            "geolocation.validity_radius_px",
            format!("validity_radius_px must be finite and >= 0, got {radius}"),
        ));
    }
    Ok(())
}

fn validate_deadline(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let deadline = &blueprint.deadline;
    let constants = [
        ("deadline.baseline_ms", deadline.baseline_ms),
        ("deadline.reference_speed_mps", deadline.reference_speed_mps),
        ("deadline.sensitivity_ms_per_mps", deadline.sensitivity_ms_per_mps),
        ("deadline.max_plausible_ms", deadline.max_plausible_ms),
    ];
    for (field, value) in constants {
        if !value.is_finite() {
            return Err(ContractError::invalid(
                field,
                format!("must be finite, got {value}"),
            ));
        }
    }
    if deadline.sensitivity_ms_per_mps < 0.0 {
        return Err(ContractError::invalid(
            "deadline.sensitivity_ms_per_mps",
            format!(
                "sensitivity must be >= 0 so the deadline never grows with speed, got {}",
                deadline.sensitivity_ms_per_mps
            ),
        ));
    }
    if deadline.max_plausible_ms <= 0.0 {
        return Err(ContractError::invalid(
            "deadline.max_plausible_ms",
            "max_plausible_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_sinks(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::invalid(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::invalid(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::invalid(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}
