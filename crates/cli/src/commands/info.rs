//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{
    CameraSetup, ChannelId, DeadlineConfig, EngineConfig, GeolocationConfig, PipelineBlueprint,
};
use operators::{TimeToDecisionOperator, OBSTACLE_LOCATION, TIME_TO_DECISION};

use crate::cli::InfoArgs;

use super::load_blueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    version: String,
    engine: &'a EngineConfig,
    camera: &'a CameraSetup,
    geolocation: &'a GeolocationConfig,
    deadline: &'a DeadlineConfig,
    operators: Vec<OperatorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct OperatorInfo {
    name: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    channels: Vec<ChannelId>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

/// Enabled operators with their input channels in registration order
fn enabled_operators(blueprint: &PipelineBlueprint) -> Vec<(&'static str, Vec<ChannelId>)> {
    let mut enabled = Vec::new();
    if blueprint.operators.obstacle_location {
        enabled.push((OBSTACLE_LOCATION, blueprint.obstacle_location_channels()));
    }
    if blueprint.operators.time_to_decision {
        enabled.push((TIME_TO_DECISION, TimeToDecisionOperator::channels()));
    }
    enabled
}

fn build_config_info<'a>(blueprint: &'a PipelineBlueprint, args: &InfoArgs) -> ConfigInfo<'a> {
    let operators = enabled_operators(blueprint)
        .into_iter()
        .map(|(name, channels)| OperatorInfo {
            name,
            channels: if args.channels { channels } else { Vec::new() },
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        engine: &blueprint.engine,
        camera: &blueprint.camera,
        geolocation: &blueprint.geolocation,
        deadline: &blueprint.deadline,
        operators,
        sinks,
    }
}

fn print_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                Correlator Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🧩 Engine");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Max buffer depth: {}", blueprint.engine.max_buffer_depth);
    println!(
        "   └─ Max pending timestamps: {}",
        blueprint.engine.max_pending_timestamps
    );

    let camera = &blueprint.camera;
    let location = &camera.transform.location;
    println!("\n📷 Camera");
    println!("   ├─ Image: {}x{}", camera.width, camera.height);
    println!("   ├─ FOV: {}°", camera.fov_deg);
    println!(
        "   └─ Mount: ({}, {}, {})",
        location.x, location.y, location.z
    );

    println!("\n📍 Geolocation");
    println!("   ├─ Depth source: {:?}", blueprint.geolocation.depth_source);
    println!(
        "   └─ Validity radius: {}px",
        blueprint.geolocation.validity_radius_px
    );

    let deadline = &blueprint.deadline;
    println!("\n⏱️  Deadline model");
    println!(
        "   ├─ Baseline: {}ms @ {}m/s",
        deadline.baseline_ms, deadline.reference_speed_mps
    );
    println!("   ├─ Sensitivity: {}ms per m/s", deadline.sensitivity_ms_per_mps);
    println!("   └─ Max plausible: {}ms", deadline.max_plausible_ms);

    let operators = enabled_operators(blueprint);
    println!("\n⚙️  Operators ({})", operators.len());
    for (i, (name, channels)) in operators.iter().enumerate() {
        let is_last = i == operators.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {}", prefix, name);
        if args.channels {
            for (j, channel) in channels.iter().enumerate() {
                let channel_prefix = if j == channels.len() - 1 { "└─" } else { "├─" };
                println!("   {}  {} {}", child_prefix, channel_prefix, channel);
            }
        } else {
            println!("   {}  └─ {} channels", child_prefix, channels.len());
        }
    }

    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            if args.sinks {
                println!(
                    "   {} {} ({:?}, queue {}) {:?}",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity, sink.params
                );
            } else {
                println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_info_json() {
        let mut blueprint = PipelineBlueprint::default();
        blueprint.operators.camera_channel = true;
        let args = InfoArgs {
            config: "unused.toml".into(),
            json: true,
            channels: true,
            sinks: false,
        };

        let info = build_config_info(&blueprint, &args);
        let value = serde_json::to_value(&info).unwrap();

        assert_eq!(value["operators"][0]["name"], "obstacle_location");
        assert_eq!(
            value["operators"][0]["channels"],
            serde_json::json!(["obstacles", "depth", "pose", "camera"])
        );
        assert_eq!(value["operators"][1]["channels"], serde_json::json!(["pose"]));
        assert_eq!(value["deadline"]["baseline_ms"], 400.0);
        assert!(value.get("sinks").is_none());
    }
}
