//! `run` command implementation.

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

use contracts::{PipelineBlueprint, SinkConfig, SinkType};
use sync_engine::OperatorHealth;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{InputSource, Pipeline, PipelineConfig};

use super::load_blueprint;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let blueprint = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            load_blueprint(path)?
        }
        None => {
            info!("No configuration given, using built-in defaults with a log sink");
            default_blueprint()
        }
    };

    info!(
        obstacle_location = blueprint.operators.obstacle_location,
        time_to_decision = blueprint.operators.time_to_decision,
        depth_source = ?blueprint.geolocation.depth_source,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let source = match &args.scenario {
        Some(path) => InputSource::Scenario(path.clone()),
        None => InputSource::Synthetic {
            ticks: (args.ticks > 0).then_some(args.ticks),
            step_ms: args.step_ms,
            interval: Duration::from_millis(args.interval_ms),
            skip: args.skip.clone(),
        },
    };

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        source,
        max_outputs: (args.max_outputs > 0).then_some(args.max_outputs),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        result = pipeline.run() => {
            let stats = result?;
            info!(
                fired = stats.correlation.total_fired,
                failed = stats.correlation.total_failed,
                outputs = stats.data_outputs(),
                duration_secs = stats.duration.as_secs_f64(),
                "Pipeline completed"
            );
            stats.print_summary();

            for report in &stats.operators {
                if let OperatorHealth::Unhealthy { reason } = &report.health {
                    return Err(CliError::operator_unhealthy(&report.operator, reason).into());
                }
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("Correlator finished");
    Ok(())
}

fn default_blueprint() -> PipelineBlueprint {
    PipelineBlueprint {
        sinks: vec![SinkConfig {
            name: "log".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 1000,
            params: Default::default(),
        }],
        ..Default::default()
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Operators:");
    if blueprint.operators.obstacle_location {
        println!(
            "  - obstacle_location {:?}",
            blueprint.obstacle_location_channels()
        );
    }
    if blueprint.operators.time_to_decision {
        println!("  - time_to_decision [\"pose\"]");
    }

    println!(
        "\nEngine: max_buffer_depth={}, max_pending_timestamps={}",
        blueprint.engine.max_buffer_depth, blueprint.engine.max_pending_timestamps
    );
    println!(
        "Camera: {}x{} fov={}°",
        blueprint.camera.width, blueprint.camera.height, blueprint.camera.fov_deg
    );
    println!(
        "Geolocation: {:?}, radius={}px",
        blueprint.geolocation.depth_source, blueprint.geolocation.validity_radius_px
    );
    println!(
        "Deadline: {}ms @ {}m/s, -{}ms per m/s, plausible <= {}ms",
        blueprint.deadline.baseline_ms,
        blueprint.deadline.reference_speed_mps,
        blueprint.deadline.sensitivity_ms_per_mps,
        blueprint.deadline.max_plausible_ms
    );

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
