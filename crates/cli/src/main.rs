//! # Correlator CLI
//!
//! 命令行入口：`run` 启动关联管道，`validate` / `info` 检查配置文件。

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Prometheus exporter 仅在 `run --metrics-port` 时安装
    observability::init_with_config(ObservabilityConfig::new(
        cli.log_format.into(),
        cli.log_level(),
    ))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = cli.command.name(),
        "correlator starting"
    );

    let outcome = match &cli.command {
        Commands::Run(args) => commands::run_pipeline(args).await,
        Commands::Validate(args) => commands::run_validate(args),
        Commands::Info(args) => commands::run_info(args),
    };

    if let Err(e) = &outcome {
        tracing::error!(error = format!("{e:#}"), "command failed");
    }
    outcome
}
