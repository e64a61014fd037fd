//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use ingestion::SkippedPayload;

use crate::error::CliError;

/// Correlator - watermark-gated multi-stream correlation pipeline
#[derive(Parser, Debug)]
#[command(
    name = "correlator",
    author,
    version,
    about = "Watermark-gated multi-stream correlation pipeline",
    long_about = "Correlates timestamped obstacle, depth and pose streams.\n\n\
                  Each operator fires once every input channel has certified a \n\
                  timestamp with a watermark, then geolocates obstacles or \n\
                  estimates the time-to-decision and dispatches to configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CORRELATOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CORRELATOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log level derived from -v / -q
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the correlation pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Run(_) => "run",
            Commands::Validate(_) => "validate",
            Commands::Info(_) => "info",
        }
    }
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "CORRELATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Replay a JSON-lines scenario instead of the synthetic driver
    #[arg(long, env = "CORRELATOR_SCENARIO")]
    pub scenario: Option<PathBuf>,

    /// Synthetic ticks per channel (0 = until stopped)
    #[arg(long, default_value = "100", env = "CORRELATOR_TICKS")]
    pub ticks: u64,

    /// Simulation time between synthetic ticks, in milliseconds
    #[arg(long, default_value = "100")]
    pub step_ms: u64,

    /// Wall-clock pause between synthetic ticks, in milliseconds
    #[arg(long, default_value = "0")]
    pub interval_ms: u64,

    /// Drop the synthetic payload of a channel at a tick (`channel:tick`, repeatable)
    #[arg(long = "skip", value_name = "CHANNEL:TICK", value_parser = parse_skip)]
    pub skip: Vec<SkippedPayload>,

    /// Stop after this many data outputs across all operators (0 = unlimited)
    #[arg(long, default_value = "0", env = "CORRELATOR_MAX_OUTPUTS")]
    pub max_outputs: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "CORRELATOR_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Capacity of the internal queues
    #[arg(long, default_value = "100", env = "CORRELATOR_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CORRELATOR_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the input channels of each operator
    #[arg(long)]
    pub channels: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

fn parse_skip(value: &str) -> Result<SkippedPayload, CliError> {
    let (channel, tick) = value
        .rsplit_once(':')
        .ok_or_else(|| CliError::invalid_skip(value, "expected CHANNEL:TICK"))?;
    if channel.is_empty() {
        return Err(CliError::invalid_skip(value, "channel is empty"));
    }
    let tick = tick
        .parse::<u64>()
        .map_err(|e| CliError::invalid_skip(value, e.to_string()))?;
    Ok(SkippedPayload {
        channel: channel.into(),
        tick,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skip() {
        let skip = parse_skip("depth:7").unwrap();
        assert_eq!(skip.channel, "depth");
        assert_eq!(skip.tick, 7);

        assert!(parse_skip("depth").is_err());
        assert!(parse_skip(":3").is_err());
        assert!(parse_skip("depth:x").is_err());
    }

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::parse_from([
            "correlator",
            "-v",
            "run",
            "--ticks",
            "20",
            "--skip",
            "depth:5",
            "--skip",
            "pose:6",
            "--max-outputs",
            "10",
        ]);
        assert_eq!(cli.log_level(), "debug");
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.ticks, 20);
        assert_eq!(args.skip.len(), 2);
        assert_eq!(args.max_outputs, 10);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["correlator", "-q", "-v", "info"]).is_err());
        let cli = Cli::parse_from(["correlator", "-q", "info"]);
        assert_eq!(cli.log_level(), "warn");
    }
}
