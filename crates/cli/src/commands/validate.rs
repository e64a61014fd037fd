//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::PipelineBlueprint;

use crate::cli::ValidateArgs;

use super::load_blueprint;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    operators: Vec<String>,
    channel_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_blueprint(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(summarize(&blueprint)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{:#}", e)),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(blueprint: &PipelineBlueprint) -> ConfigSummary {
    let mut names = Vec::new();
    let mut channels = Vec::new();
    if blueprint.operators.obstacle_location {
        names.push(operators::OBSTACLE_LOCATION.to_string());
        channels.extend(blueprint.obstacle_location_channels());
    }
    if blueprint.operators.time_to_decision {
        names.push(operators::TIME_TO_DECISION.to_string());
        channels.extend(operators::TimeToDecisionOperator::channels());
    }
    channels.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    channels.dedup();

    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        operators: names,
        channel_count: channels.len(),
        sink_count: blueprint.sinks.len(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - operator output will be dropped".to_string());
    }

    if blueprint.operators.camera_channel && !blueprint.operators.obstacle_location {
        warnings.push(
            "operators.camera_channel has no effect while obstacle_location is disabled"
                .to_string(),
        );
    }

    let deadline = &blueprint.deadline;
    if deadline.baseline_ms > deadline.max_plausible_ms {
        warnings.push(format!(
            "deadline.baseline_ms ({}) exceeds max_plausible_ms ({}) - estimates at the reference speed will be flagged",
            deadline.baseline_ms, deadline.max_plausible_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Operators: {}", summary.operators.join(", "));
            println!("  Channels: {}", summary.channel_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(file: &NamedTempFile) -> ValidateArgs {
        ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        }
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = config_file(
            r#"
[operators]
obstacle_location = false
camera_channel = true
"#,
        );

        let result = validate_config(&args(&file));
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("No sinks"));
        let summary = result.summary.unwrap();
        assert_eq!(summary.operators, vec!["time_to_decision"]);
        assert_eq!(summary.channel_count, 1);
    }

    #[test]
    fn test_invalid_config() {
        let file = config_file(
            r#"
[deadline]
sensitivity_ms_per_mps = -1.0
"#,
        );

        let result = validate_config(&args(&file));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("sensitivity"));
        assert!(run_validate(&args(&file)).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&ValidateArgs {
            config: "does/not/exist.toml".into(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }
}
