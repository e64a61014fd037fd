//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus 指标导出
//! - 关联引擎指标记录与内存统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::metrics;
//!
//! // 初始化
//! observability::init()?;
//!
//! // 记录一次成功关联
//! metrics::record_timestamp_fired("obstacle_location", latency_ms);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

// Re-exports
pub use crate::metrics::{
    record_buffer_depth, record_correlation_latency_ms, record_deadline_ms, record_geolocation,
    record_message_received, record_message_rejected, record_operator_health,
    record_output_dispatched, record_pending_timestamps, record_timestamp_failed,
    record_timestamp_fired, record_timestamp_skipped, CorrelationStatsAggregator, MetricsSummary,
    RunningStats, StatsSummary,
};

use std::net::SocketAddr;

/// 初始化可观测性（JSON 日志 + Prometheus 0.0.0.0:9000）
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default().with_metrics_port(DEFAULT_METRICS_PORT))
}

/// Prometheus 默认端口
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// 未设置 RUST_LOG 时的日志级别 (EnvFilter 语法)
    pub log_level: String,
    /// Prometheus 监听地址 (None = 禁用)
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            log_level: "info".to_string(),
            metrics_listen: None,
        }
    }
}

impl ObservabilityConfig {
    pub fn new(log_format: LogFormat, log_level: impl Into<String>) -> Self {
        Self {
            log_format,
            log_level: log_level.into(),
            metrics_listen: None,
        }
    }

    /// 在 0.0.0.0:`port` 上导出 Prometheus 指标
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_listen = Some(SocketAddr::from(([0, 0, 0, 0], port)));
        self
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 使用自定义配置初始化
///
/// 全局 subscriber 只能安装一次，重复调用返回错误。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format))
        .with(env_filter(&config.log_level))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(addr) = config.metrics_listen {
        install_prometheus(addr)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        log_level = %config.log_level,
        metrics_listen = ?config.metrics_listen,
        "Observability initialized"
    );

    Ok(())
}

/// 仅初始化 Prometheus 指标（不初始化 Tracing）
///
/// 用于 Tracing 已由其他模块初始化的场景。
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(SocketAddr::from(([0, 0, 0, 0], port)))
}

/// RUST_LOG 优先，否则使用 `default_level`
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on {addr}"))?;

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}
