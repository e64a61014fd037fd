//! Correlation engine 指标收集模块
//!
//! Prometheus 指标记录函数 + 内存聚合统计。
//! 所有指标名以 `correlator_` 为前缀，按算子 (operator) 与通道 (channel) 打标签。

use std::collections::HashMap;

use metrics::{counter, gauge, histogram};

/// 记录一个时间戳成功关联并发出输出
pub fn record_timestamp_fired(operator: &str, latency_ms: f64) {
    counter!(
        "correlator_timestamps_fired_total",
        "operator" => operator.to_string()
    )
    .increment(1);
    record_correlation_latency_ms(operator, latency_ms);
}

/// 记录一个时间戳关联失败 (`kind` 为失败类别，如 `empty_buffer`)
pub fn record_timestamp_failed(operator: &str, kind: &str) {
    counter!(
        "correlator_timestamps_failed_total",
        "operator" => operator.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// 记录一个被更新水位线取代而跳过的时间戳
pub fn record_timestamp_skipped(operator: &str, discarded: usize) {
    counter!(
        "correlator_timestamps_skipped_total",
        "operator" => operator.to_string()
    )
    .increment(1);
    if discarded > 0 {
        counter!(
            "correlator_payloads_discarded_total",
            "operator" => operator.to_string()
        )
        .increment(discarded as u64);
    }
}

/// 记录输入消息
pub fn record_message_received(operator: &str, channel: &str, watermark: bool) {
    let kind = if watermark { "watermark" } else { "data" };
    counter!(
        "correlator_messages_received_total",
        "operator" => operator.to_string(),
        "channel" => channel.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// 记录被拒绝的输入消息 (`reason` 如 `out_of_order`, `buffer_overflow`)
pub fn record_message_rejected(operator: &str, channel: &str, reason: &str) {
    counter!(
        "correlator_messages_rejected_total",
        "operator" => operator.to_string(),
        "channel" => channel.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(operator: &str, channel: &str, depth: usize) {
    gauge!(
        "correlator_buffer_depth",
        "operator" => operator.to_string(),
        "channel" => channel.to_string()
    )
    .set(depth as f64);
}

/// 记录等待认证的时间戳数量
pub fn record_pending_timestamps(operator: &str, pending: usize) {
    gauge!(
        "correlator_pending_timestamps",
        "operator" => operator.to_string()
    )
    .set(pending as f64);
}

/// 记录关联计算耗时
pub fn record_correlation_latency_ms(operator: &str, latency_ms: f64) {
    histogram!(
        "correlator_correlation_latency_ms",
        "operator" => operator.to_string()
    )
    .record(latency_ms);
}

/// 记录算子健康状态 (1 = healthy, 0 = unhealthy/closed)
pub fn record_operator_health(operator: &str, healthy: bool) {
    gauge!(
        "correlator_operator_healthy",
        "operator" => operator.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

/// 记录输出分发
pub fn record_output_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "correlator_outputs_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录决策时限估计值
pub fn record_deadline_ms(deadline_ms: f64, flagged: bool) {
    histogram!("correlator_deadline_ms").record(deadline_ms);
    gauge!("correlator_last_deadline_ms").set(deadline_ms);
    if flagged {
        counter!("correlator_deadline_flagged_total").increment(1);
    }
}

/// 记录障碍物定位结果
pub fn record_geolocation(resolved: usize, omitted: usize) {
    counter!("correlator_obstacles_resolved_total").increment(resolved as u64);
    if omitted > 0 {
        counter!("correlator_obstacles_omitted_total").increment(omitted as u64);
    }
}

/// 关联统计聚合器
///
/// 在内存中聚合运行统计，便于在运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct CorrelationStatsAggregator {
    /// 成功关联的时间戳数
    pub total_fired: u64,

    /// 关联失败的时间戳数
    pub total_failed: u64,

    /// 被跳过的时间戳数
    pub total_skipped: u64,

    /// 因跳过或失败被丢弃的载荷数
    pub payloads_discarded: u64,

    /// 被拒绝的输入消息数 (按原因)
    pub rejected: HashMap<String, u64>,

    /// 失败次数 (按类别)
    pub failures: HashMap<String, u64>,

    /// 关联耗时统计 (ms)
    pub latency_stats: RunningStats,

    /// 决策时限统计 (ms)
    pub deadline_stats: RunningStats,

    /// 被标记为不合理的时限数
    pub deadlines_flagged: u64,

    /// 定位成功的障碍物数
    pub obstacles_resolved: u64,

    /// 无有效深度而被省略的障碍物数
    pub obstacles_omitted: u64,
}

impl CorrelationStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fired(&mut self, latency_ms: f64) {
        self.total_fired += 1;
        self.latency_stats.push(latency_ms);
    }

    pub fn record_failed(&mut self, kind: &str, discarded: usize) {
        self.total_failed += 1;
        self.payloads_discarded += discarded as u64;
        *self.failures.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_skipped(&mut self, discarded: usize) {
        self.total_skipped += 1;
        self.payloads_discarded += discarded as u64;
    }

    pub fn record_rejected(&mut self, reason: &str) {
        *self.rejected.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn record_deadline(&mut self, deadline_ms: f64, flagged: bool) {
        self.deadline_stats.push(deadline_ms);
        if flagged {
            self.deadlines_flagged += 1;
        }
    }

    pub fn record_geolocation(&mut self, resolved: usize, omitted: usize) {
        self.obstacles_resolved += resolved as u64;
        self.obstacles_omitted += omitted as u64;
    }

    /// 合并另一个聚合器 (多算子汇总)
    pub fn merge(&mut self, other: &CorrelationStatsAggregator) {
        self.total_fired += other.total_fired;
        self.total_failed += other.total_failed;
        self.total_skipped += other.total_skipped;
        self.payloads_discarded += other.payloads_discarded;
        for (reason, count) in &other.rejected {
            *self.rejected.entry(reason.clone()).or_insert(0) += count;
        }
        for (kind, count) in &other.failures {
            *self.failures.entry(kind.clone()).or_insert(0) += count;
        }
        self.latency_stats.merge(&other.latency_stats);
        self.deadline_stats.merge(&other.deadline_stats);
        self.deadlines_flagged += other.deadlines_flagged;
        self.obstacles_resolved += other.obstacles_resolved;
        self.obstacles_omitted += other.obstacles_omitted;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let resolved_total = self.total_fired + self.total_failed + self.total_skipped;
        MetricsSummary {
            total_fired: self.total_fired,
            total_failed: self.total_failed,
            total_skipped: self.total_skipped,
            payloads_discarded: self.payloads_discarded,
            total_rejected: self.rejected.values().sum(),
            success_rate: if resolved_total > 0 {
                self.total_fired as f64 / resolved_total as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
            deadline_ms: StatsSummary::from(&self.deadline_stats),
            deadlines_flagged: self.deadlines_flagged,
            obstacles_resolved: self.obstacles_resolved,
            obstacles_omitted: self.obstacles_omitted,
            failures: self.failures.clone(),
            rejected: self.rejected.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_fired: u64,
    pub total_failed: u64,
    pub total_skipped: u64,
    pub payloads_discarded: u64,
    pub total_rejected: u64,
    pub success_rate: f64,
    pub latency_ms: StatsSummary,
    pub deadline_ms: StatsSummary,
    pub deadlines_flagged: u64,
    pub obstacles_resolved: u64,
    pub obstacles_omitted: u64,
    pub failures: HashMap<String, u64>,
    pub rejected: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Correlation Summary ===")?;
        writeln!(
            f,
            "Timestamps fired: {} ({:.2}%)",
            self.total_fired, self.success_rate
        )?;
        writeln!(f, "Timestamps failed: {}", self.total_failed)?;
        writeln!(f, "Timestamps skipped: {}", self.total_skipped)?;
        writeln!(f, "Payloads discarded: {}", self.payloads_discarded)?;
        writeln!(f, "Messages rejected: {}", self.total_rejected)?;
        writeln!(f, "Correlation latency (ms): {}", self.latency_ms)?;
        writeln!(
            f,
            "Decision deadline (ms): {} (flagged={})",
            self.deadline_ms, self.deadlines_flagged
        )?;
        writeln!(
            f,
            "Obstacles: resolved={}, omitted={}",
            self.obstacles_resolved, self.obstacles_omitted
        )?;

        if !self.failures.is_empty() {
            writeln!(f, "Failures by kind:")?;
            for (kind, count) in &self.failures {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }
        if !self.rejected.is_empty() {
            writeln!(f, "Rejections by reason:")?;
            for (reason, count) in &self.rejected {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 合并另一组统计 (Chan et al. parallel variant)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        self.m2 += other.m2 + delta * delta * (self.count as f64 * other.count as f64) / count as f64;
        self.mean = mean;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_running_stats_merge_matches_sequential() {
        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        let mut all = RunningStats::default();
        for v in [1.0, 2.0, 3.0] {
            left.push(v);
            all.push(v);
        }
        for v in [4.0, 5.0] {
            right.push(v);
            all.push(v);
        }

        left.merge(&right);
        assert_eq!(left.count(), all.count());
        assert!((left.mean() - all.mean()).abs() < 1e-10);
        assert!((left.variance() - all.variance()).abs() < 1e-10);
        assert_eq!(left.max(), 5.0);
    }

    #[test]
    fn test_aggregator_counts_outcomes() {
        let mut aggregator = CorrelationStatsAggregator::new();
        aggregator.record_fired(0.4);
        aggregator.record_fired(0.6);
        aggregator.record_failed("empty_buffer", 2);
        aggregator.record_skipped(1);
        aggregator.record_rejected("out_of_order");
        aggregator.record_geolocation(3, 1);

        let summary = aggregator.summary();
        assert_eq!(summary.total_fired, 2);
        assert_eq!(summary.total_failed, 1);
        assert_eq!(summary.total_skipped, 1);
        assert_eq!(summary.payloads_discarded, 3);
        assert_eq!(summary.total_rejected, 1);
        assert!((summary.success_rate - 50.0).abs() < 1e-10);
        assert_eq!(summary.failures.get("empty_buffer"), Some(&1));
        assert_eq!(summary.obstacles_omitted, 1);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = CorrelationStatsAggregator::new();
        aggregator.record_fired(1.0);
        aggregator.record_deadline(300.0, false);
        aggregator.record_deadline(-50.0, true);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Timestamps fired: 1 (100.00%)"));
        assert!(output.contains("flagged=1"));
    }
}
