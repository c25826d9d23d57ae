//! Sink 投递指标模块
//!
//! 通过 `metrics` facade 上报投递结果，并在内存中聚合单次运行的统计。

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// 记录一次投递结果
///
/// `outcome` 取值: `delivered` / `outside_window` / `unsupported` / `failure`
pub fn record_delivery(sink_name: &str, outcome: &str) {
    counter!(
        "record_sink_deliveries_total",
        "sink" => sink_name.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录单次写入耗时
pub fn record_delivery_latency_ms(sink_name: &str, latency_ms: f64) {
    histogram!(
        "record_sink_delivery_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

/// 记录 sink 队列深度
pub fn record_queue_depth(sink_name: &str, depth: usize) {
    gauge!(
        "record_sink_queue_depth",
        "sink" => sink_name.to_string()
    )
    .set(depth as f64);
}

/// 记录因队列满而丢弃的记录
pub fn record_dropped(sink_name: &str) {
    counter!(
        "record_sink_dropped_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 投递统计聚合器
///
/// 在内存中按结果计数并统计耗时，用于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryStats {
    /// 各结果计数
    outcomes: BTreeMap<String, u64>,
    /// 耗时统计 (毫秒)
    latency: RunningStats,
}

impl DeliveryStats {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次结果及其耗时
    pub fn record(&mut self, outcome: &str, latency_ms: f64) {
        *self.outcomes.entry(outcome.to_string()).or_insert(0) += 1;
        self.latency.push(latency_ms);
    }

    /// 某个结果的计数
    pub fn count(&self, outcome: &str) -> u64 {
        self.outcomes.get(outcome).copied().unwrap_or(0)
    }

    /// 总次数
    pub fn total(&self) -> u64 {
        self.latency.count()
    }

    /// 生成摘要
    pub fn summary(&self) -> DeliverySummary {
        DeliverySummary {
            total: self.total(),
            outcomes: self.outcomes.clone(),
            latency_ms: StatsSummary::from(&self.latency),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 投递摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total: u64,
    pub outcomes: BTreeMap<String, u64>,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Total: {}", self.total)?;
        for (outcome, count) in &self.outcomes {
            writeln!(f, "  {}: {}", outcome, count)?;
        }
        writeln!(f, "Latency (ms): {}", self.latency_ms)
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

    /// 样本方差
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
