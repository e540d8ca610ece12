// ==========================================
// 产线良率看板系统 - 领域类型定义
// ==========================================
// 职责: 失效率分级、良率分档、错误表指标等枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 未匹配失效代码在展示层的统一名称
pub const OTHER_FAILURES_LABEL: &str = "Other Failures";

// ==========================================
// 失效率等级 (Rate Level)
// ==========================================
// 阈值按投入数的百分比: 0 → ok, (0, 1%] → warn, > 1% → critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLevel {
    Ok,       // 无失效
    Warn,     // 轻微
    Critical, // 严重
}

impl RateLevel {
    /// 告警阈值（百分比）
    pub const WARN_LIMIT_PCT: f64 = 1.0;

    /// 按失效率（0..=1 的小数）分级
    pub fn classify(rate: f64) -> Self {
        let pct = rate * 100.0;
        if pct <= 0.0 {
            RateLevel::Ok
        } else if pct <= Self::WARN_LIMIT_PCT {
            RateLevel::Warn
        } else {
            RateLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateLevel::Ok => "ok",
            RateLevel::Warn => "warn",
            RateLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 良率分档 (Yield Band)
// ==========================================
// 仪表盘/柱状图着色: ≤95% 红, ≤98% 橙, 其余绿
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YieldBand {
    Low,
    Medium,
    High,
}

impl YieldBand {
    /// 按良率百分比（0..=100）分档
    pub fn from_percent(yield_pct: f64) -> Self {
        if yield_pct <= 95.0 {
            YieldBand::Low
        } else if yield_pct <= 98.0 {
            YieldBand::Medium
        } else {
            YieldBand::High
        }
    }
}

impl fmt::Display for YieldBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YieldBand::Low => write!(f, "LOW"),
            YieldBand::Medium => write!(f, "MEDIUM"),
            YieldBand::High => write!(f, "HIGH"),
        }
    }
}

// ==========================================
// 错误表指标列 (Metric)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Metric {
    FailureCount,
    FailureRate,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::FailureCount => write!(f, "Failure Count"),
            Metric::FailureRate => write!(f, "Failure Rate (%)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_level_thresholds() {
        assert_eq!(RateLevel::classify(0.0), RateLevel::Ok);
        assert_eq!(RateLevel::classify(0.005), RateLevel::Warn);
        assert_eq!(RateLevel::classify(0.01), RateLevel::Warn);
        assert_eq!(RateLevel::classify(0.0101), RateLevel::Critical);
    }

    #[test]
    fn test_yield_band_boundaries() {
        assert_eq!(YieldBand::from_percent(95.0), YieldBand::Low);
        assert_eq!(YieldBand::from_percent(97.5), YieldBand::Medium);
        assert_eq!(YieldBand::from_percent(98.0), YieldBand::Medium);
        assert_eq!(YieldBand::from_percent(99.2), YieldBand::High);
    }

    #[test]
    fn test_rate_level_serde() {
        let json = serde_json::to_string(&RateLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
