// ==========================================
// 产线良率看板系统 - 良率记录领域模型
// ==========================================
// 职责: 单条产线单个时段的良率与根因统计
// 约束: 记录创建后不可变；按 (line, start_time) 追加持久化
// ==========================================

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

// ==========================================
// RootCauseCount - 根因计数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseCount {
    pub root_cause: String,
    pub count: u64,
    pub rate: f64, // count / input，input 为 0 时为 0
}

// ==========================================
// OtherFailures - 未匹配失效汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherFailures {
    pub count: u64,
    pub rate: f64,
}

// ==========================================
// YieldRecord - 良率记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldRecord {
    pub line: String,                   // 产线名称，如 "Line 01"
    pub date: NaiveDate,                // 时段起始日期（工厂时区）
    pub time_slot: String,              // "HH:MM-HH:MM"
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>, // 跨午夜时为次日

    // ===== 统计值 =====
    pub input: f64, // 投入数（测试数）
    #[serde(rename = "yield")]
    pub yield_value: f64, // 1 - 失效总数/投入数；投入为 0 时为 1，不做截断

    // ===== 根因分布 =====
    pub root_causes: Vec<RootCauseCount>, // 按首次归因顺序
    pub other_failures: OtherFailures,
}

impl YieldRecord {
    /// 失效总数 = 各根因计数 + 未匹配计数
    pub fn total_failures(&self) -> u64 {
        self.root_causes.iter().map(|rc| rc.count).sum::<u64>() + self.other_failures.count
    }

    /// 良率百分比（0..=100，未截断）
    pub fn yield_percent(&self) -> f64 {
        self.yield_value * 100.0
    }

    pub fn root_cause(&self, label: &str) -> Option<&RootCauseCount> {
        self.root_causes.iter().find(|rc| rc.root_cause == label)
    }
}
