// ==========================================
// 产线良率看板系统 - 看板聚合引擎
// ==========================================
// 职责: 对单条产线一组良率记录做汇总与重排
// 输入: YieldRecord 序列（一天或多天）
// 输出: 最新时段、整体良率、Top 问题、错误表、小时/日趋势
// 说明: 整体良率为各时段良率的算术平均（不按投入加权）
// ==========================================

use crate::domain::error_table::{ErrorCell, ErrorTable};
use crate::domain::types::{RateLevel, YieldBand, OTHER_FAILURES_LABEL};
use crate::domain::yield_record::YieldRecord;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

fn failure_rate(failures: u64, input: f64) -> f64 {
    if input > 0.0 {
        failures as f64 / input
    } else {
        0.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// 按 start_time 升序排列的引用
fn sorted_by_start(records: &[YieldRecord]) -> Vec<&YieldRecord> {
    let mut sorted: Vec<&YieldRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.start_time);
    sorted
}

// ==========================================
// 基础汇总
// ==========================================

/// start_time 最大的记录
pub fn latest(records: &[YieldRecord]) -> Option<&YieldRecord> {
    records.iter().max_by_key(|r| r.start_time)
}

/// 各记录 yield 的算术平均；空集合为 None
pub fn overall_yield(records: &[YieldRecord]) -> Option<f64> {
    mean(records.iter().map(|r| r.yield_value))
}

pub fn total_input(records: &[YieldRecord]) -> f64 {
    records.iter().map(|r| r.input).sum()
}

pub fn total_failures(records: &[YieldRecord]) -> u64 {
    records.iter().map(YieldRecord::total_failures).sum()
}

/// 单个时段的失效率等级
pub fn slot_rate_level(record: &YieldRecord) -> RateLevel {
    RateLevel::classify(failure_rate(record.total_failures(), record.input))
}

/// 全天失效率等级（失效总数 / 投入总数）
pub fn day_rate_level(records: &[YieldRecord]) -> RateLevel {
    RateLevel::classify(failure_rate(total_failures(records), total_input(records)))
}

// ==========================================
// Top 问题
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCount {
    pub root_cause: String,
    pub count: u64,
}

/// Top-k 根因
///
/// # 规则
/// - 按记录顺序、记录内根因顺序累加，每条记录最后累加 Other Failures
/// - 计数为 0 的条目不参与排名，Other Failures 为 0 时同样不出现在结果中
///   （看板只列出实际发生的问题，结果可能少于 k 条）
/// - 按计数降序；计数相同保持首次出现顺序（稳定排序）
pub fn top_issues(records: &[YieldRecord], k: usize) -> Vec<IssueCount> {
    let mut issues: Vec<IssueCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    let mut accumulate = |label: &str, count: u64| {
        let pos = *positions.entry(label.to_string()).or_insert_with(|| {
            issues.push(IssueCount {
                root_cause: label.to_string(),
                count: 0,
            });
            issues.len() - 1
        });
        issues[pos].count += count;
    };

    for record in records {
        for rc in &record.root_causes {
            accumulate(&rc.root_cause, rc.count);
        }
        accumulate(OTHER_FAILURES_LABEL, record.other_failures.count);
    }

    issues.retain(|issue| issue.count > 0);
    issues.sort_by(|a, b| b.count.cmp(&a.count));
    issues.truncate(k);
    issues
}

// ==========================================
// 错误表
// ==========================================

/// 构建时段错误表
///
/// # 规则
/// - 行: 全部根因按字母序，最后一行为 Other Failures
/// - 参考表中名为 "Other Failures" 的根因并入最后一行（计数与失效率相加）
/// - 列: 时段按 start_time 升序（同名时段只保留一列）
pub fn build_error_table(records: &[YieldRecord]) -> ErrorTable {
    let sorted = sorted_by_start(records);

    let causes: BTreeSet<&str> = sorted
        .iter()
        .flat_map(|r| r.root_causes.iter().map(|rc| rc.root_cause.as_str()))
        .filter(|label| *label != OTHER_FAILURES_LABEL)
        .collect();
    let mut rows: Vec<String> = causes.into_iter().map(str::to_string).collect();
    rows.push(OTHER_FAILURES_LABEL.to_string());

    let mut columns: Vec<String> = Vec::new();
    for record in &sorted {
        if !columns.contains(&record.time_slot) {
            columns.push(record.time_slot.clone());
        }
    }

    let mut table = ErrorTable::new(rows, columns);
    for record in &sorted {
        let mut other = ErrorCell {
            count: record.other_failures.count,
            rate: record.other_failures.rate,
        };
        for rc in &record.root_causes {
            if rc.root_cause == OTHER_FAILURES_LABEL {
                other.count += rc.count;
                other.rate += rc.rate;
                continue;
            }
            table.set(
                &rc.root_cause,
                &record.time_slot,
                ErrorCell {
                    count: rc.count,
                    rate: rc.rate,
                },
            );
        }
        table.set(OTHER_FAILURES_LABEL, &record.time_slot, other);
    }
    table
}

// ==========================================
// 趋势
// ==========================================

/// 小时趋势点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub time_slot: String,
    pub start_time: DateTime<FixedOffset>,
    pub yield_percent: f64,
    pub input: f64,
    pub failures: u64,
    pub band: YieldBand,
    pub rate_level: RateLevel,
}

/// 日趋势点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub yield_percent: f64, // 当日各时段良率均值
    pub input: f64,
    pub failures: u64,
    pub slots: usize,
    pub band: YieldBand,
    pub rate_level: RateLevel,
}

pub fn hourly_trend(records: &[YieldRecord]) -> Vec<HourlyPoint> {
    sorted_by_start(records)
        .into_iter()
        .map(|record| {
            let yield_percent = record.yield_percent();
            HourlyPoint {
                time_slot: record.time_slot.clone(),
                start_time: record.start_time,
                yield_percent,
                input: record.input,
                failures: record.total_failures(),
                band: YieldBand::from_percent(yield_percent),
                rate_level: slot_rate_level(record),
            }
        })
        .collect()
}

/// 按记录日期分组（首次出现顺序）
pub fn daily_trend(records: &[YieldRecord]) -> Vec<DailyPoint> {
    let mut groups: Vec<(NaiveDate, Vec<&YieldRecord>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(date, _)| *date == record.date) {
            Some((_, group)) => group.push(record),
            None => groups.push((record.date, vec![record])),
        }
    }

    groups
        .into_iter()
        .map(|(date, group)| {
            let yield_percent = mean(group.iter().map(|r| r.yield_percent())).unwrap_or(100.0);
            let input: f64 = group.iter().map(|r| r.input).sum();
            let failures: u64 = group.iter().map(|r| r.total_failures()).sum();
            DailyPoint {
                date,
                yield_percent,
                input,
                failures,
                slots: group.len(),
                band: YieldBand::from_percent(yield_percent),
                rate_level: RateLevel::classify(failure_rate(failures, input)),
            }
        })
        .collect()
}
