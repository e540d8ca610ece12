// ==========================================
// 产线良率看板系统 - 时段错误表
// ==========================================
// 职责: 行 = 根因（含 Other Failures），列 = (时段, 指标)
// 约束: 缺失单元格按 0 读取
// ==========================================

use crate::domain::types::{Metric, RateLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单元格：某根因在某时段的计数与失效率
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorCell {
    pub count: u64,
    pub rate: f64,
}

// ==========================================
// ErrorTable - 错误表
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorTable {
    root_causes: Vec<String>,
    time_slots: Vec<String>,
    cells: Vec<Vec<ErrorCell>>, // [row][column]
}

impl ErrorTable {
    /// 以给定的行、列创建全 0 表
    pub fn new(root_causes: Vec<String>, time_slots: Vec<String>) -> Self {
        let cells = vec![vec![ErrorCell::default(); time_slots.len()]; root_causes.len()];
        Self {
            root_causes,
            time_slots,
            cells,
        }
    }

    pub fn root_causes(&self) -> &[String] {
        &self.root_causes
    }

    pub fn time_slots(&self) -> &[String] {
        &self.time_slots
    }

    fn position(&self, root_cause: &str, time_slot: &str) -> Option<(usize, usize)> {
        let row = self.root_causes.iter().position(|rc| rc == root_cause)?;
        let col = self.time_slots.iter().position(|ts| ts == time_slot)?;
        Some((row, col))
    }

    /// 写入单元格；行或列不存在时返回 false
    pub fn set(&mut self, root_cause: &str, time_slot: &str, cell: ErrorCell) -> bool {
        match self.position(root_cause, time_slot) {
            Some((row, col)) => {
                self.cells[row][col] = cell;
                true
            }
            None => false,
        }
    }

    pub fn cell(&self, root_cause: &str, time_slot: &str) -> ErrorCell {
        self.position(root_cause, time_slot)
            .map(|(row, col)| self.cells[row][col])
            .unwrap_or_default()
    }

    pub fn count(&self, root_cause: &str, time_slot: &str) -> u64 {
        self.cell(root_cause, time_slot).count
    }

    pub fn rate(&self, root_cause: &str, time_slot: &str) -> f64 {
        self.cell(root_cause, time_slot).rate
    }

    /// 按指标读取数值（失效率以百分比返回，与展示一致）
    pub fn value(&self, root_cause: &str, time_slot: &str, metric: Metric) -> f64 {
        let cell = self.cell(root_cause, time_slot);
        match metric {
            Metric::FailureCount => cell.count as f64,
            Metric::FailureRate => cell.rate * 100.0,
        }
    }

    pub fn level(&self, root_cause: &str, time_slot: &str) -> RateLevel {
        RateLevel::classify(self.rate(root_cause, time_slot))
    }

    /// 某一行（根因）在各时段的单元格
    pub fn row(&self, root_cause: &str) -> Option<&[ErrorCell]> {
        self.root_causes
            .iter()
            .position(|rc| rc == root_cause)
            .map(|row| self.cells[row].as_slice())
    }

    /// 按时段汇总计数
    pub fn column_totals(&self) -> HashMap<&str, u64> {
        self.time_slots
            .iter()
            .enumerate()
            .map(|(col, ts)| {
                let total = self.cells.iter().map(|row| row[col].count).sum();
                (ts.as_str(), total)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.root_causes.is_empty() || self.time_slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ErrorTable {
        let mut table = ErrorTable::new(
            vec!["Other Failures".to_string(), "Timeout Fault".to_string()],
            vec!["09:30-10:30".to_string(), "10:30-11:30".to_string()],
        );
        table.set("Timeout Fault", "09:30-10:30", ErrorCell { count: 8, rate: 0.08 });
        table.set("Other Failures", "10:30-11:30", ErrorCell { count: 1, rate: 0.005 });
        table
    }

    #[test]
    fn test_missing_cells_read_as_zero() {
        let table = sample_table();
        assert_eq!(table.count("Timeout Fault", "10:30-11:30"), 0);
        assert_eq!(table.rate("Unknown", "09:30-10:30"), 0.0);
        assert_eq!(table.level("Timeout Fault", "10:30-11:30"), RateLevel::Ok);
    }

    #[test]
    fn test_typed_accessors() {
        let table = sample_table();
        assert_eq!(table.value("Timeout Fault", "09:30-10:30", Metric::FailureCount), 8.0);
        assert!((table.value("Timeout Fault", "09:30-10:30", Metric::FailureRate) - 8.0).abs() < 1e-9);
        assert_eq!(table.level("Timeout Fault", "09:30-10:30"), RateLevel::Critical);
        assert_eq!(table.level("Other Failures", "10:30-11:30"), RateLevel::Warn);
    }

    #[test]
    fn test_set_unknown_cell_is_rejected() {
        let mut table = sample_table();
        assert!(!table.set("Nope", "09:30-10:30", ErrorCell::default()));
        assert_eq!(table.column_totals().get("09:30-10:30"), Some(&8));
    }
}
