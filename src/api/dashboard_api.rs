// ==========================================
// 产线良率看板系统 - 看板 API
// ==========================================
// 职责: 按 (产线, 工厂日) 读取良率记录并聚合为看板视图
// 架构: API 层 → YieldRecordStore（查询） + engine::aggregation（聚合）
// ==========================================

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::config::pipeline_config::PipelineConfig;
use crate::domain::error_table::ErrorTable;
use crate::domain::types::{RateLevel, YieldBand};
use crate::domain::yield_record::YieldRecord;
use crate::engine::aggregation::{self, DailyPoint, HourlyPoint, IssueCount};
use crate::engine::time_slot::day_bounds;
use crate::repository::yield_record_repo::YieldRecordStore;

/// 看板 Top 问题条数
pub const TOP_ISSUE_LIMIT: usize = 3;
/// 日视图附带的日趋势天数（含当日）
pub const DAY_VIEW_TREND_DAYS: i64 = 7;
/// 日趋势查询最大跨度（天）
pub const MAX_TREND_SPAN_DAYS: i64 = 366;

// ==========================================
// LineDayView - 单产线单日视图
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct LineDayView {
    pub line: String,
    pub date: NaiveDate,
    pub latest: YieldRecord,
    pub overall_yield_percent: f64,
    pub overall_band: YieldBand,
    pub total_input: f64,
    pub total_failures: u64,
    pub day_rate_level: RateLevel,
    pub top_issues: Vec<IssueCount>,
    pub error_table: ErrorTable,
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

// ==========================================
// DashboardApi - 看板 API
// ==========================================
pub struct DashboardApi {
    store: Arc<dyn YieldRecordStore>,
    lines: Vec<String>,
    tz: FixedOffset,
}

impl DashboardApi {
    pub fn new(store: Arc<dyn YieldRecordStore>, lines: Vec<String>, tz: FixedOffset) -> Self {
        Self { store, lines, tz }
    }

    /// 由批处理配置创建（产线列表与时区取自配置）
    pub fn from_config(store: Arc<dyn YieldRecordStore>, config: &PipelineConfig) -> ApiResult<Self> {
        let tz = config.timezone()?;
        Ok(Self::new(store, config.line_names(), tz))
    }

    /// 已配置的产线
    pub fn list_lines(&self) -> Vec<String> {
        self.lines.clone()
    }

    fn validate_line(line: &str) -> ApiResult<&str> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ApiError::InvalidInput("产线名称不能为空".to_string()));
        }
        Ok(line)
    }

    fn bounds_of(
        day: NaiveDate,
        tz: FixedOffset,
    ) -> ApiResult<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        day_bounds(day, tz)
            .ok_or_else(|| ApiError::InvalidInput(format!("日期超出可查询范围: {}", day)))
    }

    async fn records_between(
        &self,
        line: &str,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> ApiResult<Vec<YieldRecord>> {
        let (from, _) = Self::bounds_of(first_day, self.tz)?;
        let (_, to) = Self::bounds_of(last_day, self.tz)?;
        let records = self.store.find_by_line_and_range(line, from, to).await?;
        debug!(line, %first_day, %last_day, count = records.len(), "良率记录查询完成");
        Ok(records)
    }

    /// 单产线单日视图
    ///
    /// # 返回
    /// - Err(InvalidInput): 产线名为空，或日期超出可查询范围
    /// - Err(NotFound): 当日无记录
    #[instrument(skip(self))]
    pub async fn get_line_day_view(&self, line: &str, date: NaiveDate) -> ApiResult<LineDayView> {
        let line = Self::validate_line(line)?;
        let trend_start = date
            .checked_sub_signed(Duration::days(DAY_VIEW_TREND_DAYS - 1))
            .ok_or_else(|| ApiError::InvalidInput(format!("日期超出可查询范围: {}", date)))?;

        let records = self.records_between(line, date, date).await?;
        let latest = aggregation::latest(&records)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("{} 在 {} 无良率记录", line, date)))?;
        let overall_yield_percent = aggregation::overall_yield(&records).unwrap_or(1.0) * 100.0;

        let trend_records = self.records_between(line, trend_start, date).await?;

        Ok(LineDayView {
            line: line.to_string(),
            date,
            latest,
            overall_yield_percent,
            overall_band: YieldBand::from_percent(overall_yield_percent),
            total_input: aggregation::total_input(&records),
            total_failures: aggregation::total_failures(&records),
            day_rate_level: aggregation::day_rate_level(&records),
            top_issues: aggregation::top_issues(&records, TOP_ISSUE_LIMIT),
            error_table: aggregation::build_error_table(&records),
            hourly: aggregation::hourly_trend(&records),
            daily: aggregation::daily_trend(&trend_records),
        })
    }

    /// 多日趋势（含首尾两天）
    #[instrument(skip(self))]
    pub async fn get_daily_trend(
        &self,
        line: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ApiResult<Vec<DailyPoint>> {
        let line = Self::validate_line(line)?;
        if date_from > date_to {
            return Err(ApiError::InvalidInput(format!(
                "起始日期 {} 晚于结束日期 {}",
                date_from, date_to
            )));
        }
        if (date_to - date_from).num_days() >= MAX_TREND_SPAN_DAYS {
            return Err(ApiError::InvalidInput(format!(
                "查询跨度不能超过 {} 天",
                MAX_TREND_SPAN_DAYS
            )));
        }

        let records = self.records_between(line, date_from, date_to).await?;
        Ok(aggregation::daily_trend(&records))
    }
}
