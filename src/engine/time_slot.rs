// ==========================================
// 产线良率看板系统 - 报告时段
// ==========================================
// 职责: 将墙上时间解析为工厂时区下的时段起止
// 规则: 结束时刻不晚于开始时刻 → 时段跨午夜，结束日期 +1 天
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// 解析 "HH:MM:SS" 或 "HH:MM"
pub fn parse_clock(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S").or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
}

/// 本地墙上时间 → 固定时区时间（固定偏移无歧义）
///
/// 超出 chrono 可表示范围时返回 None
fn localize(local: NaiveDateTime, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let utc = local.checked_sub_signed(Duration::seconds(tz.local_minus_utc() as i64))?;
    Some(DateTime::from_naive_utc_and_offset(utc, tz))
}

/// 工厂日的起止 [当日 00:00, 次日 00:00)
///
/// 日期位于可表示范围边缘时返回 None
pub fn day_bounds(
    day: NaiveDate,
    tz: FixedOffset,
) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let start = localize(day.and_time(NaiveTime::default()), tz)?;
    let end = start.checked_add_signed(Duration::days(1))?;
    Some((start, end))
}

// ==========================================
// TimeSlot - 报告时段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub date: NaiveDate, // 开始时刻所在日期
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub label: String, // "HH:MM-HH:MM"
}

impl TimeSlot {
    /// 以指定日期解析时段；日期超出可表示范围时返回 None
    pub fn resolve(date: NaiveDate, start: NaiveTime, end: NaiveTime, tz: FixedOffset) -> Option<Self> {
        let start_dt = localize(date.and_time(start), tz)?;
        let mut end_dt = localize(date.and_time(end), tz)?;
        if end_dt <= start_dt {
            end_dt = end_dt.checked_add_signed(Duration::days(1))?;
        }

        Some(Self {
            date,
            start: start_dt,
            end: end_dt,
            label: format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")),
        })
    }

    /// 以 now 所在的工厂日期（"今天"）解析时段
    pub fn resolve_today(
        now: DateTime<FixedOffset>,
        start: NaiveTime,
        end: NaiveTime,
        tz: FixedOffset,
    ) -> Option<Self> {
        let today = now.with_timezone(&tz).date_naive();
        Self::resolve(today, start, end, tz)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

// ==========================================
// SlotSchedule - 时段划分
// ==========================================
// 每小时一个窗口，窗口在锚定分钟结束（默认 :30），结束后延迟若干分钟再抓取
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotSchedule {
    pub anchor_minute: u32,
    pub length_minutes: i64,
    pub settle_minutes: i64,
}

impl Default for SlotSchedule {
    fn default() -> Self {
        Self {
            anchor_minute: 30,
            length_minutes: 60,
            settle_minutes: 5,
        }
    }
}

impl SlotSchedule {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.anchor_minute >= 60 {
            return Err(ConfigError::invalid("slot.anchor_minute", "必须小于 60"));
        }
        if !(1..=1440).contains(&self.length_minutes) {
            return Err(ConfigError::invalid("slot.length_minutes", "必须在 1..=1440 之间"));
        }
        if self.settle_minutes < 0 {
            return Err(ConfigError::invalid("slot.settle_minutes", "不能为负数"));
        }
        Ok(())
    }

    /// 最近一个已结束的时段
    ///
    /// # 规则
    /// - now 已过本小时锚点（精确到秒）→ 结束于本小时锚点
    /// - 否则结束于上一小时锚点
    /// - 开始 = 结束 - 时段长度
    pub fn window_for(&self, now: DateTime<FixedOffset>) -> Option<TimeSlot> {
        let tz = *now.offset();
        let local = now.naive_local();
        let whole_seconds = local.with_nanosecond(0)?;
        let hour_start = whole_seconds.with_minute(0)?.with_second(0)?;

        let mut end = hour_start.checked_add_signed(Duration::minutes(self.anchor_minute as i64))?;
        if whole_seconds <= end {
            end = end.checked_sub_signed(Duration::hours(1))?;
        }
        let start = end.checked_sub_signed(Duration::minutes(self.length_minutes))?;

        TimeSlot::resolve(start.date(), start.time(), end.time(), tz)
    }

    /// 时段结束后开始处理的时刻
    pub fn execute_at(&self, slot: &TimeSlot) -> DateTime<FixedOffset> {
        slot.end + Duration::minutes(self.settle_minutes)
    }
}
