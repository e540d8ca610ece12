// ==========================================
// 产线良率看板系统 - 良率记录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 只追加，不更新不删除；主键 (line, start_ts)
// 查询: 按产线 + 时间范围，start_time 升序
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::yield_record::{OtherFailures, RootCauseCount, YieldRecord};
use crate::engine::time_slot::day_bounds;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::retry::{RetryError, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

// ==========================================
// YieldRecordStore Trait
// ==========================================
// 用途: 批处理写入 / 看板读取
// 实现者: YieldRecordRepository（使用 rusqlite）
#[async_trait]
pub trait YieldRecordStore: Send + Sync {
    /// 追加一条记录
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): 同一产线同一开始时间已存在
    async fn insert(&self, record: &YieldRecord) -> RepositoryResult<()>;

    /// 查询 start_time ∈ [from, to) 的记录，按 start_time 升序
    async fn find_by_line_and_range(
        &self,
        line: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> RepositoryResult<Vec<YieldRecord>>;
}

const SELECT_COLUMNS: &str = "line, record_date, time_slot, start_time, end_time, input, \
     yield_value, root_causes_json, other_failures_count, other_failures_rate";

/// 数据库行（未解析）
struct YieldRecordRow {
    line: String,
    record_date: String,
    time_slot: String,
    start_time: String,
    end_time: String,
    input: f64,
    yield_value: f64,
    root_causes_json: String,
    other_failures_count: i64,
    other_failures_rate: f64,
}

impl YieldRecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            line: row.get(0)?,
            record_date: row.get(1)?,
            time_slot: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            input: row.get(5)?,
            yield_value: row.get(6)?,
            root_causes_json: row.get(7)?,
            other_failures_count: row.get(8)?,
            other_failures_rate: row.get(9)?,
        })
    }

    fn into_record(self) -> RepositoryResult<YieldRecord> {
        let parse_time = |field: &str, raw: &str| {
            DateTime::parse_from_rfc3339(raw).map_err(|e| RepositoryError::FieldValueError {
                field: field.to_string(),
                message: format!("{} ({})", e, raw),
            })
        };

        let date = NaiveDate::parse_from_str(&self.record_date, "%Y-%m-%d").map_err(|e| {
            RepositoryError::FieldValueError {
                field: "record_date".to_string(),
                message: format!("{} ({})", e, self.record_date),
            }
        })?;
        let root_causes: Vec<RootCauseCount> = serde_json::from_str(&self.root_causes_json)?;
        let other_count = u64::try_from(self.other_failures_count).map_err(|_| {
            RepositoryError::FieldValueError {
                field: "other_failures_count".to_string(),
                message: format!("负数计数: {}", self.other_failures_count),
            }
        })?;

        Ok(YieldRecord {
            start_time: parse_time("start_time", &self.start_time)?,
            end_time: parse_time("end_time", &self.end_time)?,
            line: self.line,
            date,
            time_slot: self.time_slot,
            input: self.input,
            yield_value: self.yield_value,
            root_causes,
            other_failures: OtherFailures {
                count: other_count,
                rate: self.other_failures_rate,
            },
        })
    }
}

// ==========================================
// YieldRecordRepository - 良率记录仓储
// ==========================================
pub struct YieldRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl YieldRecordRepository {
    /// 打开数据库并建表
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例（建表幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 按重试策略打开数据库
    ///
    /// # 返回
    /// - Err(RetryError::Exhausted): 连接类错误重试用尽
    /// - Err(RetryError::Permanent): 非瞬时错误（如表结构错误）
    pub async fn connect_with_retry(
        db_path: &str,
        policy: &RetryPolicy,
    ) -> Result<Self, RetryError<RepositoryError>> {
        let repo = policy
            .run("open_yield_db", || async { Self::new(db_path) })
            .await?;
        info!(db_path, "良率数据库已连接");
        Ok(repo)
    }

    /// 共享底层连接（供配置管理器复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加一条记录
    pub fn insert_record(&self, record: &YieldRecord) -> RepositoryResult<()> {
        let root_causes_json = serde_json::to_string(&record.root_causes)?;
        let other_count = i64::try_from(record.other_failures.count).map_err(|_| {
            RepositoryError::FieldValueError {
                field: "other_failures_count".to_string(),
                message: format!("计数超出范围: {}", record.other_failures.count),
            }
        })?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO yield_record (
                line, start_ts, record_date, time_slot, start_time, end_time,
                input, yield_value, root_causes_json,
                other_failures_count, other_failures_rate, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.line,
                record.start_time.timestamp(),
                record.date.format("%Y-%m-%d").to_string(),
                record.time_slot,
                record.start_time.to_rfc3339(),
                record.end_time.to_rfc3339(),
                record.input,
                record.yield_value,
                root_causes_json,
                other_count,
                record.other_failures.rate,
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!(line = %record.line, time_slot = %record.time_slot, "良率记录已写入");
        Ok(())
    }

    /// 查询 start_time ∈ [from, to) 的记录
    pub fn find_range(
        &self,
        line: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> RepositoryResult<Vec<YieldRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM yield_record WHERE line = ?1 AND start_ts >= ?2 AND start_ts < ?3 \
             ORDER BY start_ts ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![line, from.timestamp(), to.timestamp()], YieldRecordRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(YieldRecordRow::into_record).collect()
    }

    /// 查询某工厂日的全部记录
    pub fn find_by_line_and_day(
        &self,
        line: &str,
        day: NaiveDate,
        tz: FixedOffset,
    ) -> RepositoryResult<Vec<YieldRecord>> {
        let (from, to) = day_bounds(day, tz).ok_or_else(|| RepositoryError::FieldValueError {
            field: "record_date".to_string(),
            message: format!("日期超出可表示范围: {}", day),
        })?;
        self.find_range(line, from, to)
    }

    /// 记录总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM yield_record", [], |row| row.get(0))?;
        Ok(count)
    }

    /// 出现过的产线（按名称排序）
    pub fn list_lines(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT line FROM yield_record ORDER BY line")?;
        let lines = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }
}

#[async_trait]
impl YieldRecordStore for YieldRecordRepository {
    async fn insert(&self, record: &YieldRecord) -> RepositoryResult<()> {
        self.insert_record(record)
    }

    async fn find_by_line_and_range(
        &self,
        line: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> RepositoryResult<Vec<YieldRecord>> {
        self.find_range(line, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::time_slot::{parse_clock, TimeSlot};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn repo() -> YieldRecordRepository {
        let conn = Connection::open_in_memory().unwrap();
        YieldRecordRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    fn record(line: &str, day: u32, start: &str, end: &str) -> YieldRecord {
        let slot = TimeSlot::resolve(
            NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            parse_clock(start).unwrap(),
            parse_clock(end).unwrap(),
            ist(),
        )
        .unwrap();
        YieldRecord {
            line: line.to_string(),
            date: slot.date,
            time_slot: slot.label.clone(),
            start_time: slot.start,
            end_time: slot.end,
            input: 100.0,
            yield_value: 0.9,
            root_causes: vec![RootCauseCount {
                root_cause: "Timeout Fault".to_string(),
                count: 8,
                rate: 0.08,
            }],
            other_failures: OtherFailures { count: 2, rate: 0.02 },
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let repo = repo();
        let original = record("Line 03", 14, "23:30", "00:30");
        repo.insert_record(&original).unwrap();

        let day = repo
            .find_by_line_and_day("Line 03", NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(), ist())
            .unwrap();
        assert_eq!(day, vec![original]);
        assert_eq!(day[0].end_time.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let repo = repo();
        repo.insert_record(&record("Line 03", 14, "09:30", "10:30")).unwrap();
        let err = repo.insert_record(&record("Line 03", 14, "09:30", "10:30")).unwrap_err();

        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_range_is_sorted_and_filtered_by_line() {
        let repo = repo();
        repo.insert_record(&record("Line 03", 14, "10:30", "11:30")).unwrap();
        repo.insert_record(&record("Line 03", 14, "08:30", "09:30")).unwrap();
        repo.insert_record(&record("Line 08", 14, "09:30", "10:30")).unwrap();
        repo.insert_record(&record("Line 03", 15, "00:30", "01:30")).unwrap();

        let day = repo
            .find_by_line_and_day("Line 03", NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(), ist())
            .unwrap();
        let slots: Vec<&str> = day.iter().map(|r| r.time_slot.as_str()).collect();
        assert_eq!(slots, vec!["08:30-09:30", "10:30-11:30"]);
        assert_eq!(repo.list_lines().unwrap(), vec!["Line 03", "Line 08"]);
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up_on_unopenable_path() {
        let policy = RetryPolicy::immediate(3);
        let result =
            YieldRecordRepository::connect_with_retry("/nonexistent-dir/sub/yield.db", &policy).await;

        match result {
            Err(err) => {
                assert!(err.is_exhausted());
                assert_eq!(err.attempts(), 3);
            }
            Ok(_) => panic!("不应能打开不存在目录下的数据库"),
        }
    }
}
