// ==========================================
// 产线良率看板系统 - 引擎层
// ==========================================
// 职责: 时段解析、根因匹配、良率构建、批处理编排、看板聚合
// 红线: Engine 不拼 SQL；匹配与构建为纯函数
// ==========================================

pub mod aggregation;
pub mod error;
pub mod orchestrator;
pub mod root_cause_matcher;
pub mod time_slot;
pub mod yield_builder;

// 重导出核心引擎
pub use aggregation::{DailyPoint, HourlyPoint, IssueCount};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{BatchReport, LineOutcome, YieldBatchRunner};
pub use root_cause_matcher::{MatchKind, RootCauseMatch, RootCauseMatcher};
pub use time_slot::{day_bounds, parse_clock, SlotSchedule, TimeSlot};
pub use yield_builder::YieldRecordBuilder;
