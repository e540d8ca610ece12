// ==========================================
// 产线良率看板系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod error_table;
pub mod reference;
pub mod tally;
pub mod types;
pub mod yield_record;

// 重导出核心类型
pub use error_table::{ErrorCell, ErrorTable};
pub use reference::{code_tokens, ReferenceEntry, ReferenceMapping};
pub use tally::RawFailureTally;
pub use types::{Metric, RateLevel, YieldBand, OTHER_FAILURES_LABEL};
pub use yield_record::{OtherFailures, RootCauseCount, YieldRecord};
