// ==========================================
// 产线良率看板系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + calamine/csv
// 系统定位: 产线报表 → 失效根因归因 → 良率记录 → 看板聚合
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 重试策略
pub mod retry;

// API 层 - 看板接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    ErrorTable, Metric, OtherFailures, RateLevel, RawFailureTally, ReferenceMapping,
    RootCauseCount, YieldBand, YieldRecord, OTHER_FAILURES_LABEL,
};

// 引擎
pub use engine::{
    BatchReport, LineOutcome, PipelineError, RootCauseMatcher, TimeSlot, YieldBatchRunner,
    YieldRecordBuilder,
};

// 导入
pub use importer::{ImportError, LineReportExtractor, ReferenceMappingLoader};

// 配置
pub use config::{ConfigManager, PipelineConfig};

// 仓储
pub use repository::{RepositoryError, YieldRecordRepository, YieldRecordStore};

// API
pub use api::{DashboardApi, LineDayView};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "产线良率看板系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
