// ==========================================
// 产线良率看板系统 - API 层
// ==========================================
// 职责: 提供看板查询接口
// ==========================================

pub mod dashboard_api;
pub mod error;

// 重导出核心类型
pub use dashboard_api::{DashboardApi, LineDayView};
pub use error::{ApiError, ApiResult};
