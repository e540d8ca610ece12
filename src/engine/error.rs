// ==========================================
// 产线良率看板系统 - 批处理错误类型
// ==========================================

use crate::config::error::ConfigError;
use crate::importer::error::ImportError;
use thiserror::Error;

/// 批处理错误类型
#[derive(Error, Debug)]
pub enum PipelineError {
    /// 单条产线的导入错误（只影响该产线）
    #[error("产线 {line} 导入失败: {source}")]
    Import {
        line: String,
        #[source]
        source: ImportError,
    },

    /// 写入失败（非瞬时错误或重试用尽）
    #[error("产线 {line} 写入失败 (尝试 {attempts} 次): {message}")]
    PersistenceFailure {
        line: String,
        attempts: u32,
        message: String,
    },

    /// 数据库连接重试用尽，本次运行失败
    #[error("数据库连接失败 (尝试 {attempts} 次): {message}")]
    ConnectivityFailure { attempts: u32, message: String },

    /// 时段无法解析（日期超出可表示范围）
    #[error("时段无效: {0}")]
    InvalidSlot(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// Result 类型别名
pub type PipelineResult<T> = Result<T, PipelineError>;
