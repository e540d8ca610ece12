// ==========================================
// 产线良率看板系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 连接失败/数据库忙/锁失败属于瞬时错误，可按重试策略重试
// ==========================================

use crate::retry::Transient;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 瞬时错误 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库忙: {0}")]
    DatabaseBusy(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    // ===== 数据库错误 =====
    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    // ===== 数据质量错误 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    #[error("序列化失败: {0}")]
    SerializationError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Transient for RepositoryError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            RepositoryError::DatabaseConnectionError(_)
                | RepositoryError::DatabaseBusy(_)
                | RepositoryError::LockError(_)
        )
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err {
            rusqlite::Error::SqliteFailure(ref code, ref msg) => {
                let message = msg.clone().unwrap_or_else(|| err.to_string());
                match code.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        RepositoryError::DatabaseBusy(message)
                    }
                    ErrorCode::CannotOpen | ErrorCode::NotADatabase => {
                        RepositoryError::DatabaseConnectionError(message)
                    }
                    ErrorCode::ConstraintViolation if message.contains("UNIQUE") => {
                        RepositoryError::UniqueConstraintViolation(message)
                    }
                    _ => RepositoryError::DatabaseQueryError(message),
                }
            }
            rusqlite::Error::FromSqlConversionFailure(_, _, _)
            | rusqlite::Error::InvalidColumnType(_, _, _) => {
                RepositoryError::FieldValueError {
                    field: "unknown".to_string(),
                    message: err.to_string(),
                }
            }
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::SerializationError(err.to_string())
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
