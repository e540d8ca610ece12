// ==========================================
// 产线良率看板系统 - 配置层错误类型
// ==========================================

use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败 ({path}): {message}")]
    ReadError { path: String, message: String },

    #[error("配置格式错误: {0}")]
    ParseError(String),

    #[error("配置校验失败 ({field}): {message}")]
    ValidationError { field: String, message: String },

    #[error("配置存储访问失败: {0}")]
    StorageError(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<rusqlite::Error> for ConfigError {
    fn from(err: rusqlite::Error) -> Self {
        ConfigError::StorageError(err.to_string())
    }
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
