// ==========================================
// 产线良率看板系统 - 配置层
// ==========================================
// 职责: 批处理配置的定义、校验与存取
// 存储: config_kv 表 / JSON 文件
// ==========================================

pub mod config_manager;
pub mod error;
pub mod pipeline_config;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager, CONFIG_PATH_ENV};
pub use error::{ConfigError, ConfigResult};
pub use pipeline_config::{
    LineRoute, PipelineConfig, ReferenceLayout, SourceLayout, DEFAULT_LAYOUT,
};
