// ==========================================
// 产线良率看板系统 - 配置管理器
// ==========================================
// 职责: 批处理配置的存取（config_kv 表，JSON 值）
// 优先级: 环境变量 LINE_YIELD_CONFIG 指向的文件 > config_kv > 内置默认值
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::pipeline_config::PipelineConfig;
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// 指向 JSON 配置文件的环境变量
pub const CONFIG_PATH_ENV: &str = "LINE_YIELD_CONFIG";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA 并建表（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ConfigError::StorageError(format!("锁获取失败: {}", e)))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::StorageError(format!("锁获取失败: {}", e)))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取 global scope 全部配置（key 有序）
    pub fn get_config_snapshot(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    // ===== 批处理配置 =====

    /// 读取已保存的批处理配置；未保存时返回默认值
    pub fn get_pipeline_config(&self) -> ConfigResult<PipelineConfig> {
        match self.get_global_config_value(config_keys::PIPELINE_CONFIG)? {
            Some(raw) => PipelineConfig::from_json_str(&raw),
            None => {
                debug!("config_kv 中无批处理配置，使用默认值");
                Ok(PipelineConfig::default())
            }
        }
    }

    /// 校验并保存批处理配置
    pub fn save_pipeline_config(&self, config: &PipelineConfig) -> ConfigResult<()> {
        config.validate()?;
        let raw = config.to_json()?;
        self.set_global_config_value(config_keys::PIPELINE_CONFIG, &raw)?;
        info!(lines = config.lines.len(), "批处理配置已保存");
        Ok(())
    }

    /// 本次运行生效的配置（环境变量指定的文件优先）
    pub fn effective_pipeline_config(&self) -> ConfigResult<PipelineConfig> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = path.trim();
            if !path.is_empty() {
                info!(config_path = path, "使用环境变量指定的配置文件");
                return PipelineConfig::from_json_file(path);
            }
        }
        self.get_pipeline_config()
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    /// 批处理配置（PipelineConfig JSON）
    pub const PIPELINE_CONFIG: &str = "pipeline_config";
}
