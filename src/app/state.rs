// ==========================================
// 产线良率看板系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态（数据库连接、配置、仓储、API）
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::DashboardApi;
use crate::config::config_manager::ConfigManager;
use crate::config::pipeline_config::PipelineConfig;
use crate::engine::error::{PipelineError, PipelineResult};
use crate::engine::orchestrator::YieldBatchRunner;
use crate::importer::file_parser::{SheetReader, UniversalSheetReader};
use crate::repository::yield_record_repo::{YieldRecordRepository, YieldRecordStore};
use crate::retry::{RetryError, RetryPolicy};

/// 指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "LINE_YIELD_DB_PATH";

/// 应用状态
///
/// 单个 SQLite 连接由配置管理器与良率仓储共享
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 本次运行生效的批处理配置
    pub config: Arc<PipelineConfig>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 良率记录仓储
    pub yield_repo: Arc<YieldRecordRepository>,

    /// 看板API
    pub dashboard_api: Arc<DashboardApi>,
}

impl AppState {
    /// 打开数据库（不重试）并初始化
    pub fn new(db_path: String) -> PipelineResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);
        let repo = YieldRecordRepository::new(&db_path).map_err(|e| {
            PipelineError::ConnectivityFailure {
                attempts: 1,
                message: e.to_string(),
            }
        })?;
        Self::from_repository(db_path, repo)
    }

    /// 按重试策略打开数据库并初始化
    ///
    /// # 返回
    /// - Err(ConnectivityFailure): 连接重试用尽，本次运行失败
    pub async fn connect(db_path: String, policy: &RetryPolicy) -> PipelineResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);
        let repo = YieldRecordRepository::connect_with_retry(&db_path, policy)
            .await
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, last } => PipelineError::ConnectivityFailure {
                    attempts,
                    message: last.to_string(),
                },
                RetryError::Permanent { source, .. } => {
                    PipelineError::Internal(format!("数据库初始化失败: {}", source))
                }
            })?;
        Self::from_repository(db_path, repo)
    }

    fn from_repository(db_path: String, repo: YieldRecordRepository) -> PipelineResult<Self> {
        let config_manager = ConfigManager::from_connection(repo.connection())?;
        let config = config_manager.effective_pipeline_config()?;

        let yield_repo = Arc::new(repo);
        let store: Arc<dyn YieldRecordStore> = yield_repo.clone();
        let dashboard_api = DashboardApi::from_config(store, &config)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        tracing::info!(lines = config.lines.len(), "AppState 初始化完成");
        Ok(Self {
            db_path,
            config: Arc::new(config),
            config_manager: Arc::new(config_manager),
            yield_repo,
            dashboard_api: Arc::new(dashboard_api),
        })
    }

    /// 以默认读取器（Excel/CSV 自动识别）创建批处理编排器
    pub fn batch_runner(&self) -> PipelineResult<YieldBatchRunner> {
        self.batch_runner_with(Arc::new(UniversalSheetReader))
    }

    pub fn batch_runner_with(&self, reader: Arc<dyn SheetReader>) -> PipelineResult<YieldBatchRunner> {
        let store: Arc<dyn YieldRecordStore> = self.yield_repo.clone();
        YieldBatchRunner::new(self.config.as_ref().clone(), reader, store)
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 LINE_YIELD_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./line_yield.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("line-yield");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("line_yield.db");
        }
    }

    path.to_string_lossy().to_string()
}
