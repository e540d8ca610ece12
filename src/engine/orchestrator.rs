// ==========================================
// 产线良率看板系统 - 批处理编排器
// ==========================================
// 用途: 协调一个时段内全部产线的 抽取 → 归因 → 构建 → 写入
// 并发: 各产线的读取与构建在阻塞线程池中并行；写入按产线顺序串行并带重试
// 红线: 单条产线失败只跳过该产线，不中断批次；不写入不完整的记录
// ==========================================

use crate::config::pipeline_config::{LineRoute, PipelineConfig};
use crate::domain::yield_record::YieldRecord;
use crate::engine::error::{PipelineError, PipelineResult};
use crate::engine::time_slot::TimeSlot;
use crate::engine::yield_builder::YieldRecordBuilder;
use crate::importer::error::ImportError;
use crate::importer::file_parser::SheetReader;
use crate::importer::line_report_extractor::LineReportExtractor;
use crate::importer::reference_loader::ReferenceMappingLoader;
use crate::repository::yield_record_repo::YieldRecordStore;
use crate::retry::RetryError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// LineOutcome - 单条产线结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LineOutcome {
    /// 记录已写入
    Persisted { line: String, record: YieldRecord },
    /// 读取/映射/构建阶段被跳过
    Skipped {
        line: String,
        reason: String,
        warning: bool, // 告警级（如报表中无失效代码）
    },
    /// 写入失败
    PersistFailed {
        line: String,
        reason: String,
        attempts: u32,
        connectivity: bool, // 瞬时错误重试用尽
    },
}

impl LineOutcome {
    pub fn line(&self) -> &str {
        match self {
            LineOutcome::Persisted { line, .. }
            | LineOutcome::Skipped { line, .. }
            | LineOutcome::PersistFailed { line, .. } => line,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, LineOutcome::Persisted { .. })
    }

    fn skipped(line: &str, err: &PipelineError) -> Self {
        let warning = matches!(
            err,
            PipelineError::Import { source, .. } if source.is_warning()
        );
        LineOutcome::Skipped {
            line: line.to_string(),
            reason: err.to_string(),
            warning,
        }
    }
}

// ==========================================
// BatchReport - 批次结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub time_slot: String,
    pub slot_start: DateTime<FixedOffset>,
    pub slot_end: DateTime<FixedOffset>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<LineOutcome>,
}

impl BatchReport {
    pub fn persisted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_persisted()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, LineOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, LineOutcome::PersistFailed { .. }))
            .count()
    }

    pub fn outcome(&self, line: &str) -> Option<&LineOutcome> {
        self.outcomes.iter().find(|o| o.line() == line)
    }

    /// 存在连接类写入失败（重试用尽）时本次运行视为失败
    pub fn is_fatal(&self) -> bool {
        self.fatal_error().is_some()
    }

    pub fn fatal_error(&self) -> Option<PipelineError> {
        self.outcomes.iter().find_map(|o| match o {
            LineOutcome::PersistFailed {
                reason,
                attempts,
                connectivity: true,
                ..
            } => Some(PipelineError::ConnectivityFailure {
                attempts: *attempts,
                message: reason.clone(),
            }),
            _ => None,
        })
    }
}

// ==========================================
// YieldBatchRunner - 批处理编排器
// ==========================================
pub struct YieldBatchRunner {
    config: Arc<PipelineConfig>,
    tz: FixedOffset,
    loader: Arc<ReferenceMappingLoader>,
    extractor: Arc<LineReportExtractor>,
    builder: YieldRecordBuilder,
    store: Arc<dyn YieldRecordStore>,
}

impl YieldBatchRunner {
    /// 创建编排器（配置在此校验）
    pub fn new(
        config: PipelineConfig,
        reader: Arc<dyn SheetReader>,
        store: Arc<dyn YieldRecordStore>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let tz = config.timezone()?;
        let loader = ReferenceMappingLoader::new(Arc::clone(&reader), config.reference_layout.clone());

        Ok(Self {
            config: Arc::new(config),
            tz,
            loader: Arc::new(loader),
            extractor: Arc::new(LineReportExtractor::new(reader)),
            builder: YieldRecordBuilder::new(),
            store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    /// now 之前最近一个已结束的时段
    pub fn latest_slot(&self, now: DateTime<Utc>) -> Option<TimeSlot> {
        self.config.slot.window_for(now.with_timezone(&self.tz))
    }

    /// 处理指定日期、起止时刻的时段
    ///
    /// # 返回
    /// - Err(InvalidSlot): 日期超出可表示范围
    pub async fn run_slot(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> PipelineResult<BatchReport> {
        let slot = TimeSlot::resolve(date, start, end, self.tz).ok_or_else(|| {
            PipelineError::InvalidSlot(format!(
                "{} {}-{}",
                date,
                start.format("%H:%M"),
                end.format("%H:%M")
            ))
        })?;
        Ok(self.run(slot).await)
    }

    /// 处理一个时段内的全部产线
    #[instrument(skip(self, slot), fields(time_slot = %slot.label, date = %slot.date))]
    pub async fn run(&self, slot: TimeSlot) -> BatchReport {
        let batch_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(batch_id = %batch_id, lines = self.config.lines.len(), "批次开始");

        // 1. 并行读取 + 构建
        let tasks = self.config.lines.iter().cloned().map(|route| {
            let config = Arc::clone(&self.config);
            let loader = Arc::clone(&self.loader);
            let extractor = Arc::clone(&self.extractor);
            let builder = self.builder.clone();
            let slot = slot.clone();
            let line = route.line.clone();

            let handle = tokio::task::spawn_blocking(move || {
                prepare_line(&config, &route, &loader, &extractor, &builder, &slot)
            });
            async move { (line, handle.await) }
        });
        let prepared = join_all(tasks).await;

        // 2. 按产线顺序写入
        let mut outcomes = Vec::with_capacity(prepared.len());
        for (line, joined) in prepared {
            let outcome = match joined {
                Ok(Ok(record)) => self.persist(record).await,
                Ok(Err(err)) => {
                    if matches!(&err, PipelineError::Import { source, .. } if source.is_warning()) {
                        warn!(line = %line, error = %err, "产线已跳过");
                    } else {
                        error!(line = %line, error = %err, "产线已跳过");
                    }
                    LineOutcome::skipped(&line, &err)
                }
                Err(join_err) => {
                    let err = PipelineError::Internal(format!("产线任务异常终止: {}", join_err));
                    error!(line = %line, error = %err, "产线已跳过");
                    LineOutcome::skipped(&line, &err)
                }
            };
            outcomes.push(outcome);
        }

        let report = BatchReport {
            batch_id,
            time_slot: slot.label.clone(),
            slot_start: slot.start,
            slot_end: slot.end,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        info!(
            batch_id = %report.batch_id,
            persisted = report.persisted_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "批次结束"
        );
        if let Some(err) = report.fatal_error() {
            error!(batch_id = %report.batch_id, error = %err, "本次运行失败，等待下一周期");
        }
        report
    }

    async fn persist(&self, record: YieldRecord) -> LineOutcome {
        let store = Arc::clone(&self.store);
        let result = self
            .config
            .retry
            .run("persist_yield_record", || store.insert(&record))
            .await;

        match result {
            Ok(()) => {
                info!(
                    line = %record.line,
                    time_slot = %record.time_slot,
                    yield_value = record.yield_value,
                    "良率记录已写入"
                );
                LineOutcome::Persisted {
                    line: record.line.clone(),
                    record,
                }
            }
            Err(retry_err) => {
                let attempts = retry_err.attempts();
                let connectivity = matches!(retry_err, RetryError::Exhausted { .. });
                let err = PipelineError::PersistenceFailure {
                    line: record.line.clone(),
                    attempts,
                    message: retry_err.into_inner().to_string(),
                };
                error!(line = %record.line, error = %err, "良率记录写入失败");
                LineOutcome::PersistFailed {
                    line: record.line.clone(),
                    reason: err.to_string(),
                    attempts,
                    connectivity,
                }
            }
        }
    }
}

/// 单条产线: 映射 → 抽取 → 构建（阻塞）
fn prepare_line(
    config: &PipelineConfig,
    route: &LineRoute,
    loader: &ReferenceMappingLoader,
    extractor: &LineReportExtractor,
    builder: &YieldRecordBuilder,
    slot: &TimeSlot,
) -> PipelineResult<YieldRecord> {
    let import_err = |source: ImportError| PipelineError::Import {
        line: route.line.clone(),
        source,
    };

    let layout = config.layout_for(route).ok_or_else(|| {
        PipelineError::Internal(format!("未定义的版式: {}", route.layout))
    })?;

    // 无可用映射时不读取报表
    let reference_path = config.reference_path(route);
    let mapping = loader.load(&reference_path, route.reference_sheet());
    if mapping.is_empty() {
        return Err(import_err(ImportError::NoMappingAvailable {
            line: route.line.clone(),
            reference: format!("{}#{}", reference_path.display(), route.reference_sheet()),
        }));
    }

    let input_path = config.input_path(route);
    let report = extractor.extract(&input_path, layout).map_err(import_err)?;

    if let Some(warning) = report.no_codes_warning(&input_path) {
        if config.skip_lines_without_codes {
            return Err(import_err(warning));
        }
        warn!(line = %route.line, "报表中无失效代码，按零失效构建记录");
    }

    Ok(builder.build(&route.line, slot, &report.tally, report.input, &mapping))
}
