// ==========================================
// 产线良率看板系统 - 批处理配置
// ==========================================
// 职责: 报表版式、参考表版式、产线路由、时区、重试、时段
// 约束: 加载后立即校验（validate），运行期不再修改
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::engine::time_slot::SlotSchedule;
use crate::importer::sheet::{column_index, CellRef};
use crate::retry::RetryPolicy;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// 默认报表版式名（NTF Pareto 拆分报表）
pub const DEFAULT_LAYOUT: &str = "ntf_pareto";

// ==========================================
// SourceLayout - 产线报表版式
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLayout {
    pub sheet_name: String,   // 汇总工作表
    pub header_label: String, // 失效代码列表头
    pub header_column: String,
    pub data_column: String,
    pub input_cell: String, // 投入数单元格
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            sheet_name: "Total".to_string(),
            header_label: "2nd Testcode".to_string(),
            header_column: "U".to_string(),
            data_column: "U".to_string(),
            input_cell: "V8".to_string(),
        }
    }
}

impl SourceLayout {
    fn validate(&self, name: &str) -> ConfigResult<()> {
        let field = |f: &str| format!("layouts.{}.{}", name, f);

        if self.sheet_name.trim().is_empty() {
            return Err(ConfigError::invalid(field("sheet_name"), "工作表名不能为空"));
        }
        if self.header_label.trim().is_empty() {
            return Err(ConfigError::invalid(field("header_label"), "表头不能为空"));
        }
        column_index(&self.header_column)
            .map_err(|e| ConfigError::invalid(field("header_column"), e.to_string()))?;
        column_index(&self.data_column)
            .map_err(|e| ConfigError::invalid(field("data_column"), e.to_string()))?;
        CellRef::parse(&self.input_cell)
            .map_err(|e| ConfigError::invalid(field("input_cell"), e.to_string()))?;
        Ok(())
    }
}

// ==========================================
// ReferenceLayout - 参考表版式
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceLayout {
    pub code_column: String,
    pub root_cause_column: String,
    pub header_rows: usize, // 跳过的表头行数
}

impl Default for ReferenceLayout {
    fn default() -> Self {
        Self {
            code_column: "A".to_string(),
            root_cause_column: "B".to_string(),
            header_rows: 1,
        }
    }
}

// ==========================================
// LineRoute - 产线路由
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRoute {
    pub line: String,
    pub input_file: String,
    pub reference_file: String,
    /// 参考表工作表名，缺省为产线名
    #[serde(default)]
    pub reference_sheet: Option<String>,
    #[serde(default = "default_layout_name")]
    pub layout: String,
}

fn default_layout_name() -> String {
    DEFAULT_LAYOUT.to_string()
}

impl LineRoute {
    pub fn new(line: &str, reference_file: &str, reference_sheet: Option<&str>) -> Self {
        Self {
            line: line.to_string(),
            input_file: format!("{}.xlsx", line),
            reference_file: reference_file.to_string(),
            reference_sheet: reference_sheet.map(str::to_string),
            layout: default_layout_name(),
        }
    }

    pub fn reference_sheet(&self) -> &str {
        self.reference_sheet.as_deref().unwrap_or(&self.line)
    }
}

// ==========================================
// PipelineConfig - 批处理配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub reference_dir: PathBuf,
    /// 工厂时区相对 UTC 的分钟偏移（默认 +05:30）
    pub utc_offset_minutes: i32,
    /// 报表中没有任何失效代码时是否跳过该产线
    pub skip_lines_without_codes: bool,
    pub retry: RetryPolicy,
    pub slot: SlotSchedule,
    pub layouts: BTreeMap<String, SourceLayout>,
    pub reference_layout: ReferenceLayout,
    pub lines: Vec<LineRoute>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut layouts = BTreeMap::new();
        layouts.insert(DEFAULT_LAYOUT.to_string(), SourceLayout::default());

        // Line 01/09/10 共用 Reference.xlsx 的 "Line 10" 工作表
        let lines = vec![
            LineRoute::new("Line 01", "Reference.xlsx", Some("Line 10")),
            LineRoute::new("Line 03", "Kansas.xlsx", None),
            LineRoute::new("Line 08", "Manila.xlsx", None),
            LineRoute::new("Line 09", "Reference.xlsx", Some("Line 10")),
            LineRoute::new("Line 10", "Reference.xlsx", Some("Line 10")),
            LineRoute::new("Line 12", "Lamulite.xlsx", None),
            LineRoute::new("Line 15", "Vegas.xlsx", None),
        ];

        Self {
            input_dir: PathBuf::from("data/input"),
            reference_dir: PathBuf::from("data/reference"),
            utc_offset_minutes: 330,
            skip_lines_without_codes: false,
            retry: RetryPolicy::default(),
            slot: SlotSchedule::default(),
            layouts,
            reference_layout: ReferenceLayout::default(),
            lines,
        }
    }
}

impl PipelineConfig {
    /// 从 JSON 文件加载并校验
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// 从 JSON 字符串加载并校验
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 校验配置
    ///
    /// # 规则
    /// - 至少一条产线，产线名唯一且非空
    /// - 每条产线引用的版式存在，列号与单元格地址可解析
    /// - 时区偏移合法，重试次数 ≥ 1，时段参数合法
    pub fn validate(&self) -> ConfigResult<()> {
        if self.lines.is_empty() {
            return Err(ConfigError::invalid("lines", "至少需要一条产线"));
        }

        let mut seen = HashSet::new();
        for route in &self.lines {
            if route.line.trim().is_empty() {
                return Err(ConfigError::invalid("lines.line", "产线名不能为空"));
            }
            if !seen.insert(route.line.as_str()) {
                return Err(ConfigError::invalid(
                    "lines.line",
                    format!("产线重复: {}", route.line),
                ));
            }
            if route.input_file.trim().is_empty() || route.reference_file.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("lines[{}]", route.line),
                    "报表文件与参考文件不能为空",
                ));
            }
            if !self.layouts.contains_key(&route.layout) {
                return Err(ConfigError::invalid(
                    format!("lines[{}].layout", route.line),
                    format!("未定义的版式: {}", route.layout),
                ));
            }
        }

        for (name, layout) in &self.layouts {
            layout.validate(name)?;
        }

        column_index(&self.reference_layout.code_column)
            .map_err(|e| ConfigError::invalid("reference_layout.code_column", e.to_string()))?;
        column_index(&self.reference_layout.root_cause_column).map_err(|e| {
            ConfigError::invalid("reference_layout.root_cause_column", e.to_string())
        })?;

        self.timezone()?;

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "至少尝试 1 次"));
        }
        self.slot.validate()?;

        Ok(())
    }

    /// 工厂固定时区
    pub fn timezone(&self) -> ConfigResult<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::invalid(
                    "utc_offset_minutes",
                    format!("时区偏移超出范围: {}", self.utc_offset_minutes),
                )
            })
    }

    pub fn route(&self, line: &str) -> Option<&LineRoute> {
        self.lines.iter().find(|route| route.line == line)
    }

    pub fn layout_for(&self, route: &LineRoute) -> Option<&SourceLayout> {
        self.layouts.get(&route.layout)
    }

    pub fn input_path(&self, route: &LineRoute) -> PathBuf {
        self.input_dir.join(&route.input_file)
    }

    pub fn reference_path(&self, route: &LineRoute) -> PathBuf {
        self.reference_dir.join(&route.reference_file)
    }

    pub fn line_names(&self) -> Vec<String> {
        self.lines.iter().map(|route| route.line.clone()).collect()
    }
}
