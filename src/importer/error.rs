// ==========================================
// 产线良率看板系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 导入错误只影响当前产线，批次中其他产线照常处理
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 数据源错误 =====
    #[error("数据源不存在: {0}")]
    SourceMissing(String),

    #[error("工作表不存在: {sheet} (文件: {file}，可用工作表: {available:?})")]
    SheetMissing {
        file: String,
        sheet: String,
        available: Vec<String>,
    },

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xlsm/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 报表结构错误 =====
    #[error("未找到表头 '{label}' (列 {column}，文件: {file})")]
    HeaderNotFound {
        file: String,
        label: String,
        column: String,
    },

    #[error("单元格地址无效: {0}")]
    InvalidCellReference(String),

    #[error("投入数无效 (单元格 {cell}): {value}")]
    InvalidInputCount { cell: String, value: String },

    // ===== 告警级 =====
    #[error("未找到失效代码: {0}")]
    NoCodesFound(String),

    // ===== 参考映射 =====
    #[error("无可用的失效代码映射 (产线: {line}，参考表: {reference})")]
    NoMappingAvailable { line: String, reference: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 告警级错误（不代表数据源损坏）
    pub fn is_warning(&self) -> bool {
        matches!(self, ImportError::NoCodesFound(_))
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
