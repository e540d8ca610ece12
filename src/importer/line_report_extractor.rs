// ==========================================
// 产线良率看板系统 - 产线报表抽取器
// ==========================================
// 职责: 产线报表 → (原始失效计数, 投入数)
// 步骤:
//   1. 在表头列中定位首个包含表头文字的行（大小写不敏感）
//   2. 收集该行以下数据列的全部非空单元格作为原始代码
//   3. 从固定单元格读取投入数（缺失/空白按 0）
//   4. 按字面值计数（区分大小写）
// ==========================================

use crate::config::pipeline_config::SourceLayout;
use crate::domain::tally::RawFailureTally;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::SheetReader;
use crate::importer::sheet::{column_index, CellRef, CellValue, SheetGrid};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 单份报表的抽取结果
#[derive(Debug, Clone, PartialEq)]
pub struct LineReport {
    pub tally: RawFailureTally,
    pub input: f64,
}

impl LineReport {
    /// 没有任何失效代码时给出告警级错误
    pub fn no_codes_warning(&self, source: &Path) -> Option<ImportError> {
        if self.tally.is_empty() {
            Some(ImportError::NoCodesFound(source.display().to_string()))
        } else {
            None
        }
    }
}

// ==========================================
// LineReportExtractor - 产线报表抽取器
// ==========================================
pub struct LineReportExtractor {
    reader: Arc<dyn SheetReader>,
}

impl LineReportExtractor {
    pub fn new(reader: Arc<dyn SheetReader>) -> Self {
        Self { reader }
    }

    /// 抽取报表
    ///
    /// # 返回
    /// - Err(SourceMissing / SheetMissing): 文件或工作表不存在
    /// - Err(HeaderNotFound): 表头列中没有表头文字
    /// - Err(InvalidInputCount): 投入数不是非负数
    /// - Ok(report): 计数可能为空，由调用方决定是否跳过
    #[instrument(skip(self, layout), fields(file_path = %file_path.display(), sheet = %layout.sheet_name))]
    pub fn extract(&self, file_path: &Path, layout: &SourceLayout) -> ImportResult<LineReport> {
        let grid = self.reader.read_sheet(file_path, &layout.sheet_name)?;
        let report = Self::extract_from_grid(&grid, layout, file_path)?;

        if report.tally.is_empty() {
            warn!(input = report.input, "报表中未找到失效代码");
        } else {
            debug!(
                distinct_codes = report.tally.distinct_len(),
                failures = report.tally.total(),
                input = report.input,
                "报表抽取完成"
            );
        }
        Ok(report)
    }

    /// 从已读取的工作表抽取
    pub fn extract_from_grid(
        grid: &SheetGrid,
        layout: &SourceLayout,
        source: &Path,
    ) -> ImportResult<LineReport> {
        let header_col = column_index(&layout.header_column)?;
        let data_col = column_index(&layout.data_column)?;

        let header_row = grid
            .find_in_column(header_col, &layout.header_label)
            .ok_or_else(|| ImportError::HeaderNotFound {
                file: source.display().to_string(),
                label: layout.header_label.clone(),
                column: layout.header_column.clone(),
            })?;

        let tally = RawFailureTally::from_codes(grid.values_below(header_row, data_col));
        let input = Self::read_input(grid, &layout.input_cell)?;

        Ok(LineReport { tally, input })
    }

    fn read_input(grid: &SheetGrid, input_cell: &str) -> ImportResult<f64> {
        let at = CellRef::parse(input_cell)?;
        let cell = match grid.cell(at) {
            None => return Ok(0.0),
            Some(cell) if cell.is_empty() => return Ok(0.0),
            Some(cell) => cell,
        };

        let invalid = || ImportError::InvalidInputCount {
            cell: at.to_string(),
            value: cell.as_text().unwrap_or_default(),
        };

        // 仅含空白的文本也按 0 处理
        if let CellValue::Text(text) = cell {
            if text.trim().is_empty() {
                return Ok(0.0);
            }
        }

        let value = cell.as_number().ok_or_else(invalid)?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }
        Ok(value)
    }
}
