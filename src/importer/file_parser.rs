// ==========================================
// 产线良率看板系统 - 工作表读取器实现
// ==========================================
// 职责: 将报表文件中的指定工作表读为 SheetGrid
// 支持: Excel (.xlsx/.xlsm/.xls) / CSV (.csv)
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::sheet::{CellValue, SheetGrid};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::debug;

// ==========================================
// SheetReader Trait
// ==========================================
// 用途: 报表/参考表读取接口
// 实现者: ExcelSheetReader, CsvSheetReader, UniversalSheetReader
pub trait SheetReader: Send + Sync {
    /// 读取文件中的指定工作表
    ///
    /// # 返回
    /// - Ok(SheetGrid): 工作表网格（绝对寻址）
    /// - Err(SourceMissing): 文件不存在
    /// - Err(SheetMissing): 工作表不存在
    fn read_sheet(&self, file_path: &Path, sheet_name: &str) -> ImportResult<SheetGrid>;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::SourceMissing(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// Excel Reader 实现
// ==========================================
pub struct ExcelSheetReader;

impl ExcelSheetReader {
    fn convert(cell: &Data) -> CellValue {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl SheetReader for ExcelSheetReader {
    fn read_sheet(&self, file_path: &Path, sheet_name: &str) -> ImportResult<SheetGrid> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if !matches!(ext.as_str(), "xlsx" | "xlsm" | "xls") {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        // 打开 Excel 文件
        let mut workbook = open_workbook_auto(file_path)?;

        let sheet_names = workbook.sheet_names();
        if !sheet_names.iter().any(|name| name == sheet_name) {
            return Err(ImportError::SheetMissing {
                file: file_path.display().to_string(),
                sheet: sheet_name.to_string(),
                available: sheet_names,
            });
        }

        let range = workbook.worksheet_range(sheet_name)?;

        // Range 的起点不一定是 A1，转换为绝对坐标
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut grid = SheetGrid::new(sheet_name);
        for (row, col, cell) in range.cells() {
            let value = Self::convert(cell);
            if !value.is_empty() {
                grid.set(row + row_offset, col + col_offset, value);
            }
        }

        debug!(
            file_path = %file_path.display(),
            sheet = sheet_name,
            rows = grid.row_count(),
            "Excel 工作表读取完成"
        );
        Ok(grid)
    }
}

// ==========================================
// CSV Reader 实现
// ==========================================
// CSV 视为只有一张工作表的工作簿，可响应任意工作表名
pub struct CsvSheetReader;

impl SheetReader for CsvSheetReader {
    fn read_sheet(&self, file_path: &Path, sheet_name: &str) -> ImportResult<SheetGrid> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let cells = record
                .iter()
                .map(|value| {
                    if value.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(value.to_string())
                    }
                })
                .collect();
            rows.push(cells);
        }

        Ok(SheetGrid::from_rows(sheet_name, rows))
    }
}

// ==========================================
// 通用读取器（根据扩展名自动选择）
// ==========================================
pub struct UniversalSheetReader;

impl SheetReader for UniversalSheetReader {
    fn read_sheet(&self, file_path: &Path, sheet_name: &str) -> ImportResult<SheetGrid> {
        ensure_exists(file_path)?;

        match extension_of(file_path).as_str() {
            "csv" => CsvSheetReader.read_sheet(file_path, sheet_name),
            "xlsx" | "xlsm" | "xls" => ExcelSheetReader.read_sheet(file_path, sheet_name),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
