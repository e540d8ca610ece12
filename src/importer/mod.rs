// ==========================================
// 产线良率看板系统 - 导入层
// ==========================================
// 职责: 读取产线报表与参考表，生成原始失效计数与参考映射
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod error;
pub mod file_parser;
pub mod line_report_extractor;
pub mod reference_loader;
pub mod sheet;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvSheetReader, ExcelSheetReader, SheetReader, UniversalSheetReader};
pub use line_report_extractor::{LineReport, LineReportExtractor};
pub use reference_loader::ReferenceMappingLoader;
pub use sheet::{column_index, column_letters, CellRef, CellValue, SheetGrid};
