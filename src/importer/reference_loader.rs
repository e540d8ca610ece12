// ==========================================
// 产线良率看板系统 - 参考映射加载器
// ==========================================
// 职责: 从参考表读取 (失效代码, 根因) 行，构建 ReferenceMapping
// 规则: 跳过表头行；任一字段为空的行忽略
// 缓存: 同一 (文件, 工作表) 在加载器生命周期内只读取一次，结果共享
// ==========================================

use crate::config::pipeline_config::ReferenceLayout;
use crate::domain::reference::ReferenceMapping;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::SheetReader;
use crate::importer::sheet::{column_index, CellValue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

type CacheKey = (PathBuf, String);

// ==========================================
// ReferenceMappingLoader - 参考映射加载器
// ==========================================
pub struct ReferenceMappingLoader {
    reader: Arc<dyn SheetReader>,
    layout: ReferenceLayout,
    cache: Mutex<HashMap<CacheKey, Arc<ReferenceMapping>>>,
}

impl ReferenceMappingLoader {
    pub fn new(reader: Arc<dyn SheetReader>, layout: ReferenceLayout) -> Self {
        Self {
            reader,
            layout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 加载映射，失败时返回错误
    ///
    /// # 返回
    /// - Err(SourceMissing): 参考文件不存在
    /// - Err(SheetMissing): 工作表不存在
    pub fn try_load(&self, file_path: &Path, sheet_name: &str) -> ImportResult<Arc<ReferenceMapping>> {
        let key: CacheKey = (file_path.to_path_buf(), sheet_name.to_string());
        if let Some(cached) = self.cached(&key) {
            debug!(file_path = %file_path.display(), sheet = sheet_name, "参考映射命中缓存");
            return Ok(cached);
        }

        let mapping = Arc::new(self.read_mapping(file_path, sheet_name)?);
        info!(
            file_path = %file_path.display(),
            sheet = sheet_name,
            codes = mapping.len(),
            "参考映射加载完成"
        );

        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // 并发加载同一工作表时保留先写入者
        let shared = cache.entry(key).or_insert(mapping);
        Ok(Arc::clone(shared))
    }

    /// 加载映射；任何失败都记录日志并返回空映射（"无可用映射"）
    pub fn load(&self, file_path: &Path, sheet_name: &str) -> Arc<ReferenceMapping> {
        match self.try_load(file_path, sheet_name) {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(
                    file_path = %file_path.display(),
                    sheet = sheet_name,
                    error = %e,
                    "参考映射不可用"
                );
                Arc::new(ReferenceMapping::new())
            }
        }
    }

    /// 已缓存的 (文件, 工作表) 数量
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    fn cached(&self, key: &CacheKey) -> Option<Arc<ReferenceMapping>> {
        let cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(key).cloned()
    }

    fn read_mapping(&self, file_path: &Path, sheet_name: &str) -> ImportResult<ReferenceMapping> {
        let code_col = column_index(&self.layout.code_column)?;
        let cause_col = column_index(&self.layout.root_cause_column)?;
        let grid = self.reader.read_sheet(file_path, sheet_name)?;

        let mut mapping = ReferenceMapping::new();
        let mut skipped = 0usize;
        for row in self.layout.header_rows..grid.row_count() {
            let code = grid.get(row, code_col).and_then(CellValue::as_text);
            let cause = grid.get(row, cause_col).and_then(CellValue::as_text);
            let inserted = match (code, cause) {
                (Some(code), Some(cause)) => mapping.insert(&code, &cause),
                _ => false,
            };
            if !inserted {
                skipped += 1;
            }
        }

        if skipped > 0 {
            debug!(sheet = sheet_name, skipped, "参考表中有字段缺失的行已跳过");
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::error::ImportError;
    use crate::importer::file_parser::CsvSheetReader;
    use crate::importer::sheet::SheetGrid;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::Builder;

    struct CountingReader {
        calls: AtomicUsize,
    }

    impl SheetReader for CountingReader {
        fn read_sheet(&self, _file_path: &Path, sheet_name: &str) -> ImportResult<SheetGrid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut grid = SheetGrid::new(sheet_name);
            grid.set(0, 0, CellValue::Text("Code".to_string()));
            grid.set(0, 1, CellValue::Text("Root Cause".to_string()));
            grid.set(1, 0, CellValue::Text("E100".to_string()));
            grid.set(1, 1, CellValue::Text("Timeout Fault".to_string()));
            Ok(grid)
        }
    }

    #[test]
    fn test_load_skips_header_and_incomplete_rows() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Error Code,Root Cause").unwrap();
        writeln!(file, "E100,Timeout Fault").unwrap();
        writeln!(file, "E200,").unwrap();
        writeln!(file, ",Orphan").unwrap();
        writeln!(file, "CAM_ERR,Optics").unwrap();

        let loader = ReferenceMappingLoader::new(Arc::new(CsvSheetReader), ReferenceLayout::default());
        let mapping = loader.try_load(file.path(), "Line 10").unwrap();

        let codes: Vec<&str> = mapping.error_codes().collect();
        assert_eq!(codes, vec!["E100", "CAM_ERR"]);
        assert_eq!(mapping.root_cause_of("CAM_ERR"), Some("Optics"));
    }

    #[test]
    fn test_missing_source_yields_empty_mapping() {
        let loader = ReferenceMappingLoader::new(
            Arc::new(crate::importer::file_parser::UniversalSheetReader),
            ReferenceLayout::default(),
        );

        let err = loader.try_load(Path::new("missing/Kansas.xlsx"), "Line 03").unwrap_err();
        assert!(matches!(err, ImportError::SourceMissing(_)));
        assert!(loader.load(Path::new("missing/Kansas.xlsx"), "Line 03").is_empty());
        assert_eq!(loader.cached_len(), 0);
    }

    #[test]
    fn test_same_sheet_is_read_once() {
        let reader = Arc::new(CountingReader {
            calls: AtomicUsize::new(0),
        });
        let loader = ReferenceMappingLoader::new(reader.clone(), ReferenceLayout::default());

        let a = loader.load(Path::new("Reference.xlsx"), "Line 10");
        let b = loader.load(Path::new("Reference.xlsx"), "Line 10");
        let c = loader.load(Path::new("Reference.xlsx"), "Line 03");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(c.len(), 1);
        assert_eq!(reader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(loader.cached_len(), 2);
    }
}
