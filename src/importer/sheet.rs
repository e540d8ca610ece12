// ==========================================
// 产线良率看板系统 - 工作表模型
// ==========================================
// 职责: A1 地址解析 + 绝对寻址的二维单元格网格
// 约束: 行列下标从 0 开始；A1 地址中的行号从 1 开始
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use std::fmt;

// ==========================================
// 列号 / 单元格地址
// ==========================================

/// 列字母 → 列下标（"A" → 0, "U" → 20, "AA" → 26）
pub fn column_index(letters: &str) -> ImportResult<usize> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ImportError::InvalidCellReference(letters.to_string()));
    }

    let mut index: usize = 0;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| ImportError::InvalidCellReference(letters.to_string()))?;
    }
    Ok(index - 1)
}

/// 列下标 → 列字母
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// 单元格地址（0 基）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    /// 解析 A1 风格地址，如 "V8"
    pub fn parse(reference: &str) -> ImportResult<Self> {
        let reference = reference.trim();
        let split = reference
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| ImportError::InvalidCellReference(reference.to_string()))?;
        let (letters, digits) = reference.split_at(split);

        let col = column_index(letters)
            .map_err(|_| ImportError::InvalidCellReference(reference.to_string()))?;
        let row: usize = digits
            .parse()
            .map_err(|_| ImportError::InvalidCellReference(reference.to_string()))?;
        if row == 0 {
            return Err(ImportError::InvalidCellReference(reference.to_string()));
        }

        Ok(Self { row: row - 1, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

// ==========================================
// CellValue - 单元格值
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// 空单元格或空字符串
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// 文本表示；整数值不带小数部分（1234.0 → "1234"）
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) if s.is_empty() => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        }
    }

    /// 数值表示；文本尝试按数字解析
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

// ==========================================
// SheetGrid - 工作表网格
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGrid {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl SheetGrid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// 由行数据构建（首行即第 1 行）
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 已使用的最大行数
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, CellValue::default);
        }
        cells[col] = value;
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    pub fn cell(&self, at: CellRef) -> Option<&CellValue> {
        self.get(at.row, at.col)
    }

    /// 在指定列中查找首个包含 needle 的行（大小写不敏感）
    pub fn find_in_column(&self, col: usize, needle: &str) -> Option<usize> {
        let needle = needle.to_lowercase();
        (0..self.rows.len()).find(|&row| {
            self.get(row, col)
                .and_then(CellValue::as_text)
                .map(|text| text.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
    }

    /// 收集 header_row 之下同列的全部非空值（原样文本）
    pub fn values_below(&self, header_row: usize, col: usize) -> Vec<String> {
        (header_row + 1..self.rows.len())
            .filter_map(|row| self.get(row, col).and_then(CellValue::as_text))
            .collect()
    }
}
