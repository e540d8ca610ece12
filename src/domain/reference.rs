// ==========================================
// 产线良率看板系统 - 失效代码参考映射
// ==========================================
// 职责: 失效代码 → 根因 的只读映射（按参考表行序）
// 约束: 加载完成后不可变，可在多条产线任务间共享
// ==========================================

use std::collections::{HashMap, HashSet};

/// 将失效代码按下划线/空白切分为小写词集合（忽略空词）
pub fn code_tokens(code: &str) -> HashSet<String> {
    code.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

// ==========================================
// ReferenceEntry - 单条映射
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub code: String,
    pub root_cause: String,
    // 预计算，匹配时不再重复转换
    pub(crate) code_lower: String,
    pub(crate) tokens: HashSet<String>,
}

impl ReferenceEntry {
    fn new(code: String, root_cause: String) -> Self {
        let code_lower = code.to_lowercase();
        let tokens = code_tokens(&code);
        Self {
            code,
            root_cause,
            code_lower,
            tokens,
        }
    }

    /// 代码长度（字符数），用于词重叠并列时的取舍
    pub fn code_len(&self) -> usize {
        self.code.chars().count()
    }
}

// ==========================================
// ReferenceMapping - 参考映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceMapping {
    entries: Vec<ReferenceEntry>,
    by_code: HashMap<String, usize>,
    by_lower: HashMap<String, usize>,
}

impl ReferenceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由 (代码, 根因) 序列构建
    pub fn from_pairs<I, C, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, R)>,
        C: AsRef<str>,
        R: AsRef<str>,
    {
        let mut mapping = Self::new();
        for (code, root_cause) in pairs {
            mapping.insert(code.as_ref(), root_cause.as_ref());
        }
        mapping
    }

    /// 插入一条映射
    ///
    /// # 规则
    /// - 代码与根因均去除首尾空白，任一为空则忽略
    /// - 重复代码保留首次出现的位置，根因取最后一次的值
    ///
    /// # 返回
    /// - true: 已插入或覆盖
    /// - false: 被忽略
    pub fn insert(&mut self, code: &str, root_cause: &str) -> bool {
        let code = code.trim();
        let root_cause = root_cause.trim();
        if code.is_empty() || root_cause.is_empty() {
            return false;
        }

        if let Some(&pos) = self.by_code.get(code) {
            self.entries[pos].root_cause = root_cause.to_string();
            return true;
        }

        let pos = self.entries.len();
        let entry = ReferenceEntry::new(code.to_string(), root_cause.to_string());
        self.by_lower.entry(entry.code_lower.clone()).or_insert(pos);
        self.by_code.insert(entry.code.clone(), pos);
        self.entries.push(entry);
        true
    }

    /// 已知失效代码（按参考表顺序）
    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn error_codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.code.as_str())
    }

    /// 按代码原样查询根因
    pub fn root_cause_of(&self, code: &str) -> Option<&str> {
        self.by_code
            .get(code.trim())
            .map(|&pos| self.entries[pos].root_cause.as_str())
    }

    /// 大小写不敏感的精确查找（同名多条时取参考表中靠前者）
    pub(crate) fn find_exact_ignore_case(&self, code_lower: &str) -> Option<&ReferenceEntry> {
        self.by_lower.get(code_lower).map(|&pos| &self.entries[pos])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 空映射表示 "无可用映射"
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_tokens_split_on_underscore_and_space() {
        let tokens = code_tokens("VBAT_Current  Fail__x");
        let expected: HashSet<String> = ["vbat", "current", "fail", "x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_insert_skips_blank_fields() {
        let mut mapping = ReferenceMapping::new();
        assert!(!mapping.insert("", "Timeout"));
        assert!(!mapping.insert("E100", "   "));
        assert!(mapping.insert(" E100 ", "Timeout Fault"));
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.root_cause_of("E100"), Some("Timeout Fault"));
    }

    #[test]
    fn test_duplicate_code_keeps_position_takes_last_cause() {
        let mapping = ReferenceMapping::from_pairs([
            ("E100", "Old"),
            ("E200", "Power"),
            ("E100", "New"),
        ]);

        let codes: Vec<&str> = mapping.error_codes().collect();
        assert_eq!(codes, vec!["E100", "E200"]);
        assert_eq!(mapping.root_cause_of("E100"), Some("New"));
    }
}
