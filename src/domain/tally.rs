// ==========================================
// 产线良率看板系统 - 原始失效计数
// ==========================================
// 职责: 按原始失效代码（区分大小写、按字面值）计数
// 约束: 保持代码首次出现的顺序，决定记录中根因的插入顺序
// ==========================================

use std::collections::HashMap;

// ==========================================
// RawFailureTally - 原始失效计数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFailureTally {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl RawFailureTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由代码序列计数
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tally = Self::new();
        for code in codes {
            tally.add(code, 1);
        }
        tally
    }

    /// 累加某个代码的次数
    pub fn add(&mut self, code: impl Into<String>, count: u64) {
        let code = code.into();
        match self.index.get(&code) {
            Some(&pos) => self.entries[pos].1 += count,
            None => {
                self.index.insert(code.clone(), self.entries.len());
                self.entries.push((code, count));
            }
        }
    }

    pub fn get(&self, code: &str) -> u64 {
        self.index
            .get(code)
            .map(|&pos| self.entries[pos].1)
            .unwrap_or(0)
    }

    /// 按首次出现顺序遍历 (代码, 次数)
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(code, count)| (code.as_str(), *count))
    }

    /// 不同代码的个数
    pub fn distinct_len(&self) -> usize {
        self.entries.len()
    }

    /// 全部出现次数之和
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for RawFailureTally {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        let mut tally = Self::new();
        for (code, count) in iter {
            tally.add(code, count);
        }
        tally
    }
}
