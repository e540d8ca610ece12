// ==========================================
// 产线良率看板系统 - 根因匹配引擎
// ==========================================
// 职责: 将原始失效代码归因到参考映射中的根因
// 规则: 严格按优先级，命中即返回
//   1. 精确匹配（大小写不敏感）
//   2. 子串匹配（原始代码包含已知代码，大小写不敏感，按参考表顺序）
//   3. 词重叠匹配（重叠词数最多者；并列取字符数更少的代码；再并列按参考表顺序）
// 红线: 纯函数，不读写任何外部状态
// ==========================================

use crate::domain::reference::{code_tokens, ReferenceEntry, ReferenceMapping};
use serde::Serialize;
use std::fmt;

/// 命中的匹配层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Substring,
    Token,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchKind::Exact => "exact",
            MatchKind::Substring => "substring",
            MatchKind::Token => "token",
        };
        write!(f, "{}", s)
    }
}

/// 匹配结果
#[derive(Debug, Clone, PartialEq)]
pub struct RootCauseMatch<'a> {
    pub root_cause: &'a str,
    pub matched_code: &'a str, // 命中的参考代码
    pub kind: MatchKind,
}

// ==========================================
// RootCauseMatcher - 根因匹配引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct RootCauseMatcher;

impl RootCauseMatcher {
    pub fn new() -> Self {
        Self
    }

    /// 匹配根因
    ///
    /// # 返回
    /// - Some(root_cause): 任一层级命中
    /// - None: 未匹配，计入 Other Failures
    pub fn match_code<'a>(&self, code: &str, mapping: &'a ReferenceMapping) -> Option<&'a str> {
        self.resolve(code, mapping).map(|hit| hit.root_cause)
    }

    /// 匹配根因并给出命中层级
    pub fn resolve<'a>(
        &self,
        code: &str,
        mapping: &'a ReferenceMapping,
    ) -> Option<RootCauseMatch<'a>> {
        if code.is_empty() || mapping.is_empty() {
            return None;
        }
        let code_lower = code.to_lowercase();

        // 1. 精确匹配
        if let Some(entry) = mapping.find_exact_ignore_case(&code_lower) {
            return Some(Self::hit(entry, MatchKind::Exact));
        }

        // 2. 子串匹配
        if let Some(entry) = mapping
            .entries()
            .iter()
            .find(|entry| code_lower.contains(entry.code_lower.as_str()))
        {
            return Some(Self::hit(entry, MatchKind::Substring));
        }

        // 3. 词重叠匹配
        Self::best_token_overlap(&code_lower, mapping).map(|entry| Self::hit(entry, MatchKind::Token))
    }

    fn hit(entry: &ReferenceEntry, kind: MatchKind) -> RootCauseMatch<'_> {
        RootCauseMatch {
            root_cause: &entry.root_cause,
            matched_code: &entry.code,
            kind,
        }
    }

    fn best_token_overlap<'a>(
        code_lower: &str,
        mapping: &'a ReferenceMapping,
    ) -> Option<&'a ReferenceEntry> {
        let tokens = code_tokens(code_lower);
        if tokens.is_empty() {
            return None;
        }

        let mut best: Option<(&ReferenceEntry, usize)> = None;
        for entry in mapping.entries() {
            let score = entry.tokens.intersection(&tokens).count();
            if score == 0 {
                continue;
            }

            let better = match best {
                None => true,
                Some((current, best_score)) => {
                    score > best_score
                        || (score == best_score && entry.code_len() < current.code_len())
                }
            };
            if better {
                best = Some((entry, score));
            }
        }

        best.map(|(entry, _)| entry)
    }
}
