// ==========================================
// 产线良率看板系统 - 良率记录构建引擎
// ==========================================
// 职责: 原始失效计数 + 投入数 + 参考映射 → YieldRecord
// 规则:
//   - 每个不同的原始代码只匹配一次
//   - 根因按首次归因顺序累加，未匹配计入 Other Failures
//   - yield = 1 - 失效总数/投入数；投入为 0 时 yield = 1，各比率为 0
// 红线: 纯函数，不负责持久化
// ==========================================

use crate::domain::reference::ReferenceMapping;
use crate::domain::tally::RawFailureTally;
use crate::domain::yield_record::{OtherFailures, RootCauseCount, YieldRecord};
use crate::engine::root_cause_matcher::RootCauseMatcher;
use crate::engine::time_slot::TimeSlot;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// count / input；投入为 0 时为 0
fn rate_of(count: u64, input: f64) -> f64 {
    if input > 0.0 {
        count as f64 / input
    } else {
        0.0
    }
}

// ==========================================
// YieldRecordBuilder - 良率记录构建引擎
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct YieldRecordBuilder {
    matcher: RootCauseMatcher,
}

impl YieldRecordBuilder {
    pub fn new() -> Self {
        Self {
            matcher: RootCauseMatcher::new(),
        }
    }

    /// 构建良率记录
    #[instrument(skip(self, slot, tally, mapping), fields(
        time_slot = %slot.label,
        distinct_codes = tally.distinct_len()
    ))]
    pub fn build(
        &self,
        line: &str,
        slot: &TimeSlot,
        tally: &RawFailureTally,
        input: f64,
        mapping: &ReferenceMapping,
    ) -> YieldRecord {
        let mut causes: Vec<(String, u64)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut other_count: u64 = 0;

        for (code, count) in tally.iter() {
            match self.matcher.resolve(code, mapping) {
                Some(hit) => {
                    let pos = *positions.entry(hit.root_cause).or_insert_with(|| {
                        causes.push((hit.root_cause.to_string(), 0));
                        causes.len() - 1
                    });
                    causes[pos].1 += count;
                    debug!(code, root_cause = hit.root_cause, kind = %hit.kind, "失效代码已归因");
                }
                None => {
                    other_count += count;
                    debug!(code, count, "失效代码未匹配，计入 Other Failures");
                }
            }
        }

        let total_failures: u64 = causes.iter().map(|(_, c)| c).sum::<u64>() + other_count;
        let yield_value = if input > 0.0 {
            1.0 - total_failures as f64 / input
        } else {
            1.0
        };

        let root_causes = causes
            .into_iter()
            .map(|(root_cause, count)| RootCauseCount {
                root_cause,
                count,
                rate: rate_of(count, input),
            })
            .collect();

        YieldRecord {
            line: line.to_string(),
            date: slot.date,
            time_slot: slot.label.clone(),
            start_time: slot.start,
            end_time: slot.end,
            input,
            yield_value,
            root_causes,
            other_failures: OtherFailures {
                count: other_count,
                rate: rate_of(other_count, input),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::time_slot::parse_clock;
    use chrono::{FixedOffset, NaiveDate};

    fn slot() -> TimeSlot {
        TimeSlot::resolve(
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            parse_clock("09:30:00").unwrap(),
            parse_clock("10:30:00").unwrap(),
            FixedOffset::east_opt(330 * 60).unwrap(),
        )
        .unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_reference_scenario() {
        let tally: RawFailureTally =
            [("E100_TIMEOUT", 5u64), ("E100", 3), ("UNKNOWN_X", 2)].into_iter().collect();
        let mapping = ReferenceMapping::from_pairs([("E100", "Timeout Fault")]);

        let record = YieldRecordBuilder::new().build("Line 03", &slot(), &tally, 100.0, &mapping);

        assert_eq!(record.root_causes.len(), 1);
        assert_eq!(record.root_causes[0].root_cause, "Timeout Fault");
        assert_eq!(record.root_causes[0].count, 8);
        assert!(approx(record.root_causes[0].rate, 0.08));
        assert_eq!(record.other_failures.count, 2);
        assert!(approx(record.other_failures.rate, 0.02));
        assert!(approx(record.yield_value, 0.90));
        assert_eq!(record.time_slot, "09:30-10:30");
        assert_eq!(record.line, "Line 03");
    }

    #[test]
    fn test_zero_input_is_fully_passing() {
        let tally: RawFailureTally = [("E100", 4u64), ("ZZZ", 1)].into_iter().collect();
        let mapping = ReferenceMapping::from_pairs([("E100", "Timeout Fault")]);

        let record = YieldRecordBuilder::new().build("Line 03", &slot(), &tally, 0.0, &mapping);

        assert_eq!(record.yield_value, 1.0);
        assert!(record.root_causes.iter().all(|rc| rc.rate == 0.0));
        assert_eq!(record.other_failures.rate, 0.0);
        assert_eq!(record.total_failures(), 5);
    }

    #[test]
    fn test_counts_are_conserved_and_causes_keep_first_order() {
        let tally: RawFailureTally = [
            ("CAM_ERR", 2u64),
            ("E100", 1),
            ("BAD", 7),
            ("cam_err", 3),
            ("E100_RETRY", 4),
        ]
        .into_iter()
        .collect();
        let mapping = ReferenceMapping::from_pairs([("E100", "Timeout Fault"), ("CAM_ERR", "Optics")]);

        let record = YieldRecordBuilder::new().build("Line 08", &slot(), &tally, 50.0, &mapping);

        let labels: Vec<&str> = record.root_causes.iter().map(|rc| rc.root_cause.as_str()).collect();
        assert_eq!(labels, vec!["Optics", "Timeout Fault"]);
        assert_eq!(record.root_cause("Optics").unwrap().count, 5);
        assert_eq!(record.root_cause("Timeout Fault").unwrap().count, 5);
        assert_eq!(record.total_failures(), tally.total());
        assert!(approx(record.yield_value, 1.0 - 17.0 / 50.0));
    }

    #[test]
    fn test_failures_above_input_are_not_clamped() {
        let tally: RawFailureTally = [("X", 12u64)].into_iter().collect();
        let record =
            YieldRecordBuilder::new().build("Line 12", &slot(), &tally, 10.0, &ReferenceMapping::new());
        assert!(approx(record.yield_value, -0.2));
    }

    #[test]
    fn test_build_is_deterministic() {
        let tally: RawFailureTally = [("A_B", 1u64), ("B_C", 2), ("Q", 3)].into_iter().collect();
        let mapping = ReferenceMapping::from_pairs([("A", "Alpha"), ("C_D", "Gamma")]);
        let builder = YieldRecordBuilder::new();

        let first = builder.build("Line 15", &slot(), &tally, 40.0, &mapping);
        let second = builder.build("Line 15", &slot(), &tally, 40.0, &mapping);
        assert_eq!(first, second);
    }
}
