// ==========================================
// YieldRecordRepository 集成测试（文件数据库）
// ==========================================


use chrono::{NaiveDate, NaiveTime};
use line_yield::engine::{TimeSlot, YieldRecordBuilder};
use line_yield::repository::{RepositoryError, YieldRecordRepository, YieldRecordStore};
use line_yield::{RawFailureTally, ReferenceMapping, YieldRecord};
use std::sync::Arc;
use test_helpers::{create_test_db, ist};

fn record(line: &str, date: NaiveDate, start_hour: u32) -> YieldRecord {
    let slot = TimeSlot::resolve(
        date,
        NaiveTime::from_hms_opt(start_hour, 30, 0).unwrap(),
        NaiveTime::from_hms_opt((start_hour + 1) % 24, 30, 0).unwrap(),
        ist(),
    )
    .unwrap();
    let mapping = ReferenceMapping::from_pairs(vec![("PWR_LOW", "Power")]);
    let tally = RawFailureTally::from_codes(vec!["PWR_LOW", "PWR_LOW", "UNKNOWN_X"]);
    YieldRecordBuilder::new().build(line, &slot, &tally, 100.0, &mapping)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

#[test]
fn test_records_visible_across_connections() {
    let (_tmp, db_path) = create_test_db().unwrap();

    let writer = YieldRecordRepository::new(&db_path).unwrap();
    let original = record("Line 10", day(14), 8);
    writer.insert_record(&original).unwrap();

    let reader = YieldRecordRepository::new(&db_path).unwrap();
    let found = reader.find_by_line_and_day("Line 10", day(14), ist()).unwrap();
    assert_eq!(found, vec![original]);
}

#[test]
fn test_late_slot_stays_on_its_start_day() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let repo = YieldRecordRepository::new(&db_path).unwrap();

    // 23:30-00:30 归属开始日期
    repo.insert_record(&record("Line 15", day(14), 23)).unwrap();
    repo.insert_record(&record("Line 15", day(15), 0)).unwrap();

    let day14 = repo.find_by_line_and_day("Line 15", day(14), ist()).unwrap();
    assert_eq!(day14.len(), 1);
    assert_eq!(day14[0].time_slot, "23:30-00:30");

    let day15 = repo.find_by_line_and_day("Line 15", day(15), ist()).unwrap();
    assert_eq!(day15.len(), 1);
    assert_eq!(day15[0].time_slot, "00:30-01:30");
}

#[test]
fn test_duplicate_slot_rejected_across_connections() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let first = YieldRecordRepository::new(&db_path).unwrap();
    let second = YieldRecordRepository::new(&db_path).unwrap();

    first.insert_record(&record("Line 01", day(14), 9)).unwrap();
    let err = second.insert_record(&record("Line 01", day(14), 9)).unwrap_err();

    assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    assert_eq!(second.count().unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_inserts_for_different_lines() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let repo = Arc::new(YieldRecordRepository::new(&db_path).unwrap());

    let lines = ["Line 01", "Line 03", "Line 08", "Line 09", "Line 10", "Line 12", "Line 15"];
    let mut handles = Vec::new();
    for line in lines {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.insert(&record(line, day(14), 8)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(repo.count().unwrap(), lines.len() as i64);
    let mut stored = repo.list_lines().unwrap();
    stored.sort();
    assert_eq!(stored, lines.to_vec());
}
