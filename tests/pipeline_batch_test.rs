// ==========================================
// 批处理编排集成测试
// ==========================================
// 覆盖: 多产线批次、缺失报表/映射跳过、无失效代码、共用参考表、
//       写入重试、重试用尽、重复写入
// ==========================================


use chrono::{NaiveDate, NaiveTime};
use line_yield::config::LineRoute;
use line_yield::engine::{LineOutcome, YieldBatchRunner};
use line_yield::importer::file_parser::CsvSheetReader;
use line_yield::repository::{YieldRecordRepository, YieldRecordStore};
use line_yield::OTHER_FAILURES_LABEL;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use test_helpers::{create_test_db, csv_route, ist, FlakyStore, TestPlant};

const REFERENCE_ROWS: &[(&str, &str)] = &[
    ("ATE_OPTICS_FAIL", "Optics"),
    ("PWR_LOW", "Power"),
    ("LINK_TIMEOUT", "Connectivity"),
];

fn slot_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
}

fn hms(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn runner_with(
    plant: &TestPlant,
    routes: Vec<LineRoute>,
    store: Arc<dyn YieldRecordStore>,
) -> YieldBatchRunner {
    YieldBatchRunner::new(plant.config(routes), Arc::new(CsvSheetReader), store).unwrap()
}

#[tokio::test]
async fn test_batch_persists_and_skips_per_line() {
    line_yield::logging::init_test();
    let plant = TestPlant::new();
    let (_tmp, db_path) = create_test_db().unwrap();
    let repo = Arc::new(YieldRecordRepository::new(&db_path).unwrap());

    plant.write_reference("Kansas.csv", REFERENCE_ROWS);
    plant.write_report(
        "Line 03.csv",
        Some(200.0),
        &["ATE_OPTICS_FAIL", "ATE_OPTICS_FAIL", "PWR_LOW", "ATE_OPTICS_FAIL", "ZZZ_UNKNOWN"],
    );
    // Line 08: 报表存在但参考表缺失
    plant.write_report("Line 08.csv", Some(100.0), &["PWR_LOW"]);
    // Line 12: 参考表存在但报表缺失
    plant.write_reference("Lamulite.csv", REFERENCE_ROWS);

    let runner = runner_with(
        &plant,
        vec![
            csv_route("Line 03", "Kansas.csv", None),
            csv_route("Line 08", "Manila.csv", None),
            csv_route("Line 12", "Lamulite.csv", None),
        ],
        repo.clone(),
    );

    let report = runner.run_slot(slot_date(), hms(8, 30), hms(9, 30)).await.unwrap();

    assert_eq!(report.time_slot, "08:30-09:30");
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.persisted_count(), 1);
    assert_eq!(report.skipped_count(), 2);
    assert_eq!(report.failed_count(), 0);
    assert!(!report.is_fatal());

    // 输出顺序与配置顺序一致
    let lines: Vec<&str> = report.outcomes.iter().map(|o| o.line()).collect();
    assert_eq!(lines, vec!["Line 03", "Line 08", "Line 12"]);

    let record = match report.outcome("Line 03") {
        Some(LineOutcome::Persisted { record, .. }) => record.clone(),
        other => panic!("Line 03 应已写入: {:?}", other),
    };
    assert_eq!(record.input, 200.0);
    assert_eq!(record.total_failures(), 5);
    assert!((record.yield_value - 0.975).abs() < 1e-9);
    assert_eq!(record.root_cause("Optics").unwrap().count, 3);
    assert_eq!(record.root_cause("Power").unwrap().count, 1);
    assert!(record.root_cause("Connectivity").is_none());
    assert_eq!(record.other_failures.count, 1);
    assert!(record.root_cause(OTHER_FAILURES_LABEL).is_none());

    assert!(matches!(
        report.outcome("Line 08"),
        Some(LineOutcome::Skipped { warning: false, .. })
    ));
    assert!(matches!(
        report.outcome("Line 12"),
        Some(LineOutcome::Skipped { warning: false, .. })
    ));

    // 只有完整记录入库
    assert_eq!(repo.count().unwrap(), 1);
    let stored = repo
        .find_by_line_and_day("Line 03", slot_date(), ist())
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], record);
}

#[tokio::test]
async fn test_lines_sharing_reference_sheet() {
    let plant = TestPlant::new();
    let store = Arc::new(FlakyStore::failing_first(0));

    plant.write_reference("Reference.csv", REFERENCE_ROWS);
    plant.write_report("Line 01.csv", Some(50.0), &["LINK_TIMEOUT"]);
    plant.write_report("Line 09.csv", Some(80.0), &["PWR_LOW", "PWR_LOW"]);

    let runner = runner_with(
        &plant,
        vec![
            csv_route("Line 01", "Reference.csv", Some("Line 10")),
            csv_route("Line 09", "Reference.csv", Some("Line 10")),
        ],
        store.clone(),
    );

    let report = runner.run_slot(slot_date(), hms(10, 30), hms(11, 30)).await.unwrap();

    assert_eq!(report.persisted_count(), 2);
    let stored = store.stored();
    assert_eq!(stored.len(), 2);
    let line01 = stored.iter().find(|r| r.line == "Line 01").unwrap();
    assert_eq!(line01.root_cause("Connectivity").unwrap().count, 1);
    let line09 = stored.iter().find(|r| r.line == "Line 09").unwrap();
    assert_eq!(line09.root_cause("Power").unwrap().count, 2);
    assert!((line09.yield_value - 0.975).abs() < 1e-9);
}

#[tokio::test]
async fn test_report_without_codes_builds_zero_failure_record() {
    let plant = TestPlant::new();
    let store = Arc::new(FlakyStore::failing_first(0));

    plant.write_reference("Kansas.csv", REFERENCE_ROWS);
    plant.write_report("Line 03.csv", Some(120.0), &[]);

    let runner = runner_with(&plant, vec![csv_route("Line 03", "Kansas.csv", None)], store.clone());
    let report = runner.run_slot(slot_date(), hms(8, 30), hms(9, 30)).await.unwrap();

    assert_eq!(report.persisted_count(), 1);
    let stored = store.stored();
    assert_eq!(stored[0].yield_value, 1.0);
    assert_eq!(stored[0].total_failures(), 0);
    assert!(stored[0].root_causes.is_empty());
}

#[tokio::test]
async fn test_report_without_codes_skipped_when_configured() {
    let plant = TestPlant::new();
    let store = Arc::new(FlakyStore::failing_first(0));

    plant.write_reference("Kansas.csv", REFERENCE_ROWS);
    plant.write_report("Line 03.csv", Some(120.0), &[]);

    let mut config = plant.config(vec![csv_route("Line 03", "Kansas.csv", None)]);
    config.skip_lines_without_codes = true;
    let runner = YieldBatchRunner::new(config, Arc::new(CsvSheetReader), store.clone()).unwrap();

    let report = runner.run_slot(slot_date(), hms(8, 30), hms(9, 30)).await.unwrap();

    assert!(matches!(
        report.outcome("Line 03"),
        Some(LineOutcome::Skipped { warning: true, .. })
    ));
    assert!(!report.is_fatal());
    assert!(store.stored().is_empty());
}

#[tokio::test]
async fn test_zero_input_yields_one() {
    let plant = TestPlant::new();
    let store = Arc::new(FlakyStore::failing_first(0));

    plant.write_reference("Kansas.csv", REFERENCE_ROWS);
    // 投入数单元格为空按 0 处理
    plant.write_report("Line 03.csv", None, &["PWR_LOW"]);

    let runner = runner_with(&plant, vec![csv_route("Line 03", "Kansas.csv", None)], store.clone());
    let report = runner.run_slot(slot_date(), hms(8, 30), hms(9, 30)).await.unwrap();

    assert_eq!(report.persisted_count(), 1);
    let record = &store.stored()[0];
    assert_eq!(record.input, 0.0);
    assert_eq!(record.yield_value, 1.0);
    assert_eq!(record.root_cause("Power").unwrap().rate, 0.0);
}

#[tokio::test]
async fn test_transient_write_failures_are_retried() {
    let plant = TestPlant::new();
    let store = Arc::new(FlakyStore::failing_first(2));

    plant.write_reference("Kansas.csv", REFERENCE_ROWS);
    plant.write_report("Line 03.csv", Some(100.0), &["PWR_LOW"]);

    let runner = runner_with(&plant, vec![csv_route("Line 03", "Kansas.csv", None)], store.clone());
    let report = runner.run_slot(slot_date(), hms(8, 30), hms(9, 30)).await.unwrap();

    assert_eq!(report.persisted_count(), 1);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(store.stored().len(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_run() {
    let plant = TestPlant::new();
    let store = Arc::new(FlakyStore::always_busy());

    plant.write_reference("Kansas.csv", REFERENCE_ROWS);
    plant.write_reference("Lamulite.csv", REFERENCE_ROWS);
    plant.write_report("Line 03.csv", Some(100.0), &["PWR_LOW"]);
    plant.write_report("Line 12.csv", Some(100.0), &["LINK_TIMEOUT"]);

    let runner = runner_with(
        &plant,
        vec![
            csv_route("Line 03", "Kansas.csv", None),
            csv_route("Line 12", "Lamulite.csv", None),
        ],
        store.clone(),
    );
    let report = runner.run_slot(slot_date(), hms(8, 30), hms(9, 30)).await.unwrap();

    // 每条产线都尝试写入（3 次），批次不中断
    assert_eq!(report.failed_count(), 2);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 6);
    assert!(matches!(
        report.outcome("Line 03"),
        Some(LineOutcome::PersistFailed {
            attempts: 3,
            connectivity: true,
            ..
        })
    ));
    assert!(report.is_fatal());
    assert!(matches!(
        report.fatal_error(),
        Some(line_yield::PipelineError::ConnectivityFailure { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn test_duplicate_slot_is_rejected_without_retry() {
    let plant = TestPlant::new();
    let (_tmp, db_path) = create_test_db().unwrap();
    let repo = Arc::new(YieldRecordRepository::new(&db_path).unwrap());

    plant.write_reference("Kansas.csv", REFERENCE_ROWS);
    plant.write_report("Line 03.csv", Some(100.0), &["PWR_LOW"]);

    let runner = runner_with(&plant, vec![csv_route("Line 03", "Kansas.csv", None)], repo.clone());

    let first = runner.run_slot(slot_date(), hms(8, 30), hms(9, 30)).await.unwrap();
    assert_eq!(first.persisted_count(), 1);

    let second = runner.run_slot(slot_date(), hms(8, 30), hms(9, 30)).await.unwrap();
    assert!(matches!(
        second.outcome("Line 03"),
        Some(LineOutcome::PersistFailed {
            attempts: 1,
            connectivity: false,
            ..
        })
    ));
    assert!(!second.is_fatal());
    assert_eq!(repo.count().unwrap(), 1);
}

#[tokio::test]
async fn test_midnight_slot_ends_next_day() {
    let plant = TestPlant::new();
    let store = Arc::new(FlakyStore::failing_first(0));

    plant.write_reference("Kansas.csv", REFERENCE_ROWS);
    plant.write_report("Line 03.csv", Some(100.0), &["PWR_LOW"]);

    let runner = runner_with(&plant, vec![csv_route("Line 03", "Kansas.csv", None)], store.clone());
    let report = runner.run_slot(slot_date(), hms(23, 30), hms(0, 30)).await.unwrap();

    assert_eq!(report.time_slot, "23:30-00:30");
    let record = &store.stored()[0];
    assert_eq!(record.date, slot_date());
    assert_eq!(record.end_time.date_naive(), slot_date().succ_opt().unwrap());
    assert!(record.end_time > record.start_time);
}
