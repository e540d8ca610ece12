// ==========================================
// 产线良率看板系统 - 批处理主入口
// ==========================================
// 用法:
//   line-yield [db_path] [HH:MM:SS 开始] [HH:MM:SS 结束]
// 不指定时段时处理最近一个已结束的小时时段
// 由外部调度每小时触发一次；本次失败不影响下一周期
// ==========================================

use std::process::ExitCode;

use chrono::Utc;
use line_yield::app::{get_default_db_path, AppState};
use line_yield::engine::time_slot::{parse_clock, TimeSlot};
use line_yield::logging;
use line_yield::retry::RetryPolicy;

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 批处理", line_yield::APP_NAME);
    tracing::info!("系统版本: {}", line_yield::VERSION);
    tracing::info!("==================================================");

    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(get_default_db_path);

    let start = args.next();
    let end = args.next();
    let explicit = match (start.as_deref(), end.as_deref()) {
        (None, None) => None,
        (Some(start), Some(end)) => match (parse_clock(start), parse_clock(end)) {
            (Ok(start), Ok(end)) => Some((start, end)),
            _ => {
                tracing::error!(start, end, "时段格式错误，应为 HH:MM:SS");
                return ExitCode::from(2);
            }
        },
        _ => {
            tracing::error!("开始与结束时刻需同时指定");
            return ExitCode::from(2);
        }
    };

    tracing::info!("使用数据库: {}", db_path);
    let state = match AppState::connect(db_path, &RetryPolicy::default()).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "初始化失败，本次运行终止");
            return ExitCode::FAILURE;
        }
    };

    let runner = match state.batch_runner() {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %e, "批处理配置无效");
            return ExitCode::FAILURE;
        }
    };

    let slot = match explicit {
        Some((start, end)) => {
            let tz = runner.timezone();
            TimeSlot::resolve_today(Utc::now().with_timezone(&tz), start, end, tz)
        }
        None => runner.latest_slot(Utc::now()),
    };
    let Some(slot) = slot else {
        tracing::error!("时段超出可表示的日期范围");
        return ExitCode::from(2);
    };
    tracing::info!(
        time_slot = %slot.label,
        execute_at = %runner.config().slot.execute_at(&slot),
        "开始处理时段"
    );

    let report = runner.run(slot).await;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!(error = %e, "批次结果序列化失败"),
    }

    if report.is_fatal() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
