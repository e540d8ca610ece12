// 输出某产线某工厂日的看板视图（JSON）。
//
// 用法:
//   line_yield_report [db_path] <line> [YYYY-MM-DD]
//
// 只传一个参数时视为产线名，数据库取默认路径；日期缺省为工厂时区的今天。

use chrono::{NaiveDate, Utc};
use line_yield::app::{get_default_db_path, AppState};
use line_yield::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (db_path, line, date_arg) = match args.as_slice() {
        [line] => (get_default_db_path(), line.clone(), None),
        [first, second] if NaiveDate::parse_from_str(second, "%Y-%m-%d").is_ok() => {
            (get_default_db_path(), first.clone(), Some(second.clone()))
        }
        [db_path, line] => (db_path.clone(), line.clone(), None),
        [db_path, line, date, ..] => (db_path.clone(), line.clone(), Some(date.clone())),
        [] => return Err("用法: line_yield_report [db_path] <line> [YYYY-MM-DD]".into()),
    };

    let state = AppState::new(db_path)?;
    let tz = state.config.timezone()?;
    let date = match date_arg {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
        None => Utc::now().with_timezone(&tz).date_naive(),
    };

    let view = state.dashboard_api.get_line_day_view(&line, date).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
