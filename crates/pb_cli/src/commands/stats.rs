use pb_core::app_error::AppResult;
use pb_core::db::open_db;
use pb_core::stats::{dashboard_stats, upcoming_renewal_policies};
use std::path::Path;

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn run_summary(db_path: &str, days: u64, now_ms: i64) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let stats = dashboard_stats(&conn, now_ms, days)?;
    print_json(&stats);
    Ok(())
}

pub fn run_renewals(db_path: &str, days: u64, now_ms: i64) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let renewals = upcoming_renewal_policies(&conn, now_ms, days)?;
    print_json(&renewals);
    Ok(())
}
