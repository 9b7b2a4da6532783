use crate::app_error::{AppError, AppResult};
use crate::store::{self, Policy};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RENEWAL_WINDOW_DAYS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStatsV1 {
    pub schema_version: u32,
    pub total_clients: usize,
    pub total_policies: usize,
    pub active_policies: usize,
    pub expired_policies: usize,
    pub upcoming_renewals: usize,
    pub total_premium_rs: f64,
}

fn stats_error(message: &str, details: serde_json::Value) -> AppError {
    AppError::new("PB_STATS_FAILED", "stats", message, false, details)
}

fn today_from_ms(now_ms: i64) -> AppResult<NaiveDate> {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(now_ms)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| {
            stats_error(
                "stats timestamp is out of range",
                serde_json::json!({ "now_ms": now_ms }),
            )
        })
}

fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn window_end(today: NaiveDate, days_ahead: u64) -> AppResult<NaiveDate> {
    today
        .checked_add_days(chrono::Days::new(days_ahead))
        .ok_or_else(|| {
            stats_error(
                "renewal window is out of range",
                serde_json::json!({ "days_ahead": days_ahead }),
            )
        })
}

pub fn dashboard_stats(
    conn: &Connection,
    now_ms: i64,
    renewal_window_days: u64,
) -> AppResult<DashboardStatsV1> {
    let clients = store::client_list(conn)?;
    let policies = store::policy_list(conn)?;
    let today = today_from_ms(now_ms)?;
    let window = window_end(today, renewal_window_days)?;

    let mut active_policies = 0;
    let mut expired_policies = 0;
    let mut upcoming_renewals = 0;
    let mut total_premium_rs = 0.0;
    for policy in &policies {
        // Rows with an unreadable due date stay out of the aggregates.
        let Some(due) = parse_due_date(&policy.date_to) else {
            continue;
        };
        if due < today {
            expired_policies += 1;
            continue;
        }
        active_policies += 1;
        total_premium_rs += policy.premium_rs;
        if due > today && due <= window {
            upcoming_renewals += 1;
        }
    }

    Ok(DashboardStatsV1 {
        schema_version: 1,
        total_clients: clients.len(),
        total_policies: policies.len(),
        active_policies,
        expired_policies,
        upcoming_renewals,
        total_premium_rs,
    })
}

pub fn upcoming_renewal_policies(
    conn: &Connection,
    now_ms: i64,
    days_ahead: u64,
) -> AppResult<Vec<Policy>> {
    let today = today_from_ms(now_ms)?;
    let window = window_end(today, days_ahead)?;
    let policies = store::policy_list(conn)?;
    Ok(policies
        .into_iter()
        .filter(|policy| match parse_due_date(&policy.date_to) {
            Some(due) => due > today && due <= window,
            None => false,
        })
        .collect())
}
