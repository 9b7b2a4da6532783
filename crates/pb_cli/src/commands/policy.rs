use pb_core::app_error::AppResult;
use pb_core::db::open_db;
use pb_core::integrity;
use pb_core::store::{self, PolicyFields};
use std::path::Path;

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn run_add(db_path: &str, fields: PolicyFields, now_ms: i64) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let saved = integrity::policy_add(&conn, &fields, now_ms)?;
    print_json(&saved);
    Ok(())
}

pub fn run_edit(db_path: &str, id: &str, fields: PolicyFields, now_ms: i64) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let saved = integrity::policy_edit(&conn, id, &fields, now_ms)?;
    print_json(&saved);
    Ok(())
}

pub fn run_list(db_path: &str, client_phone: Option<&str>) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let policies = match client_phone {
        Some(phone) => store::policy_list_by_client_phone(&conn, phone)?,
        None => store::policy_list(&conn)?,
    };
    print_json(&policies);
    Ok(())
}

pub fn run_delete(db_path: &str, id: &str) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    store::policy_delete(&conn, id)?;
    println!("policy deleted: {}", id);
    Ok(())
}
