use pb_core::app_error::AppResult;
use pb_core::backup_transport::blob_store_for_target;
use pb_core::db::open_db;
use pb_core::sync::{backup_info, manual_sync, sync_on_startup, SyncDirection};
use std::path::Path;

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn run_startup(db_path: &str, target: &str, owner: &str, now_ms: i64) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let blobs = blob_store_for_target(target)?;
    let outcome = sync_on_startup(&conn, blobs.as_ref(), owner, now_ms)?;
    print_json(&outcome);
    Ok(())
}

pub fn run_manual(
    db_path: &str,
    target: &str,
    owner: &str,
    direction: SyncDirection,
    now_ms: i64,
) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let blobs = blob_store_for_target(target)?;
    let outcome = manual_sync(&conn, blobs.as_ref(), owner, direction, now_ms)?;
    print_json(&outcome);
    Ok(())
}

pub fn run_info(target: &str, owner: &str) -> AppResult<()> {
    let blobs = blob_store_for_target(target)?;
    let info = backup_info(blobs.as_ref(), owner)?;
    print_json(&info);
    Ok(())
}
