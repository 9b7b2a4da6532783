use pb_core::app_error::AppResult;
use pb_core::db::open_db;
use pb_core::integrity;
use pb_core::store::{self, ClientFields};
use std::path::Path;

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn run_add(db_path: &str, fields: ClientFields, now_ms: i64) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let client = store::client_create(&conn, &fields, now_ms)?;
    print_json(&client);
    Ok(())
}

pub fn run_list(db_path: &str) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    let clients = store::client_list(&conn)?;
    print_json(&clients);
    Ok(())
}

pub fn run_edit(
    db_path: &str,
    id: &str,
    fields: ClientFields,
    confirm: bool,
    propagate: bool,
    now_ms: i64,
) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    if confirm {
        let applied = integrity::client_edit_confirm(&conn, id, &fields, propagate, now_ms)?;
        print_json(&applied);
    } else {
        let outcome = integrity::client_edit(&conn, id, &fields, now_ms)?;
        print_json(&outcome);
    }
    Ok(())
}

pub fn run_delete(db_path: &str, id: &str) -> AppResult<()> {
    let conn = open_db(Path::new(db_path))?;
    store::client_delete(&conn, id)?;
    println!("client deleted: {}", id);
    Ok(())
}
