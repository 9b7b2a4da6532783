use crate::app_error::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientFields {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub id: String,
    pub policy_no: String,
    pub client_phone: String,
    pub client_name: String,
    pub policy_type: String,
    pub date_from: String,
    pub date_to: String,
    pub endorsement_no: String,
    pub premium_rs: f64,
    pub sum_insured: f64,
    pub location: String,
    pub remarks: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyFields {
    pub policy_no: String,
    pub client_phone: String,
    pub client_name: String,
    pub policy_type: String,
    pub date_from: String,
    pub date_to: String,
    pub endorsement_no: String,
    pub premium_rs: f64,
    pub sum_insured: f64,
    pub location: String,
    pub remarks: String,
}

fn store_error(code: &str, message: &str, details: Value) -> AppError {
    AppError::new(code, "store", message, false, details)
}

fn query_error(message: &str, e: &rusqlite::Error) -> AppError {
    store_error(
        "PB_STORE_QUERY_FAILED",
        message,
        serde_json::json!({ "error": e.to_string() }),
    )
}

fn display_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name.trim(), last_name.trim())
        .trim()
        .to_string()
}

fn client_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        full_name: row.get(3)?,
        phone: row.get(4)?,
        created_at_ms: row.get(5)?,
        updated_at_ms: row.get(6)?,
    })
}

fn policy_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Policy> {
    Ok(Policy {
        id: row.get(0)?,
        policy_no: row.get(1)?,
        client_phone: row.get(2)?,
        client_name: row.get(3)?,
        policy_type: row.get(4)?,
        date_from: row.get(5)?,
        date_to: row.get(6)?,
        endorsement_no: row.get(7)?,
        premium_rs: row.get(8)?,
        sum_insured: row.get(9)?,
        location: row.get(10)?,
        remarks: row.get(11)?,
        created_at_ms: row.get(12)?,
        updated_at_ms: row.get(13)?,
    })
}

const CLIENT_COLUMNS: &str =
    "id, first_name, last_name, full_name, phone, created_at_ms, updated_at_ms";
const POLICY_COLUMNS: &str = "id, policy_no, client_phone, client_name, policy_type, date_from, \
     date_to, endorsement_no, premium_rs, sum_insured, location, remarks, created_at_ms, \
     updated_at_ms";

pub fn client_create(conn: &Connection, fields: &ClientFields, now_ms: i64) -> AppResult<Client> {
    if fields.phone.trim().is_empty() || fields.first_name.trim().is_empty() {
        return Err(store_error(
            "PB_CLIENT_FIELDS_REQUIRED",
            "client requires first_name and phone",
            serde_json::json!({
                "first_name": fields.first_name,
                "phone": fields.phone
            }),
        ));
    }

    if let Some(existing) = client_find_by_phone(conn, &fields.phone)? {
        return Err(store_error(
            "PB_CLIENT_DUPLICATE_PHONE",
            "a client with this phone number already exists",
            serde_json::json!({
                "phone": fields.phone,
                "existing_id": existing.id,
                "existing_full_name": existing.full_name
            }),
        ));
    }

    let client = Client {
        id: Uuid::new_v4().to_string(),
        first_name: fields.first_name.clone(),
        last_name: fields.last_name.clone(),
        full_name: display_name(&fields.first_name, &fields.last_name),
        phone: fields.phone.clone(),
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    };

    conn.execute(
        "INSERT INTO clients (id, first_name, last_name, full_name, phone, created_at_ms, updated_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            client.id,
            client.first_name,
            client.last_name,
            client.full_name,
            client.phone,
            client.created_at_ms,
            client.updated_at_ms
        ],
    )
    .map_err(|e| query_error("failed to insert client", &e))?;

    Ok(client)
}

pub fn client_get(conn: &Connection, id: &str) -> AppResult<Option<Client>> {
    conn.query_row(
        &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
        [id],
        client_from_row,
    )
    .optional()
    .map_err(|e| query_error("failed to read client", &e))
}

pub fn client_find_by_phone(conn: &Connection, phone: &str) -> AppResult<Option<Client>> {
    conn.query_row(
        &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE phone = ?1"),
        [phone],
        client_from_row,
    )
    .optional()
    .map_err(|e| query_error("failed to read client by phone", &e))
}

pub fn client_list(conn: &Connection) -> AppResult<Vec<Client>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY last_name, first_name"
        ))
        .map_err(|e| query_error("failed to prepare client list query", &e))?;
    let rows = stmt
        .query_map([], client_from_row)
        .map_err(|e| query_error("failed to query clients", &e))?;
    rows.collect::<rusqlite::Result<Vec<Client>>>()
        .map_err(|e| query_error("failed to decode client row", &e))
}

pub fn client_update(
    conn: &Connection,
    id: &str,
    fields: &ClientFields,
    now_ms: i64,
) -> AppResult<Client> {
    let existing = client_get(conn, id)?.ok_or_else(|| {
        store_error(
            "PB_CLIENT_NOT_FOUND",
            "client does not exist",
            serde_json::json!({ "id": id }),
        )
    })?;

    if fields.phone.trim().is_empty() || fields.first_name.trim().is_empty() {
        return Err(store_error(
            "PB_CLIENT_FIELDS_REQUIRED",
            "client requires first_name and phone",
            serde_json::json!({
                "first_name": fields.first_name,
                "phone": fields.phone
            }),
        ));
    }

    if let Some(other) = client_find_by_phone(conn, &fields.phone)? {
        if other.id != id {
            return Err(store_error(
                "PB_CLIENT_DUPLICATE_PHONE",
                "another client with this phone number already exists",
                serde_json::json!({
                    "phone": fields.phone,
                    "existing_id": other.id,
                    "existing_full_name": other.full_name
                }),
            ));
        }
    }

    let updated = Client {
        id: existing.id,
        first_name: fields.first_name.clone(),
        last_name: fields.last_name.clone(),
        full_name: display_name(&fields.first_name, &fields.last_name),
        phone: fields.phone.clone(),
        created_at_ms: existing.created_at_ms,
        updated_at_ms: now_ms,
    };

    conn.execute(
        "UPDATE clients SET first_name = ?2, last_name = ?3, full_name = ?4, phone = ?5, updated_at_ms = ?6
         WHERE id = ?1",
        params![
            updated.id,
            updated.first_name,
            updated.last_name,
            updated.full_name,
            updated.phone,
            updated.updated_at_ms
        ],
    )
    .map_err(|e| query_error("failed to update client", &e))?;

    Ok(updated)
}

pub fn client_delete(conn: &Connection, id: &str) -> AppResult<()> {
    let existing = client_get(conn, id)?.ok_or_else(|| {
        store_error(
            "PB_CLIENT_NOT_FOUND",
            "client does not exist",
            serde_json::json!({ "id": id }),
        )
    })?;

    let linked = policy_list_by_client_phone(conn, &existing.phone)?;
    if !linked.is_empty() {
        let policy_ids: Vec<&str> = linked.iter().map(|p| p.id.as_str()).collect();
        let policy_numbers: Vec<&str> = linked.iter().map(|p| p.policy_no.as_str()).collect();
        return Err(store_error(
            "PB_CLIENT_DELETE_BLOCKED",
            "client has linked policies and cannot be deleted",
            serde_json::json!({
                "id": existing.id,
                "phone": existing.phone,
                "policy_count": linked.len(),
                "policy_ids": policy_ids,
                "policy_numbers": policy_numbers
            }),
        ));
    }

    conn.execute("DELETE FROM clients WHERE id = ?1", [id])
        .map_err(|e| query_error("failed to delete client", &e))?;
    Ok(())
}

pub fn policy_create(conn: &Connection, fields: &PolicyFields, now_ms: i64) -> AppResult<Policy> {
    if fields.policy_no.trim().is_empty() || fields.client_phone.trim().is_empty() {
        return Err(store_error(
            "PB_POLICY_FIELDS_REQUIRED",
            "policy requires policy_no and client_phone",
            serde_json::json!({
                "policy_no": fields.policy_no,
                "client_phone": fields.client_phone
            }),
        ));
    }

    if let Some(existing) = policy_find_by_number(conn, &fields.policy_no)? {
        return Err(store_error(
            "PB_POLICY_DUPLICATE_NUMBER",
            "a policy with this policy number already exists",
            serde_json::json!({
                "policy_no": fields.policy_no,
                "existing_id": existing.id
            }),
        ));
    }

    let policy = Policy {
        id: Uuid::new_v4().to_string(),
        policy_no: fields.policy_no.clone(),
        client_phone: fields.client_phone.clone(),
        client_name: fields.client_name.clone(),
        policy_type: fields.policy_type.clone(),
        date_from: fields.date_from.clone(),
        date_to: fields.date_to.clone(),
        endorsement_no: fields.endorsement_no.clone(),
        premium_rs: fields.premium_rs,
        sum_insured: fields.sum_insured,
        location: fields.location.clone(),
        remarks: fields.remarks.clone(),
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    };

    conn.execute(
        "INSERT INTO policies (id, policy_no, client_phone, client_name, policy_type, date_from,
           date_to, endorsement_no, premium_rs, sum_insured, location, remarks, created_at_ms,
           updated_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            policy.id,
            policy.policy_no,
            policy.client_phone,
            policy.client_name,
            policy.policy_type,
            policy.date_from,
            policy.date_to,
            policy.endorsement_no,
            policy.premium_rs,
            policy.sum_insured,
            policy.location,
            policy.remarks,
            policy.created_at_ms,
            policy.updated_at_ms
        ],
    )
    .map_err(|e| query_error("failed to insert policy", &e))?;

    Ok(policy)
}

pub fn policy_get(conn: &Connection, id: &str) -> AppResult<Option<Policy>> {
    conn.query_row(
        &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE id = ?1"),
        [id],
        policy_from_row,
    )
    .optional()
    .map_err(|e| query_error("failed to read policy", &e))
}

pub fn policy_find_by_number(conn: &Connection, policy_no: &str) -> AppResult<Option<Policy>> {
    conn.query_row(
        &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE policy_no = ?1"),
        [policy_no],
        policy_from_row,
    )
    .optional()
    .map_err(|e| query_error("failed to read policy by number", &e))
}

pub fn policy_list(conn: &Connection) -> AppResult<Vec<Policy>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {POLICY_COLUMNS} FROM policies ORDER BY date_to, policy_no"
        ))
        .map_err(|e| query_error("failed to prepare policy list query", &e))?;
    let rows = stmt
        .query_map([], policy_from_row)
        .map_err(|e| query_error("failed to query policies", &e))?;
    rows.collect::<rusqlite::Result<Vec<Policy>>>()
        .map_err(|e| query_error("failed to decode policy row", &e))
}

pub fn policy_list_by_client_phone(conn: &Connection, phone: &str) -> AppResult<Vec<Policy>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {POLICY_COLUMNS} FROM policies WHERE client_phone = ?1 ORDER BY date_to, policy_no"
        ))
        .map_err(|e| query_error("failed to prepare linked policy query", &e))?;
    let rows = stmt
        .query_map([phone], policy_from_row)
        .map_err(|e| query_error("failed to query linked policies", &e))?;
    rows.collect::<rusqlite::Result<Vec<Policy>>>()
        .map_err(|e| query_error("failed to decode policy row", &e))
}

pub fn policy_update(
    conn: &Connection,
    id: &str,
    fields: &PolicyFields,
    now_ms: i64,
) -> AppResult<Policy> {
    let existing = policy_get(conn, id)?.ok_or_else(|| {
        store_error(
            "PB_POLICY_NOT_FOUND",
            "policy does not exist",
            serde_json::json!({ "id": id }),
        )
    })?;

    if fields.policy_no.trim().is_empty() || fields.client_phone.trim().is_empty() {
        return Err(store_error(
            "PB_POLICY_FIELDS_REQUIRED",
            "policy requires policy_no and client_phone",
            serde_json::json!({
                "policy_no": fields.policy_no,
                "client_phone": fields.client_phone
            }),
        ));
    }

    if let Some(other) = policy_find_by_number(conn, &fields.policy_no)? {
        if other.id != id {
            return Err(store_error(
                "PB_POLICY_DUPLICATE_NUMBER",
                "another policy with this policy number already exists",
                serde_json::json!({
                    "policy_no": fields.policy_no,
                    "existing_id": other.id
                }),
            ));
        }
    }

    let updated = Policy {
        id: existing.id,
        policy_no: fields.policy_no.clone(),
        client_phone: fields.client_phone.clone(),
        client_name: fields.client_name.clone(),
        policy_type: fields.policy_type.clone(),
        date_from: fields.date_from.clone(),
        date_to: fields.date_to.clone(),
        endorsement_no: fields.endorsement_no.clone(),
        premium_rs: fields.premium_rs,
        sum_insured: fields.sum_insured,
        location: fields.location.clone(),
        remarks: fields.remarks.clone(),
        created_at_ms: existing.created_at_ms,
        updated_at_ms: now_ms,
    };

    conn.execute(
        "UPDATE policies SET policy_no = ?2, client_phone = ?3, client_name = ?4, policy_type = ?5,
           date_from = ?6, date_to = ?7, endorsement_no = ?8, premium_rs = ?9, sum_insured = ?10,
           location = ?11, remarks = ?12, updated_at_ms = ?13
         WHERE id = ?1",
        params![
            updated.id,
            updated.policy_no,
            updated.client_phone,
            updated.client_name,
            updated.policy_type,
            updated.date_from,
            updated.date_to,
            updated.endorsement_no,
            updated.premium_rs,
            updated.sum_insured,
            updated.location,
            updated.remarks,
            updated.updated_at_ms
        ],
    )
    .map_err(|e| query_error("failed to update policy", &e))?;

    Ok(updated)
}

pub fn policy_delete(conn: &Connection, id: &str) -> AppResult<()> {
    let affected = conn
        .execute("DELETE FROM policies WHERE id = ?1", [id])
        .map_err(|e| query_error("failed to delete policy", &e))?;
    if affected == 0 {
        return Err(store_error(
            "PB_POLICY_NOT_FOUND",
            "policy does not exist",
            serde_json::json!({ "id": id }),
        ));
    }
    Ok(())
}

pub fn propagate_client_phone(
    conn: &Connection,
    old_phone: &str,
    new_phone: &str,
    new_client_name: &str,
    now_ms: i64,
) -> AppResult<usize> {
    conn.execute(
        "UPDATE policies SET client_phone = ?2, client_name = ?3, updated_at_ms = ?4
         WHERE client_phone = ?1",
        params![old_phone, new_phone, new_client_name, now_ms],
    )
    .map_err(|e| query_error("failed to repoint linked policies", &e))
}
