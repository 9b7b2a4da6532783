use crate::app_error::{AppError, AppResult};
use crate::store::{self, Client, ClientFields, Policy, PolicyFields};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_FIRST_NAME: &str = "New Client";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicySaveV1 {
    pub policy: Policy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_client: Option<Client>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientEditOutcomeV1 {
    Applied {
        client: Client,
    },
    PendingConfirmation {
        old_phone: String,
        new_phone: String,
        affected_policy_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientEditAppliedV1 {
    pub client: Client,
    pub policies_updated: usize,
}

fn integrity_error(code: &str, message: &str, details: serde_json::Value) -> AppError {
    AppError::new(code, "integrity", message, false, details)
}

// The only implicit creation path in the system: a policy pointed at an
// unknown phone gets a placeholder owner the user can rename later.
fn resolve_owner(
    conn: &Connection,
    client_phone: &str,
    now_ms: i64,
) -> AppResult<(Client, Option<Client>)> {
    if let Some(existing) = store::client_find_by_phone(conn, client_phone)? {
        return Ok((existing, None));
    }
    let created = store::client_create(
        conn,
        &ClientFields {
            first_name: PLACEHOLDER_FIRST_NAME.to_string(),
            last_name: String::new(),
            phone: client_phone.to_string(),
        },
        now_ms,
    )?;
    Ok((created.clone(), Some(created)))
}

pub fn policy_add(conn: &Connection, fields: &PolicyFields, now_ms: i64) -> AppResult<PolicySaveV1> {
    if fields.policy_no.trim().is_empty() || fields.client_phone.trim().is_empty() {
        return Err(integrity_error(
            "PB_POLICY_FIELDS_REQUIRED",
            "policy requires policy_no and client_phone",
            serde_json::json!({
                "policy_no": fields.policy_no,
                "client_phone": fields.client_phone
            }),
        ));
    }

    let (owner, created_client) = resolve_owner(conn, &fields.client_phone, now_ms)?;
    let effective = PolicyFields {
        client_name: owner.full_name.clone(),
        ..fields.clone()
    };
    let policy = store::policy_create(conn, &effective, now_ms)?;
    Ok(PolicySaveV1 {
        policy,
        created_client,
    })
}

pub fn policy_edit(
    conn: &Connection,
    policy_id: &str,
    fields: &PolicyFields,
    now_ms: i64,
) -> AppResult<PolicySaveV1> {
    if fields.policy_no.trim().is_empty() || fields.client_phone.trim().is_empty() {
        return Err(integrity_error(
            "PB_POLICY_FIELDS_REQUIRED",
            "policy requires policy_no and client_phone",
            serde_json::json!({
                "policy_no": fields.policy_no,
                "client_phone": fields.client_phone
            }),
        ));
    }

    let (owner, created_client) = resolve_owner(conn, &fields.client_phone, now_ms)?;
    let effective = PolicyFields {
        client_name: owner.full_name.clone(),
        ..fields.clone()
    };
    let policy = store::policy_update(conn, policy_id, &effective, now_ms)?;
    Ok(PolicySaveV1 {
        policy,
        created_client,
    })
}

pub fn client_edit(
    conn: &Connection,
    client_id: &str,
    fields: &ClientFields,
    now_ms: i64,
) -> AppResult<ClientEditOutcomeV1> {
    let existing = store::client_get(conn, client_id)?.ok_or_else(|| {
        integrity_error(
            "PB_CLIENT_NOT_FOUND",
            "client does not exist",
            serde_json::json!({ "id": client_id }),
        )
    })?;

    if existing.phone != fields.phone {
        let linked = store::policy_list_by_client_phone(conn, &existing.phone)?;
        if !linked.is_empty() {
            // Duplicate checks must run before offering the confirmation,
            // otherwise a confirm could fail after the caller already
            // committed to the rename.
            if let Some(other) = store::client_find_by_phone(conn, &fields.phone)? {
                if other.id != client_id {
                    return Err(integrity_error(
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
            return Ok(ClientEditOutcomeV1::PendingConfirmation {
                old_phone: existing.phone,
                new_phone: fields.phone.clone(),
                affected_policy_ids: linked.into_iter().map(|p| p.id).collect(),
            });
        }
    }

    let client = store::client_update(conn, client_id, fields, now_ms)?;
    Ok(ClientEditOutcomeV1::Applied { client })
}

pub fn client_edit_confirm(
    conn: &Connection,
    client_id: &str,
    fields: &ClientFields,
    propagate: bool,
    now_ms: i64,
) -> AppResult<ClientEditAppliedV1> {
    let existing = store::client_get(conn, client_id)?.ok_or_else(|| {
        integrity_error(
            "PB_CLIENT_NOT_FOUND",
            "client does not exist",
            serde_json::json!({ "id": client_id }),
        )
    })?;

    let old_phone = existing.phone.clone();
    let client = store::client_update(conn, client_id, fields, now_ms)?;

    let policies_updated = if propagate && old_phone != client.phone {
        store::propagate_client_phone(conn, &old_phone, &client.phone, &client.full_name, now_ms)?
    } else {
        0
    };

    Ok(ClientEditAppliedV1 {
        client,
        policies_updated,
    })
}
