use crate::app_error::{AppError, AppResult};
use crate::backup_transport::BlobStore;
use crate::integrity;
use crate::store::{self, Client, ClientFields, Policy, PolicyFields};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const BACKUP_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupClientV1 {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupPolicyV1 {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub policy_no: String,
    #[serde(default)]
    pub client_phone: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub policy_type: String,
    #[serde(default)]
    pub date_from: String,
    #[serde(default)]
    pub date_to: String,
    #[serde(default)]
    pub endorsement_no: String,
    #[serde(default)]
    pub premium_rs: f64,
    #[serde(default)]
    pub sum_insured: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
}

fn default_backup_schema_version() -> u32 {
    BACKUP_SCHEMA_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupSnapshotV1 {
    #[serde(default = "default_backup_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub clients: Vec<BackupClientV1>,
    #[serde(default)]
    pub policies: Vec<BackupPolicyV1>,
    #[serde(default)]
    pub last_sync: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncOutcomeV1 {
    pub schema_version: u32,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients_imported: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies_imported: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients_exported: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies_exported: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Import,
    Export,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupInfoV1 {
    pub schema_version: u32,
    pub has_backup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_count: Option<usize>,
}

fn sync_error(code: &str, message: &str, details: serde_json::Value) -> AppError {
    AppError::new(code, "sync", message, false, details)
}

fn require_owner(owner: &str) -> AppResult<()> {
    if owner.trim().is_empty() {
        return Err(sync_error(
            "PB_SYNC_OWNER_REQUIRED",
            "owner identifier is required for sync",
            serde_json::json!({}),
        ));
    }
    Ok(())
}

fn rfc3339_ms(now_ms: i64) -> AppResult<String> {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(now_ms)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .ok_or_else(|| {
            sync_error(
                "PB_SYNC_TIMESTAMP_INVALID",
                "sync timestamp is out of range",
                serde_json::json!({ "now_ms": now_ms }),
            )
        })
}

fn import_outcome(clients_imported: usize, policies_imported: usize, message: String) -> SyncOutcomeV1 {
    SyncOutcomeV1 {
        schema_version: 1,
        success: true,
        message,
        clients_imported: Some(clients_imported),
        policies_imported: Some(policies_imported),
        clients_exported: None,
        policies_exported: None,
    }
}

fn export_outcome(clients_exported: usize, policies_exported: usize) -> SyncOutcomeV1 {
    SyncOutcomeV1 {
        schema_version: 1,
        success: true,
        message: format!(
            "backed up {} clients and {} policies to cloud",
            clients_exported, policies_exported
        ),
        clients_imported: None,
        policies_imported: None,
        clients_exported: Some(clients_exported),
        policies_exported: Some(policies_exported),
    }
}

// Transport and payload failures never escape the sync surface; the
// caller keeps working on local data.
fn degrade(result: AppResult<SyncOutcomeV1>) -> SyncOutcomeV1 {
    match result {
        Ok(outcome) => outcome,
        Err(err) => SyncOutcomeV1 {
            schema_version: 1,
            success: false,
            message: format!("sync failed: {}", err.message),
            clients_imported: None,
            policies_imported: None,
            clients_exported: None,
            policies_exported: None,
        },
    }
}

impl From<&Client> for BackupClientV1 {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.clone(),
            first_name: client.first_name.clone(),
            last_name: client.last_name.clone(),
            full_name: client.full_name.clone(),
            phone: client.phone.clone(),
            created_at_ms: client.created_at_ms,
            updated_at_ms: client.updated_at_ms,
        }
    }
}

impl From<&Policy> for BackupPolicyV1 {
    fn from(policy: &Policy) -> Self {
        Self {
            id: policy.id.clone(),
            policy_no: policy.policy_no.clone(),
            client_phone: policy.client_phone.clone(),
            client_name: policy.client_name.clone(),
            policy_type: policy.policy_type.clone(),
            date_from: policy.date_from.clone(),
            date_to: policy.date_to.clone(),
            endorsement_no: policy.endorsement_no.clone(),
            premium_rs: policy.premium_rs,
            sum_insured: policy.sum_insured,
            location: policy.location.clone(),
            remarks: policy.remarks.clone(),
            created_at_ms: policy.created_at_ms,
            updated_at_ms: policy.updated_at_ms,
        }
    }
}

fn parse_snapshot(raw: &str) -> AppResult<BackupSnapshotV1> {
    let snapshot: BackupSnapshotV1 = serde_json::from_str(raw).map_err(|e| {
        sync_error(
            "PB_SYNC_BACKUP_MALFORMED",
            "backup blob does not parse as a backup snapshot",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;
    if snapshot.schema_version != BACKUP_SCHEMA_VERSION {
        return Err(sync_error(
            "PB_SYNC_BACKUP_UNSUPPORTED_VERSION",
            "backup snapshot schema_version is not supported",
            serde_json::json!({
                "expected": BACKUP_SCHEMA_VERSION,
                "actual": snapshot.schema_version
            }),
        ));
    }
    Ok(snapshot)
}

// All clients are imported before any policy so the policy-side owner
// lookup always sees owners that arrived in the same snapshot.
fn import_snapshot(
    conn: &Connection,
    snapshot: &BackupSnapshotV1,
    now_ms: i64,
) -> AppResult<(usize, usize)> {
    let mut clients_imported = 0;
    for row in &snapshot.clients {
        if row.phone.trim().is_empty() || row.first_name.trim().is_empty() {
            continue;
        }
        let fields = ClientFields {
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            phone: row.phone.clone(),
        };
        match store::client_create(conn, &fields, now_ms) {
            Ok(_) => clients_imported += 1,
            Err(err) if err.code == "PB_CLIENT_DUPLICATE_PHONE" => {}
            Err(err) => return Err(err),
        }
    }

    let mut policies_imported = 0;
    for row in &snapshot.policies {
        if row.policy_no.trim().is_empty() || row.client_phone.trim().is_empty() {
            continue;
        }
        let fields = PolicyFields {
            policy_no: row.policy_no.clone(),
            client_phone: row.client_phone.clone(),
            client_name: row.client_name.clone(),
            policy_type: row.policy_type.clone(),
            date_from: row.date_from.clone(),
            date_to: row.date_to.clone(),
            endorsement_no: row.endorsement_no.clone(),
            premium_rs: row.premium_rs,
            sum_insured: row.sum_insured,
            location: row.location.clone(),
            remarks: row.remarks.clone(),
        };
        match integrity::policy_add(conn, &fields, now_ms) {
            Ok(_) => policies_imported += 1,
            Err(err) if err.code == "PB_POLICY_DUPLICATE_NUMBER" => {}
            Err(err) => return Err(err),
        }
    }

    Ok((clients_imported, policies_imported))
}

fn import_from_backup(
    conn: &Connection,
    blobs: &dyn BlobStore,
    owner: &str,
    now_ms: i64,
) -> AppResult<SyncOutcomeV1> {
    let Some(raw) = blobs.get_blob(owner)? else {
        return Ok(import_outcome(
            0,
            0,
            "no cloud backup found - starting fresh".to_string(),
        ));
    };

    let snapshot = parse_snapshot(&raw)?;
    let (clients_imported, policies_imported) = import_snapshot(conn, &snapshot, now_ms)?;

    Ok(import_outcome(
        clients_imported,
        policies_imported,
        format!(
            "imported {} clients and {} policies from cloud backup",
            clients_imported, policies_imported
        ),
    ))
}

fn export_to_backup(
    blobs: &dyn BlobStore,
    owner: &str,
    clients: &[Client],
    policies: &[Policy],
    now_ms: i64,
) -> AppResult<SyncOutcomeV1> {
    let snapshot = BackupSnapshotV1 {
        schema_version: BACKUP_SCHEMA_VERSION,
        clients: clients.iter().map(BackupClientV1::from).collect(),
        policies: policies.iter().map(BackupPolicyV1::from).collect(),
        last_sync: rfc3339_ms(now_ms)?,
    };
    let payload = serde_json::to_string_pretty(&snapshot).map_err(|e| {
        sync_error(
            "PB_SYNC_BACKUP_MALFORMED",
            "failed serializing backup snapshot",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;
    blobs.put_blob(owner, &payload)?;
    Ok(export_outcome(clients.len(), policies.len()))
}

pub fn sync_on_startup(
    conn: &Connection,
    blobs: &dyn BlobStore,
    owner: &str,
    now_ms: i64,
) -> AppResult<SyncOutcomeV1> {
    require_owner(owner)?;

    let result = (|| {
        let clients = store::client_list(conn)?;
        let policies = store::policy_list(conn)?;
        if clients.is_empty() && policies.is_empty() {
            import_from_backup(conn, blobs, owner, now_ms)
        } else {
            // Local data wins wholesale: the remote blob is replaced, not
            // merged, so remote-only edits from another device are lost.
            export_to_backup(blobs, owner, &clients, &policies, now_ms)
        }
    })();

    Ok(degrade(result))
}

pub fn manual_sync(
    conn: &Connection,
    blobs: &dyn BlobStore,
    owner: &str,
    direction: SyncDirection,
    now_ms: i64,
) -> AppResult<SyncOutcomeV1> {
    require_owner(owner)?;

    let result = match direction {
        SyncDirection::Import => import_from_backup(conn, blobs, owner, now_ms),
        SyncDirection::Export => (|| {
            let clients = store::client_list(conn)?;
            let policies = store::policy_list(conn)?;
            export_to_backup(blobs, owner, &clients, &policies, now_ms)
        })(),
    };

    Ok(degrade(result))
}

pub fn backup_info(blobs: &dyn BlobStore, owner: &str) -> AppResult<BackupInfoV1> {
    require_owner(owner)?;

    let absent = BackupInfoV1 {
        schema_version: 1,
        has_backup: false,
        last_sync: None,
        client_count: None,
        policy_count: None,
    };

    let raw = match blobs.get_blob(owner) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Ok(absent),
        Err(_) => return Ok(absent),
    };

    match parse_snapshot(&raw) {
        Ok(snapshot) => Ok(BackupInfoV1 {
            schema_version: 1,
            has_backup: true,
            last_sync: if snapshot.last_sync.is_empty() {
                None
            } else {
                Some(snapshot.last_sync)
            },
            client_count: Some(snapshot.clients.len()),
            policy_count: Some(snapshot.policies.len()),
        }),
        Err(_) => Ok(absent),
    }
}
