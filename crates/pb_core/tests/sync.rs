use pb_core::app_error::{AppError, AppResult};
use pb_core::backup_transport::{blob_store_for_target, BackupTargetUri, BlobStore, FsBlobStore};
use pb_core::db::open_db;
use pb_core::integrity::policy_add;
use pb_core::store::{client_create, client_list, policy_list, ClientFields, PolicyFields};
use pb_core::sync::{
    backup_info, manual_sync, sync_on_startup, BackupSnapshotV1, SyncDirection,
};
use std::sync::{Mutex, OnceLock};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn scratch() -> (std::path::PathBuf, rusqlite::Connection) {
    let root = tempfile::tempdir().expect("tempdir").keep();
    let conn = open_db(&root.join("db/policybook.sqlite")).expect("open db");
    (root, conn)
}

fn client_fields(first_name: &str, phone: &str) -> ClientFields {
    ClientFields {
        first_name: first_name.to_string(),
        last_name: "Sharma".to_string(),
        phone: phone.to_string(),
    }
}

fn policy_fields(policy_no: &str, client_phone: &str) -> PolicyFields {
    PolicyFields {
        policy_no: policy_no.to_string(),
        client_phone: client_phone.to_string(),
        client_name: String::new(),
        policy_type: "Motor".to_string(),
        date_from: "2025-01-01".to_string(),
        date_to: "2026-01-01".to_string(),
        endorsement_no: "E-9".to_string(),
        premium_rs: 5200.0,
        sum_insured: 400000.0,
        location: "Pune".to_string(),
        remarks: "renewal due".to_string(),
    }
}

struct UnreachableBlobStore;

impl BlobStore for UnreachableBlobStore {
    fn target(&self) -> BackupTargetUri {
        BackupTargetUri::S3 {
            bucket: "down".to_string(),
            prefix: String::new(),
        }
    }

    fn get_blob(&self, _owner: &str) -> AppResult<Option<String>> {
        Err(AppError::new(
            "PB_BACKUP_NETWORK_FAILED",
            "backup",
            "remote unreachable",
            true,
            serde_json::json!({}),
        ))
    }

    fn put_blob(&self, _owner: &str, _payload: &str) -> AppResult<()> {
        Err(AppError::new(
            "PB_BACKUP_NETWORK_FAILED",
            "backup",
            "remote unreachable",
            true,
            serde_json::json!({}),
        ))
    }
}

#[test]
fn startup_with_empty_store_and_no_blob_reports_fresh_start() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));

    let outcome = sync_on_startup(&conn, &blobs, "agent@example.com", 100).expect("startup");
    assert!(outcome.success);
    assert_eq!(outcome.clients_imported, Some(0));
    assert_eq!(outcome.policies_imported, Some(0));
    assert!(outcome.message.contains("no cloud backup found"));
}

#[test]
fn startup_with_local_data_exports_the_whole_store() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));

    client_create(&conn, &client_fields("Asha", "9811100001"), 10).expect("client");
    client_create(&conn, &client_fields("Ravi", "9811100002"), 11).expect("client");
    policy_add(&conn, &policy_fields("POL-001", "9811100001"), 12).expect("policy");
    policy_add(&conn, &policy_fields("POL-002", "9811100001"), 13).expect("policy");
    policy_add(&conn, &policy_fields("POL-003", "9811100002"), 14).expect("policy");

    let outcome = sync_on_startup(&conn, &blobs, "agent@example.com", 100).expect("startup");
    assert!(outcome.success);
    assert_eq!(outcome.clients_exported, Some(2));
    assert_eq!(outcome.policies_exported, Some(3));
    assert_eq!(outcome.clients_imported, None);

    let raw = blobs
        .get_blob("agent@example.com")
        .expect("get blob")
        .expect("blob present");
    let snapshot: BackupSnapshotV1 = serde_json::from_str(&raw).expect("snapshot parses");
    assert_eq!(snapshot.clients.len(), 2);
    assert_eq!(snapshot.policies.len(), 3);
    assert_eq!(snapshot.last_sync, "1970-01-01T00:00:00.100Z");
}

#[test]
fn export_then_import_into_empty_store_preserves_natural_keys_and_fields() {
    let (root, conn_a) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));

    let original = client_create(&conn_a, &client_fields("Asha", "9811100001"), 10).expect("client");
    policy_add(&conn_a, &policy_fields("POL-001", "9811100001"), 11).expect("policy");
    manual_sync(&conn_a, &blobs, "agent@example.com", SyncDirection::Export, 100).expect("export");

    let (_root_b, conn_b) = scratch();
    let outcome =
        manual_sync(&conn_b, &blobs, "agent@example.com", SyncDirection::Import, 200).expect("import");
    assert!(outcome.success);
    assert_eq!(outcome.clients_imported, Some(1));
    assert_eq!(outcome.policies_imported, Some(1));

    let clients = client_list(&conn_b).expect("clients");
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].phone, "9811100001");
    assert_eq!(clients[0].full_name, "Asha Sharma");
    // Ids are regenerated on import; the natural key is what survives.
    assert_ne!(clients[0].id, original.id);

    let policies = policy_list(&conn_b).expect("policies");
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].policy_no, "POL-001");
    assert_eq!(policies[0].client_phone, "9811100001");
    assert_eq!(policies[0].policy_type, "Motor");
    assert_eq!(policies[0].endorsement_no, "E-9");
    assert_eq!(policies[0].premium_rs, 5200.0);
    assert_eq!(policies[0].sum_insured, 400000.0);
    assert_eq!(policies[0].location, "Pune");
    assert_eq!(policies[0].remarks, "renewal due");
}

#[test]
fn import_of_malformed_blob_fails_without_touching_the_store() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));
    blobs
        .put_blob("agent@example.com", "{not json")
        .expect("seed malformed blob");

    let outcome =
        manual_sync(&conn, &blobs, "agent@example.com", SyncDirection::Import, 100).expect("import");
    assert!(!outcome.success);
    assert!(outcome.message.contains("sync failed"));
    assert!(client_list(&conn).expect("clients").is_empty());
    assert!(policy_list(&conn).expect("policies").is_empty());
}

#[test]
fn import_skips_rows_missing_required_fields() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));
    let payload = serde_json::json!({
        "schema_version": 1,
        "clients": [
            { "first_name": "Asha", "last_name": "Sharma", "phone": "9811100001" },
            { "first_name": "", "phone": "9811100002" },
            { "first_name": "Ravi", "phone": "" }
        ],
        "policies": [
            { "policy_no": "POL-001", "client_phone": "9811100001", "date_to": "2026-01-01" },
            { "policy_no": "", "client_phone": "9811100001" }
        ],
        "last_sync": "2025-06-01T00:00:00.000Z"
    });
    blobs
        .put_blob("agent@example.com", &payload.to_string())
        .expect("seed blob");

    let outcome =
        manual_sync(&conn, &blobs, "agent@example.com", SyncDirection::Import, 100).expect("import");
    assert!(outcome.success);
    assert_eq!(outcome.clients_imported, Some(1));
    assert_eq!(outcome.policies_imported, Some(1));
}

#[test]
fn import_auto_creates_owners_missing_from_the_snapshot() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));
    let payload = serde_json::json!({
        "schema_version": 1,
        "clients": [],
        "policies": [
            { "policy_no": "POL-001", "client_phone": "9811100007", "date_to": "2026-01-01" }
        ],
        "last_sync": "2025-06-01T00:00:00.000Z"
    });
    blobs
        .put_blob("agent@example.com", &payload.to_string())
        .expect("seed blob");

    let outcome =
        manual_sync(&conn, &blobs, "agent@example.com", SyncDirection::Import, 100).expect("import");
    assert!(outcome.success);
    assert_eq!(outcome.clients_imported, Some(0));
    assert_eq!(outcome.policies_imported, Some(1));

    let clients = client_list(&conn).expect("clients");
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].phone, "9811100007");
    assert_eq!(clients[0].first_name, "New Client");
}

#[test]
fn startup_with_both_sides_non_empty_overwrites_the_remote() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));

    let stale = serde_json::json!({
        "schema_version": 1,
        "clients": [
            { "first_name": "Old", "last_name": "Remote", "phone": "9811109999" }
        ],
        "policies": [],
        "last_sync": "2025-01-01T00:00:00.000Z"
    });
    blobs
        .put_blob("agent@example.com", &stale.to_string())
        .expect("seed remote");

    client_create(&conn, &client_fields("Asha", "9811100001"), 10).expect("client");

    let outcome = sync_on_startup(&conn, &blobs, "agent@example.com", 100).expect("startup");
    assert!(outcome.success);
    assert_eq!(outcome.clients_exported, Some(1));

    let raw = blobs
        .get_blob("agent@example.com")
        .expect("get blob")
        .expect("blob present");
    let snapshot: BackupSnapshotV1 = serde_json::from_str(&raw).expect("snapshot parses");
    assert_eq!(snapshot.clients.len(), 1);
    assert_eq!(snapshot.clients[0].phone, "9811100001");
}

#[test]
fn transport_failures_degrade_to_a_failure_outcome() {
    let (_root, conn) = scratch();

    let outcome =
        sync_on_startup(&conn, &UnreachableBlobStore, "agent@example.com", 100).expect("startup");
    assert!(!outcome.success);
    assert!(outcome.message.contains("sync failed"));

    client_create(&conn, &client_fields("Asha", "9811100001"), 10).expect("client");
    let outcome = manual_sync(
        &conn,
        &UnreachableBlobStore,
        "agent@example.com",
        SyncDirection::Export,
        200,
    )
    .expect("manual export");
    assert!(!outcome.success);
}

#[test]
fn empty_owner_is_rejected_before_any_transport_call() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));

    let err = sync_on_startup(&conn, &blobs, "  ", 100).expect_err("expected owner rejection");
    assert_eq!(err.code, "PB_SYNC_OWNER_REQUIRED");

    let err = backup_info(&blobs, "").expect_err("expected owner rejection");
    assert_eq!(err.code, "PB_SYNC_OWNER_REQUIRED");
}

#[test]
fn backup_info_reports_counts_and_degrades_on_bad_blobs() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));

    let info = backup_info(&blobs, "agent@example.com").expect("info");
    assert!(!info.has_backup);
    assert_eq!(info.client_count, None);

    client_create(&conn, &client_fields("Asha", "9811100001"), 10).expect("client");
    policy_add(&conn, &policy_fields("POL-001", "9811100001"), 11).expect("policy");
    manual_sync(&conn, &blobs, "agent@example.com", SyncDirection::Export, 100).expect("export");

    let info = backup_info(&blobs, "agent@example.com").expect("info");
    assert!(info.has_backup);
    assert_eq!(info.client_count, Some(1));
    assert_eq!(info.policy_count, Some(1));
    assert_eq!(info.last_sync.as_deref(), Some("1970-01-01T00:00:00.100Z"));

    blobs
        .put_blob("agent@example.com", "{not json")
        .expect("seed malformed blob");
    let info = backup_info(&blobs, "agent@example.com").expect("info");
    assert!(!info.has_backup);
}

#[test]
fn backup_target_uri_parses_schemes_and_rejects_unknown_ones() {
    let parsed = BackupTargetUri::parse("file:///tmp/backups").expect("file uri");
    assert_eq!(
        parsed,
        BackupTargetUri::FilePath {
            path: "/tmp/backups".to_string()
        }
    );

    let parsed = BackupTargetUri::parse("s3://demo-bucket/pb").expect("s3 uri");
    assert_eq!(
        parsed,
        BackupTargetUri::S3 {
            bucket: "demo-bucket".to_string(),
            prefix: "pb".to_string()
        }
    );

    let err = BackupTargetUri::parse("ftp://nope").expect_err("unsupported scheme");
    assert_eq!(err.code, "PB_BACKUP_TARGET_UNSUPPORTED");

    let err = BackupTargetUri::parse("   ").expect_err("empty target");
    assert_eq!(err.code, "PB_BACKUP_TARGET_INVALID");
}

#[test]
fn owner_identifiers_with_path_separators_are_rejected() {
    let (root, conn) = scratch();
    let blobs = FsBlobStore::new(&root.join("cloud"));

    // The invalid owner surfaces through the degraded outcome, not a panic.
    let outcome =
        manual_sync(&conn, &blobs, "../escape", SyncDirection::Import, 100).expect("import");
    assert!(!outcome.success);
}

#[test]
fn s3_emulated_target_round_trips_a_backup() {
    let _guard = env_lock().lock().expect("env lock");
    let root = tempfile::tempdir().expect("tempdir").keep();
    let emulated_s3 = root.join("emulated-s3");
    std::env::set_var(
        "PB_BACKUP_S3_EMULATE_ROOT",
        emulated_s3.to_string_lossy().as_ref(),
    );

    let conn = open_db(&root.join("db/policybook.sqlite")).expect("open db");
    client_create(&conn, &client_fields("Asha", "9811100001"), 10).expect("client");
    policy_add(&conn, &policy_fields("POL-001", "9811100001"), 11).expect("policy");

    let blobs = blob_store_for_target("s3://demo-bucket/pb").expect("s3 store");
    let outcome = manual_sync(
        &conn,
        blobs.as_ref(),
        "agent@example.com",
        SyncDirection::Export,
        100,
    )
    .expect("export");
    assert!(outcome.success);
    assert!(emulated_s3
        .join("demo-bucket/pb/cloud_backup_agent@example.com.json")
        .exists());

    let pull_conn = open_db(&root.join("db_pull/policybook.sqlite")).expect("open pull db");
    let outcome = manual_sync(
        &pull_conn,
        blobs.as_ref(),
        "agent@example.com",
        SyncDirection::Import,
        200,
    )
    .expect("import");
    assert!(outcome.success);
    assert_eq!(outcome.clients_imported, Some(1));
    assert_eq!(outcome.policies_imported, Some(1));

    std::env::remove_var("PB_BACKUP_S3_EMULATE_ROOT");
}
