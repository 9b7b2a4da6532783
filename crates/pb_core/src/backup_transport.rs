use crate::app_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackupTargetUri {
    FilePath { path: String },
    S3 { bucket: String, prefix: String },
}

impl BackupTargetUri {
    pub fn parse(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Err(AppError::new(
                "PB_BACKUP_TARGET_INVALID",
                "backup",
                "backup target is required",
                false,
                serde_json::json!({ "target": raw }),
            ));
        }

        if let Some(rest) = raw.strip_prefix("s3://") {
            let mut parts = rest.splitn(2, '/');
            let bucket = parts.next().unwrap_or_default().trim();
            let prefix = parts.next().unwrap_or_default().trim_matches('/');
            if bucket.is_empty() {
                return Err(AppError::new(
                    "PB_BACKUP_TARGET_INVALID",
                    "backup",
                    "s3 target missing bucket",
                    false,
                    serde_json::json!({ "target": raw }),
                ));
            }
            return Ok(BackupTargetUri::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            });
        }

        if let Some(rest) = raw.strip_prefix("file://") {
            if rest.trim().is_empty() {
                return Err(AppError::new(
                    "PB_BACKUP_TARGET_INVALID",
                    "backup",
                    "file target missing path",
                    false,
                    serde_json::json!({ "target": raw }),
                ));
            }
            return Ok(BackupTargetUri::FilePath {
                path: rest.to_string(),
            });
        }

        if raw.contains("://") {
            return Err(AppError::new(
                "PB_BACKUP_TARGET_UNSUPPORTED",
                "backup",
                "unsupported backup target scheme",
                false,
                serde_json::json!({ "target": raw }),
            ));
        }

        Ok(BackupTargetUri::FilePath {
            path: raw.to_string(),
        })
    }

    pub fn display(&self) -> String {
        match self {
            BackupTargetUri::FilePath { path } => path.clone(),
            BackupTargetUri::S3 { bucket, prefix } => {
                if prefix.is_empty() {
                    format!("s3://{}", bucket)
                } else {
                    format!("s3://{}/{}", bucket, prefix)
                }
            }
        }
    }
}

// One blob per owner; the owner identifier becomes part of the object key.
pub fn blob_leaf(owner: &str) -> AppResult<String> {
    let owner = owner.trim();
    if owner.is_empty() || owner.contains('/') || owner.contains('\\') || owner.contains("..") {
        return Err(AppError::new(
            "PB_BACKUP_OWNER_INVALID",
            "backup",
            "owner identifier is empty or not usable as a blob key",
            false,
            serde_json::json!({ "owner": owner }),
        ));
    }
    Ok(format!("cloud_backup_{}.json", owner))
}

pub trait BlobStore: Send + Sync {
    fn target(&self) -> BackupTargetUri;
    fn get_blob(&self, owner: &str) -> AppResult<Option<String>>;
    fn put_blob(&self, owner: &str, payload: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    pub root: PathBuf,
}

impl FsBlobStore {
    pub fn new(path: &Path) -> Self {
        Self {
            root: path.to_path_buf(),
        }
    }
}

impl BlobStore for FsBlobStore {
    fn target(&self) -> BackupTargetUri {
        BackupTargetUri::FilePath {
            path: self.root.display().to_string(),
        }
    }

    fn get_blob(&self, owner: &str) -> AppResult<Option<String>> {
        let blob_path = self.root.join(blob_leaf(owner)?);
        if !blob_path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&blob_path).map_err(|e| {
            AppError::new(
                "PB_BACKUP_TARGET_INVALID",
                "backup",
                "failed reading backup blob file",
                false,
                serde_json::json!({ "error": e.to_string(), "path": blob_path }),
            )
        })?;
        String::from_utf8(bytes).map(Some).map_err(|e| {
            AppError::new(
                "PB_BACKUP_TARGET_INVALID",
                "backup",
                "backup blob file is not valid utf8",
                false,
                serde_json::json!({ "error": e.to_string(), "path": blob_path }),
            )
        })
    }

    fn put_blob(&self, owner: &str, payload: &str) -> AppResult<()> {
        let blob_path = self.root.join(blob_leaf(owner)?);
        std::fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new(
                "PB_BACKUP_TARGET_INVALID",
                "backup",
                "failed creating backup target root",
                false,
                serde_json::json!({ "error": e.to_string(), "path": self.root }),
            )
        })?;
        std::fs::write(&blob_path, payload.as_bytes()).map_err(|e| {
            AppError::new(
                "PB_BACKUP_TARGET_INVALID",
                "backup",
                "failed writing backup blob file",
                false,
                serde_json::json!({ "error": e.to_string(), "path": blob_path }),
            )
        })?;
        Ok(())
    }
}

pub fn blob_store_for_target(target: &str) -> AppResult<Box<dyn BlobStore>> {
    match BackupTargetUri::parse(target)? {
        BackupTargetUri::FilePath { path } => Ok(Box::new(FsBlobStore::new(Path::new(&path)))),
        BackupTargetUri::S3 { bucket, prefix } => {
            Ok(Box::new(crate::backup_s3::S3BlobStore::new(bucket, prefix)))
        }
    }
}
