use crate::app_error::{AppError, AppResult};
use crate::backup_transport::{blob_leaf, BackupTargetUri, BlobStore};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct S3BlobStore {
    pub bucket: String,
    pub prefix: String,
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub emulate_root: Option<PathBuf>,
}

impl S3BlobStore {
    pub fn new(bucket: String, prefix: String) -> Self {
        Self {
            bucket,
            prefix,
            endpoint_url: std::env::var("PB_BACKUP_S3_ENDPOINT").ok(),
            region: std::env::var("PB_BACKUP_S3_REGION").ok(),
            emulate_root: std::env::var("PB_BACKUP_S3_EMULATE_ROOT")
                .ok()
                .map(PathBuf::from),
        }
    }

    pub fn key_for(&self, leaf: &str) -> String {
        if self.prefix.is_empty() {
            leaf.to_string()
        } else {
            format!("{}/{}", self.prefix.trim_matches('/'), leaf)
        }
    }

    fn emulated_path(&self, leaf: &str) -> Option<PathBuf> {
        self.emulate_root.as_ref().map(|root| {
            let mut p = root.join(&self.bucket);
            if !self.prefix.is_empty() {
                p = p.join(self.prefix.trim_matches('/'));
            }
            p.join(leaf)
        })
    }

    fn classify_remote_error(message: &str) -> (&'static str, bool) {
        let lower = message.to_ascii_lowercase();
        if lower.contains("credential")
            || lower.contains("accessdenied")
            || lower.contains("signature")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("403")
        {
            ("PB_BACKUP_AUTH_FAILED", false)
        } else {
            ("PB_BACKUP_NETWORK_FAILED", true)
        }
    }

    fn map_remote_error(&self, message: String, operation: &str, key: &str) -> AppError {
        let (code, retryable) = Self::classify_remote_error(&message);
        AppError::new(
            code,
            "backup",
            &format!("failed {operation} s3 object"),
            retryable,
            serde_json::json!({
                "error": message,
                "bucket": self.bucket,
                "key": key
            }),
        )
    }

    fn run_async<T>(&self, fut: impl std::future::Future<Output = AppResult<T>>) -> AppResult<T> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                AppError::new(
                    "PB_BACKUP_NETWORK_FAILED",
                    "backup",
                    "failed creating async runtime for s3 backup",
                    true,
                    serde_json::json!({ "error": e.to_string() }),
                )
            })?;
        rt.block_on(fut)
    }

    async fn build_client(
        endpoint_url: Option<String>,
        region: Option<String>,
    ) -> AppResult<aws_sdk_s3::Client> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region));
        }
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let cfg = loader.load().await;
        Ok(aws_sdk_s3::Client::new(&cfg))
    }

    fn is_not_found(message: &str) -> bool {
        message.contains("NoSuchKey")
            || message.contains("NotFound")
            || message.contains("status: 404")
    }

    pub fn read_bytes(&self, leaf: &str) -> AppResult<Option<Vec<u8>>> {
        if let Some(path) = self.emulated_path(leaf) {
            if !path.exists() {
                return Ok(None);
            }
            let bytes = std::fs::read(&path).map_err(|e| {
                AppError::new(
                    "PB_BACKUP_TARGET_INVALID",
                    "backup",
                    "failed reading emulated s3 object",
                    false,
                    serde_json::json!({ "error": e.to_string(), "path": path }),
                )
            })?;
            return Ok(Some(bytes));
        }

        let bucket = self.bucket.clone();
        let key = self.key_for(leaf);
        let endpoint = self.endpoint_url.clone();
        let region = self.region.clone();
        let this = self.clone();
        self.run_async(async move {
            let client = Self::build_client(endpoint, region).await?;
            let out = client.get_object().bucket(&bucket).key(&key).send().await;
            let out = match out {
                Ok(v) => v,
                Err(e) => {
                    let msg = e.to_string();
                    if Self::is_not_found(&msg) {
                        return Ok(None);
                    }
                    return Err(this.map_remote_error(msg, "reading", &key));
                }
            };
            let bytes = out.body.collect().await.map_err(|e| {
                this.map_remote_error(e.to_string(), "collecting response body for", &key)
            })?;
            Ok(Some(bytes.into_bytes().to_vec()))
        })
    }

    pub fn write_bytes(&self, leaf: &str, bytes: &[u8], content_type: &str) -> AppResult<()> {
        if let Some(path) = self.emulated_path(leaf) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::new(
                        "PB_BACKUP_TARGET_INVALID",
                        "backup",
                        "failed creating emulated s3 parent directory",
                        false,
                        serde_json::json!({ "error": e.to_string(), "path": parent }),
                    )
                })?;
            }
            std::fs::write(&path, bytes).map_err(|e| {
                AppError::new(
                    "PB_BACKUP_TARGET_INVALID",
                    "backup",
                    "failed writing emulated s3 object",
                    false,
                    serde_json::json!({ "error": e.to_string(), "path": path }),
                )
            })?;
            return Ok(());
        }

        let bucket = self.bucket.clone();
        let key = self.key_for(leaf);
        let endpoint = self.endpoint_url.clone();
        let region = self.region.clone();
        let payload = bytes.to_vec();
        let this = self.clone();
        self.run_async(async move {
            let client = Self::build_client(endpoint, region).await?;
            client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .content_type(content_type)
                .body(payload.into())
                .send()
                .await
                .map_err(|e| this.map_remote_error(e.to_string(), "writing", &key))?;
            Ok(())
        })
    }
}

impl BlobStore for S3BlobStore {
    fn target(&self) -> BackupTargetUri {
        BackupTargetUri::S3 {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
        }
    }

    fn get_blob(&self, owner: &str) -> AppResult<Option<String>> {
        let leaf = blob_leaf(owner)?;
        let Some(bytes) = self.read_bytes(&leaf)? else {
            return Ok(None);
        };
        String::from_utf8(bytes).map(Some).map_err(|e| {
            AppError::new(
                "PB_BACKUP_TARGET_INVALID",
                "backup",
                "s3 backup blob is not valid utf8",
                false,
                serde_json::json!({
                    "error": e.to_string(),
                    "target": self.target().display(),
                    "key": self.key_for(&leaf)
                }),
            )
        })
    }

    fn put_blob(&self, owner: &str, payload: &str) -> AppResult<()> {
        let leaf = blob_leaf(owner)?;
        self.write_bytes(&leaf, payload.as_bytes(), "application/json")
    }
}
