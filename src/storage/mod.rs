use std::sync::Arc;
use std::time::Duration;

use actix_web::web::Bytes;
use async_trait::async_trait;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;

use crate::config::StorageConfig;

pub mod local;
pub mod s3;

pub use local::LocalStorage;
pub use s3::S3Storage;

/// Every resume object lives under this key prefix
pub const RESUME_PREFIX: &str = "resumes";

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("object not found: {0}")]
    Missing(String),

    /// The locator is not one this backend handed out
    #[error("locator rejected: {0}")]
    Rejected(String),
}

/// How a client should receive a stored resume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeFetch {
    /// Send the client elsewhere (presigned or external URL)
    Redirect(String),

    /// Stream these bytes back as `application/pdf`
    Inline { data: Bytes, file_name: String },
}

/// Where an upload is written, computed once before the write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeKey {
    /// Display folder, e.g. `resumes/acme_corp`
    pub folder: String,
    /// Full object key, e.g. `resumes/acme_corp/1718000000000_x1y2z3_cv.pdf`
    pub key: String,
}

impl ResumeKey {
    pub fn generate(company_name: &str, file_name: Option<&str>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();

        Self::with_parts(company_name, file_name, Utc::now().timestamp_millis(), &suffix)
    }

    fn with_parts(company_name: &str, file_name: Option<&str>, millis: i64, suffix: &str) -> Self {
        let folder = format!("{}/{}", RESUME_PREFIX, company_slug(company_name));
        let key = format!("{}/{}_{}_{}.pdf", folder, millis, suffix, file_stem(file_name));
        ResumeKey { folder, key }
    }

    /// Upload time in unix millis, read back from the file name of a locator
    pub fn stored_at_millis(locator: &str) -> Option<i64> {
        let file_name = locator.rsplit(['/', '\\']).next()?;
        let (millis, _) = file_name.split_once('_')?;
        millis.parse().ok()
    }
}

/// Lowercased company name with every non-alphanumeric character replaced by `_`
pub fn company_slug(company_name: &str) -> String {
    let trimmed = company_name.trim();
    if trimmed.is_empty() {
        return "unknown_company".to_string();
    }

    trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Base name of an uploaded file without directories or the `.pdf` extension
fn file_stem(file_name: Option<&str>) -> String {
    let base = file_name
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let stem = match base.len().checked_sub(4) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".pdf") => &base[..cut],
        _ => base,
    };

    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "resume".to_string()
    } else {
        cleaned
    }
}

/// Durable key -> bytes store for resume files
#[async_trait]
pub trait ResumeStorage: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Whether `locator` was produced by this backend (and so may be deleted by it)
    fn manages(&self, locator: &str) -> bool;

    /// Store `data` under `key`, returning the locator to persist
    async fn put(&self, key: &ResumeKey, data: Bytes) -> Result<String, StorageError>;

    /// Remove an object. Removing an object that is already gone succeeds.
    async fn delete(&self, locator: &str) -> Result<(), StorageError>;

    /// Resolve a locator into something a client can download
    async fn fetch(&self, locator: &str) -> Result<ResumeFetch, StorageError>;

    /// Locators of every object stored under the resume prefix
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}

/// Build the backend selected by configuration
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn ResumeStorage>, StorageError> {
    match config {
        StorageConfig::Local { upload_dir } => Ok(Arc::new(LocalStorage::new(upload_dir.clone()).await?)),
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            presign_expiry,
        } => {
            let credentials = match (access_key_id, secret_access_key) {
                (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
                _ => None,
            };
            let storage = S3Storage::connect(
                bucket,
                endpoint.as_deref(),
                region,
                credentials,
                *presign_expiry,
            )
            .await;
            Ok(Arc::new(storage))
        }
    }
}
