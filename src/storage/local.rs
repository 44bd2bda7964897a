use std::path::{Component, Path, PathBuf};

use actix_web::web::Bytes;
use async_trait::async_trait;
use tracing::debug;

use super::{ResumeFetch, ResumeKey, ResumeStorage, StorageError, RESUME_PREFIX};

const PARTIAL_SUFFIX: &str = ".part";

/// Resume files kept in a directory on the local filesystem.
///
/// Locators are paths relative to the process working directory, starting
/// with the configured root (e.g. `uploads/resumes/acme/..._cv.pdf`).
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create the backend, making sure the upload directory exists
    pub async fn new(root: PathBuf) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Map a locator back to a path, refusing anything outside the root
    fn resolve(&self, locator: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(locator);
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));

        if escapes || !path.starts_with(&self.root) || path == self.root {
            return Err(StorageError::Rejected(locator.to_string()));
        }
        Ok(path.to_path_buf())
    }
}

#[async_trait]
impl ResumeStorage for LocalStorage {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn manages(&self, locator: &str) -> bool {
        self.resolve(locator).is_ok()
    }

    async fn put(&self, key: &ResumeKey, data: Bytes) -> Result<String, StorageError> {
        let path = self.root.join(&key.key);
        let locator = path.to_string_lossy().into_owned();
        // Keys are generated, but a hostile company name must still not escape the root
        let path = self.resolve(&locator)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a crash never leaves a truncated PDF behind a live locator
        let partial = PathBuf::from(format!("{}{}", locator, PARTIAL_SUFFIX));
        tokio::fs::write(&partial, &data).await?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        debug!("Stored {} bytes at {}", data.len(), locator);
        Ok(locator)
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        let path = self.resolve(locator)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Resume file {} was already gone", locator);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, locator: &str) -> Result<ResumeFetch, StorageError> {
        let path = self.resolve(locator)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::Missing(locator.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume.pdf".to_string());

        Ok(ResumeFetch::Inline {
            data: Bytes::from(data),
            file_name,
        })
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut locators = Vec::new();
        let mut pending = vec![self.root.join(RESUME_PREFIX)];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let locator = path.to_string_lossy().into_owned();
                if !locator.ends_with(PARTIAL_SUFFIX) {
                    locators.push(locator);
                }
            }
        }

        locators.sort();
        Ok(locators)
    }
}
