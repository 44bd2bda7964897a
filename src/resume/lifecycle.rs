use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::locks::ReferenceLocks;
use super::{Resolution, ResumeRef, ResumeSource, ResumeSummary, ResumeUpload, SweepReport};
use crate::db::JobStore;
use crate::error::ServiceError;
use crate::storage::{ResumeFetch, ResumeKey, ResumeStorage, StorageError};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const MAX_LOCATOR_LEN: usize = 2048;

/// Objects younger than this are never swept: their job row may not be written yet
pub const DEFAULT_SWEEP_GRACE: Duration = Duration::from_secs(60 * 60);

/// Decides what happens to resume artifacts as jobs are created, updated and deleted.
///
/// Several jobs may hold the same artifact. An artifact is purged from the
/// storage backend only once no job references it, and purge failures never
/// fail the job operation that triggered them.
pub struct ResumeLifecycle {
    storage: Arc<dyn ResumeStorage>,
    store: Arc<dyn JobStore>,
    timeout: Duration,
    sweep_grace: Duration,
    locks: ReferenceLocks,
}

impl ResumeLifecycle {
    pub fn new(storage: Arc<dyn ResumeStorage>, store: Arc<dyn JobStore>, timeout: Duration) -> Self {
        Self {
            storage,
            store,
            timeout,
            sweep_grace: DEFAULT_SWEEP_GRACE,
            locks: ReferenceLocks::default(),
        }
    }

    pub fn with_sweep_grace(mut self, sweep_grace: Duration) -> Self {
        self.sweep_grace = sweep_grace;
        self
    }

    pub fn backend(&self) -> &'static str {
        self.storage.backend()
    }

    /// Pick the reference a new job will be persisted with
    pub async fn resolve_on_create(
        &self,
        source: ResumeSource,
        company_name: &str,
    ) -> Result<Resolution, ServiceError> {
        match source {
            ResumeSource::Keep => Ok(Resolution::new(None, false)),
            ResumeSource::Upload(upload) => self.upload(upload, company_name).await,
            ResumeSource::Locator(locator) => Ok(Resolution::new(
                Some(ResumeRef {
                    locator: validate_locator(&locator)?,
                    folder: None,
                }),
                false,
            )),
            ResumeSource::ShareFrom(job_id) => self.shared_from(job_id).await,
        }
    }

    /// Pick the reference an updated job will be persisted with.
    ///
    /// The previous artifact is untouched here. Once the update has committed
    /// the caller hands the previous reference to [`ResumeLifecycle::release`].
    pub async fn resolve_on_update(
        &self,
        job_id: i32,
        previous: Option<ResumeRef>,
        source: ResumeSource,
        company_name: &str,
    ) -> Result<Resolution, ServiceError> {
        if let ResumeSource::Keep = source {
            debug!("Job {} keeps its current resume", job_id);
            return Ok(Resolution::new(previous, false));
        }
        self.resolve_on_create(source, company_name).await
    }

    /// Purge decision after a job row holding `reference` has been deleted
    pub async fn resolve_on_delete(&self, job_id: i32, reference: &str) {
        self.release(job_id, reference).await;
    }

    /// Roll back a fresh upload whose job row never got persisted
    pub async fn abandon(&self, resolution: &Resolution) {
        if !resolution.uploaded {
            return;
        }
        let Some(locator) = resolution.locator() else {
            return;
        };

        match self.bounded(self.storage.delete(locator)).await {
            Ok(()) => info!("Removed freshly uploaded resume {} after failed write", locator),
            Err(e) => error!("Could not remove orphaned upload {}: {}", locator, e),
        }
    }

    /// Delete `reference` from storage if no job holds it any more.
    ///
    /// Errors are logged and swallowed: the job-level change has already committed.
    pub async fn release(&self, job_id: i32, reference: &str) {
        if !self.storage.manages(reference) {
            info!(
                "Resume of job {} is not managed by the {} backend; leaving it in place",
                job_id,
                self.storage.backend()
            );
            return;
        }

        let _guard = self.locks.lock(reference).await;

        let remaining = match self.store.count_by_resume(reference).await {
            Ok(remaining) => remaining,
            Err(e) => {
                error!("Could not count holders of resume released by job {}: {}", job_id, e);
                return;
            }
        };

        if remaining > 0 {
            info!(
                "Resume released by job {} is still used by {} other job(s); keeping it",
                job_id, remaining
            );
            return;
        }

        match self.bounded(self.storage.delete(reference)).await {
            Ok(()) => info!("Purged resume {} released by job {}", reference, job_id),
            Err(e) => warn!(
                "Failed to purge resume {} released by job {}: {} (left for a later sweep)",
                reference, job_id, e
            ),
        }
    }

    /// Resolve a persisted reference into a download
    pub async fn fetch(&self, reference: &str) -> Result<ResumeFetch, StorageError> {
        if self.storage.manages(reference) {
            return self.bounded(self.storage.fetch(reference)).await;
        }
        if is_http_url(reference) {
            return Ok(ResumeFetch::Redirect(reference.to_string()));
        }
        Err(StorageError::Missing(reference.to_string()))
    }

    /// Group jobs by the artifact they hold
    pub async fn summaries(&self) -> Result<Vec<ResumeSummary>, ServiceError> {
        let jobs = self.store.list().await?;

        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, ResumeSummary> = HashMap::new();

        for job in jobs {
            let Some(reference) = job.resume_reference else {
                continue;
            };
            let summary = grouped.entry(reference.clone()).or_insert_with(|| {
                order.push(reference.clone());
                ResumeSummary {
                    folder: job.resume_folder.clone(),
                    job_ids: Vec::new(),
                    shared: false,
                    managed: self.storage.manages(&reference),
                }
            });
            summary.job_ids.push(job.id);
            summary.shared = summary.job_ids.len() > 1;
        }

        Ok(order
            .into_iter()
            .filter_map(|reference| grouped.remove(&reference))
            .collect())
    }

    /// Find stored artifacts no job references and (unless `dry_run`) delete them.
    ///
    /// Uploads happen before their job row is written, possibly in another
    /// process, so objects younger than the grace period are left alone.
    pub async fn sweep(&self, dry_run: bool) -> Result<SweepReport, ServiceError> {
        let locators = self.bounded(self.storage.list()).await?;
        let mut report = SweepReport {
            scanned: locators.len(),
            ..SweepReport::default()
        };
        let grace = i64::try_from(self.sweep_grace.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(grace);

        for locator in locators {
            let _guard = self.locks.lock(&locator).await;
            if self.store.count_by_resume(&locator).await? > 0 {
                continue;
            }

            // Every key this service writes carries its upload time
            if ResumeKey::stored_at_millis(&locator).is_some_and(|stored_at| stored_at > cutoff) {
                debug!("Sweep skipping recent unreferenced object {}", locator);
                report.recent += 1;
                continue;
            }

            report.orphaned.push(locator.clone());
            if dry_run {
                continue;
            }

            match self.bounded(self.storage.delete(&locator)).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!("Sweep could not delete {}: {}", locator, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Sweep finished: scanned={}, recent={}, orphaned={}, deleted={}, failed={}",
            report.scanned,
            report.recent,
            report.orphaned.len(),
            report.deleted,
            report.failed
        );
        Ok(report)
    }

    async fn upload(&self, upload: ResumeUpload, company_name: &str) -> Result<Resolution, ServiceError> {
        validate_upload(&upload)?;

        let key = ResumeKey::generate(company_name, upload.file_name.as_deref());
        let size = upload.data.len();
        let locator = self.bounded(self.storage.put(&key, upload.data)).await?;

        info!(
            "Stored resume ({} bytes) in {} backend under folder {}",
            size,
            self.storage.backend(),
            key.folder
        );

        Ok(Resolution::new(
            Some(ResumeRef {
                locator,
                folder: Some(key.folder),
            }),
            true,
        ))
    }

    async fn shared_from(&self, job_id: i32) -> Result<Resolution, ServiceError> {
        let source = self.store.get(job_id).await?.ok_or_else(|| {
            ServiceError::Validation(format!("resume_from_job: job {} does not exist", job_id))
        })?;

        let reference = source.resume().ok_or_else(|| {
            ServiceError::Validation(format!("resume_from_job: job {} has no resume", job_id))
        })?;

        if !self.storage.manages(&reference.locator) {
            debug!("Sharing external resume of job {}", job_id);
            return Ok(Resolution::new(Some(reference), false));
        }

        // Held until the sharing write commits; a concurrent release waits for it
        let guard = self.locks.lock(&reference.locator).await;
        if self.store.count_by_resume(&reference.locator).await? == 0 {
            return Err(ServiceError::Validation(format!(
                "resume_from_job: job {} no longer holds its resume",
                job_id
            )));
        }

        debug!("Sharing resume of job {}", job_id);
        Ok(Resolution::pinned(reference, guard))
    }

    /// Run a storage call under the configured timeout
    async fn bounded<T, F>(&self, call: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(StorageError::Timeout(self.timeout)))
    }
}

/// Reject anything but a non-empty PDF before touching storage
fn validate_upload(upload: &ResumeUpload) -> Result<(), ServiceError> {
    match upload.content_type.as_deref() {
        Some(content_type) if content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE) => {}
        Some(other) => {
            return Err(ServiceError::Validation(format!(
                "Only PDF files allowed (got {})",
                other
            )))
        }
        None => {
            return Err(ServiceError::Validation(
                "Only PDF files allowed (resume content type missing)".to_string(),
            ))
        }
    }

    if upload.data.is_empty() {
        return Err(ServiceError::Validation("Resume file is empty".to_string()));
    }
    Ok(())
}

/// Pre-uploaded references must be absolute http(s) URLs
fn validate_locator(locator: &str) -> Result<String, ServiceError> {
    let locator = locator.trim();
    if locator.is_empty()
        || locator.len() > MAX_LOCATOR_LEN
        || locator.chars().any(char::is_whitespace)
        || !is_http_url(locator)
    {
        return Err(ServiceError::Validation(
            "resume_url must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(locator.to_string())
}

fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}
