use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use super::models::JobFields;
use crate::db::models::{JobRow, NewJob};
use crate::db::JobStore;
use crate::error::ServiceError;
use crate::resume::{ResumeLifecycle, ResumeRef, ResumeSource, ResumeSummary};
use crate::storage::{ResumeFetch, StorageError};

/// Job service containing business logic
///
/// Every write follows the same order: resolve the resume (uploading first
/// when needed), persist the row, then release any resume the row stopped
/// holding. A failed persist rolls back a fresh upload.
pub struct JobService {
    store: Arc<dyn JobStore>,
    resumes: Arc<ResumeLifecycle>,
}

impl JobService {
    /// Create a new JobService instance
    pub fn new(store: Arc<dyn JobStore>, resumes: Arc<ResumeLifecycle>) -> Self {
        Self { store, resumes }
    }

    pub fn storage_backend(&self) -> &'static str {
        self.resumes.backend()
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        self.store.ping().await.map_err(ServiceError::Database)
    }

    /// Create a single job
    ///
    /// # Returns
    /// - `Ok(JobRow)` - Job created successfully
    /// - `Err(ServiceError)` - Validation, storage or database failure; nothing persisted
    pub async fn create_job(&self, fields: JobFields, source: ResumeSource) -> Result<JobRow, ServiceError> {
        info!("Service: Creating job for company={}", fields.company_name);

        let resolution = self.resumes.resolve_on_create(source, &fields.company_name).await?;
        let applied_date = fields.applied_date.unwrap_or_else(|| Local::now().date_naive());
        let new_job = new_job(fields, applied_date, resolution.reference.clone());

        match self.store.create(&new_job).await {
            Ok(row) => {
                info!("Service: Job created successfully with id={}", row.id);
                Ok(row)
            }
            Err(e) => {
                self.resumes.abandon(&resolution).await;
                Err(ServiceError::Database(e))
            }
        }
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobRow>, ServiceError> {
        Ok(self.store.list().await?)
    }

    pub async fn get_job(&self, id: i32) -> Result<JobRow, ServiceError> {
        self.store.get(id).await?.ok_or(ServiceError::NotFound(id))
    }

    /// Change only the status of a job
    pub async fn update_status(&self, id: i32, status: Option<&str>) -> Result<JobRow, ServiceError> {
        let status = status.map(str::trim).unwrap_or_default();
        if status.is_empty() {
            return Err(ServiceError::Validation("status is required".to_string()));
        }
        if status.chars().count() > 255 {
            return Err(ServiceError::Validation(
                "status must be at most 255 characters".to_string(),
            ));
        }

        let row = self
            .store
            .update_status(id, status)
            .await?
            .ok_or(ServiceError::NotFound(id))?;

        info!("Service: Job {} status is now {}", id, row.status);
        Ok(row)
    }

    /// Replace every mutable field of a job, optionally swapping its resume
    pub async fn update_job(
        &self,
        id: i32,
        fields: JobFields,
        source: ResumeSource,
    ) -> Result<JobRow, ServiceError> {
        info!("Service: Updating job {}", id);

        let current = self.get_job(id).await?;
        let resolution = self
            .resumes
            .resolve_on_update(id, current.resume(), source, &fields.company_name)
            .await?;

        let applied_date = fields.applied_date.unwrap_or(current.applied_date);
        let new_job = new_job(fields, applied_date, resolution.reference.clone());

        let updated = match self.store.update(id, &new_job).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                warn!("Service: Job {} disappeared during update", id);
                self.resumes.abandon(&resolution).await;
                return Err(ServiceError::NotFound(id));
            }
            Err(e) => {
                self.resumes.abandon(&resolution).await;
                return Err(ServiceError::Database(e));
            }
        };

        // The update has committed; the previous artifact may now be unreferenced
        let current = resolution.locator().map(str::to_string);
        drop(resolution);
        if let Some(previous) = updated.previous_reference.as_deref() {
            if Some(previous) != current.as_deref() {
                self.resumes.release(id, previous).await;
            }
        }

        info!("Service: Job {} updated", id);
        Ok(updated.job)
    }

    /// Delete a job, then purge its resume if nothing else holds it
    pub async fn delete_job(&self, id: i32) -> Result<(), ServiceError> {
        let deleted = self
            .store
            .delete(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;

        info!("Service: Job {} deleted", id);

        if let Some(reference) = deleted.resume_reference.as_deref() {
            self.resumes.resolve_on_delete(id, reference).await;
        }
        Ok(())
    }

    /// Where the resume of a job can be downloaded from
    pub async fn resume_fetch(&self, id: i32) -> Result<ResumeFetch, ServiceError> {
        let job = self.get_job(id).await?;
        let reference = job.resume_reference.ok_or(ServiceError::ResumeNotFound(id))?;

        match self.resumes.fetch(&reference).await {
            Ok(fetch) => Ok(fetch),
            Err(StorageError::Missing(_)) => {
                warn!("Service: Resume of job {} is missing from storage", id);
                Err(ServiceError::ResumeNotFound(id))
            }
            Err(e) => Err(ServiceError::Storage(e)),
        }
    }

    pub async fn resume_summaries(&self) -> Result<Vec<ResumeSummary>, ServiceError> {
        self.resumes.summaries().await
    }
}

fn new_job(fields: JobFields, applied_date: chrono::NaiveDate, resume: Option<ResumeRef>) -> NewJob {
    NewJob {
        company_name: fields.company_name,
        job_title: fields.job_title,
        status: fields.status,
        job_url: fields.job_url,
        job_description: fields.job_description,
        notes: fields.notes,
        location: fields.location,
        applied_date,
        resume,
    }
}
