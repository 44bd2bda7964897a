//! In-memory stand-ins for the database and the storage backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::web::Bytes;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};

use crate::api::job::JobService;
use crate::db::models::{JobRow, NewJob, UpdatedJob};
use crate::db::JobStore;
use crate::resume::ResumeLifecycle;
use crate::storage::{ResumeFetch, ResumeKey, ResumeStorage, StorageError};

pub fn job_service(store: Arc<MemoryJobStore>, storage: Arc<FakeStorage>) -> JobService {
    let lifecycle = ResumeLifecycle::new(storage, store.clone(), Duration::from_secs(1));
    JobService::new(store, Arc::new(lifecycle))
}

fn simulated_failure() -> sqlx::Error {
    sqlx::Error::Protocol("simulated write failure".to_string())
}

#[derive(Default)]
struct Table {
    rows: Vec<JobRow>,
    last_id: i32,
}

/// `JobStore` over a vector, with switchable write failures
#[derive(Default)]
pub struct MemoryJobStore {
    table: Mutex<Table>,
    fail_writes: AtomicBool,
}

impl MemoryJobStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap().rows.len()
    }

    /// Insert a bare job holding `locator`, bypassing the service
    pub fn insert_with_resume(&self, locator: &str) -> JobRow {
        let job = NewJob {
            company_name: "Seeded".to_string(),
            job_title: "Seeded".to_string(),
            status: "Applied".to_string(),
            job_url: None,
            job_description: None,
            notes: None,
            location: None,
            applied_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            resume: Some(crate::resume::ResumeRef {
                locator: locator.to_string(),
                folder: None,
            }),
        };
        self.insert(&job)
    }

    fn check_writes(&self) -> Result<(), sqlx::Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        Ok(())
    }

    fn insert(&self, job: &NewJob) -> JobRow {
        let mut table = self.table.lock().unwrap();
        table.last_id += 1;
        let now = Local::now().naive_local();
        let row = JobRow {
            id: table.last_id,
            company_name: job.company_name.clone(),
            job_title: job.job_title.clone(),
            status: job.status.clone(),
            job_url: job.job_url.clone(),
            job_description: job.job_description.clone(),
            notes: job.notes.clone(),
            location: job.location.clone(),
            applied_date: job.applied_date,
            resume_reference: job.resume_locator().map(str::to_string),
            resume_folder: job.resume_folder().map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        table.rows.push(row.clone());
        row
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &NewJob) -> Result<JobRow, sqlx::Error> {
        self.check_writes()?;
        Ok(self.insert(job))
    }

    async fn get(&self, id: i32) -> Result<Option<JobRow>, sqlx::Error> {
        let table = self.table.lock().unwrap();
        Ok(table.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<JobRow>, sqlx::Error> {
        Ok(self.table.lock().unwrap().rows.clone())
    }

    async fn update_status(&self, id: i32, status: &str) -> Result<Option<JobRow>, sqlx::Error> {
        self.check_writes()?;
        let mut table = self.table.lock().unwrap();
        Ok(table.rows.iter_mut().find(|row| row.id == id).map(|row| {
            if row.status != status {
                row.status = status.to_string();
                row.updated_at = Local::now().naive_local();
            }
            row.clone()
        }))
    }

    async fn update(&self, id: i32, job: &NewJob) -> Result<Option<UpdatedJob>, sqlx::Error> {
        self.check_writes()?;
        let mut table = self.table.lock().unwrap();
        Ok(table.rows.iter_mut().find(|row| row.id == id).map(|row| {
            let previous_reference = row.resume_reference.take();
            row.company_name = job.company_name.clone();
            row.job_title = job.job_title.clone();
            row.status = job.status.clone();
            row.job_url = job.job_url.clone();
            row.job_description = job.job_description.clone();
            row.notes = job.notes.clone();
            row.location = job.location.clone();
            row.applied_date = job.applied_date;
            row.resume_reference = job.resume_locator().map(str::to_string);
            row.resume_folder = job.resume_folder().map(str::to_string);
            row.updated_at = Local::now().naive_local();
            UpdatedJob {
                job: row.clone(),
                previous_reference,
            }
        }))
    }

    async fn delete(&self, id: i32) -> Result<Option<JobRow>, sqlx::Error> {
        self.check_writes()?;
        let mut table = self.table.lock().unwrap();
        let position = table.rows.iter().position(|row| row.id == id);
        Ok(position.map(|index| table.rows.remove(index)))
    }

    async fn count_by_resume(&self, reference: &str) -> Result<i64, sqlx::Error> {
        let table = self.table.lock().unwrap();
        Ok(table
            .rows
            .iter()
            .filter(|row| row.resume_reference.as_deref() == Some(reference))
            .count() as i64)
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }
}

/// `ResumeStorage` keeping objects in a map under `mem://` locators
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<BTreeMap<String, Bytes>>,
    deleted: Mutex<Vec<String>>,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeStorage {
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.objects.lock().unwrap().contains_key(locator)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Locators successfully deleted, in order
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Store an object directly, returning its locator
    pub fn seed(&self, key: &str) -> String {
        let locator = format!("mem://{}", key);
        self.objects
            .lock()
            .unwrap()
            .insert(locator.clone(), Bytes::from_static(b"%PDF-1.4 seeded"));
        locator
    }

    /// Drop an object without recording a delete, as if removed out-of-band
    pub fn remove_silently(&self, locator: &str) {
        self.objects.lock().unwrap().remove(locator);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ResumeStorage for FakeStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn manages(&self, locator: &str) -> bool {
        locator.starts_with("mem://")
    }

    async fn put(&self, key: &ResumeKey, data: Bytes) -> Result<String, StorageError> {
        self.pause().await;
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::S3("simulated upload failure".to_string()));
        }
        let locator = format!("mem://{}", key.key);
        self.objects.lock().unwrap().insert(locator.clone(), data);
        Ok(locator)
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        self.pause().await;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::S3("simulated delete failure".to_string()));
        }
        self.objects.lock().unwrap().remove(locator);
        self.deleted.lock().unwrap().push(locator.to_string());
        Ok(())
    }

    async fn fetch(&self, locator: &str) -> Result<ResumeFetch, StorageError> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::Missing(locator.to_string()))?;
        Ok(ResumeFetch::Inline {
            data,
            file_name: locator.rsplit('/').next().unwrap_or("resume.pdf").to_string(),
        })
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.objects.lock().unwrap().keys().cloned().collect())
    }
}
