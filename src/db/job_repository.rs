use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::db::models::{JobRow, NewJob, UpdatedJob};

const JOB_COLUMNS: &str = "id, company_name, job_title, status, job_url, job_description, notes, \
     location, applied_date, resume_reference, resume_folder, created_at, updated_at";

const QUALIFIED_JOB_COLUMNS: &str = "jobs.id, jobs.company_name, jobs.job_title, jobs.status, \
     jobs.job_url, jobs.job_description, jobs.notes, jobs.location, jobs.applied_date, \
     jobs.resume_reference, jobs.resume_folder, jobs.created_at, jobs.updated_at";

/// Persistence operations on the `jobs` table
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job and return the full record
    async fn create(&self, job: &NewJob) -> Result<JobRow, sqlx::Error>;

    async fn get(&self, id: i32) -> Result<Option<JobRow>, sqlx::Error>;

    /// All jobs in insertion order
    async fn list(&self) -> Result<Vec<JobRow>, sqlx::Error>;

    /// Change only the status. Writing the current status again is a no-op.
    async fn update_status(&self, id: i32, status: &str) -> Result<Option<JobRow>, sqlx::Error>;

    /// Overwrite every mutable column, reporting the resume reference held before
    async fn update(&self, id: i32, job: &NewJob) -> Result<Option<UpdatedJob>, sqlx::Error>;

    /// Remove a job, returning the row as it was before deletion
    async fn delete(&self, id: i32) -> Result<Option<JobRow>, sqlx::Error>;

    /// Number of jobs whose resume reference equals `reference`
    async fn count_by_resume(&self, reference: &str) -> Result<i64, sqlx::Error>;

    /// Cheap connectivity check
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Repository for Job database operations
#[derive(Clone)]
pub struct JobRepository {
    pool: Pool<Postgres>,
}

impl JobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn create(&self, job: &NewJob) -> Result<JobRow, sqlx::Error> {
        debug!(
            "Creating job: company={}, title={}, status={}",
            job.company_name, job.job_title, job.status
        );

        let sql = format!(
            r#"
            INSERT INTO jobs (company_name, job_title, status, job_url, job_description, notes,
                              location, applied_date, resume_reference, resume_folder)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(&job.company_name)
            .bind(&job.job_title)
            .bind(&job.status)
            .bind(&job.job_url)
            .bind(&job.job_description)
            .bind(&job.notes)
            .bind(&job.location)
            .bind(job.applied_date)
            .bind(job.resume_locator())
            .bind(job.resume_folder())
            .fetch_one(&self.pool)
            .await?;

        debug!("Job created with id={}", row.id);
        Ok(row)
    }

    async fn get(&self, id: i32) -> Result<Option<JobRow>, sqlx::Error> {
        let sql = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);
        sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list(&self) -> Result<Vec<JobRow>, sqlx::Error> {
        let sql = format!("SELECT {} FROM jobs ORDER BY id", JOB_COLUMNS);
        sqlx::query_as::<_, JobRow>(&sql).fetch_all(&self.pool).await
    }

    async fn update_status(&self, id: i32, status: &str) -> Result<Option<JobRow>, sqlx::Error> {
        debug!("Updating status of job {} to {}", id, status);

        // updated_at only moves when the status actually changes
        let sql = format!(
            r#"
            UPDATE jobs
            SET status = $2,
                updated_at = CASE WHEN status = $2 THEN updated_at ELSE CURRENT_TIMESTAMP END
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
    }

    async fn update(&self, id: i32, job: &NewJob) -> Result<Option<UpdatedJob>, sqlx::Error> {
        debug!("Replacing job {}", id);

        // The sub-select locks the row and captures its old reference in the same statement
        let sql = format!(
            r#"
            UPDATE jobs
            SET company_name = $2, job_title = $3, status = $4, job_url = $5,
                job_description = $6, notes = $7, location = $8, applied_date = $9,
                resume_reference = $10, resume_folder = $11, updated_at = CURRENT_TIMESTAMP
            FROM (SELECT id, resume_reference FROM jobs WHERE id = $1 FOR UPDATE) AS previous
            WHERE jobs.id = previous.id
            RETURNING {}, previous.resume_reference AS previous_reference
            "#,
            QUALIFIED_JOB_COLUMNS
        );

        sqlx::query_as::<_, UpdatedJob>(&sql)
            .bind(id)
            .bind(&job.company_name)
            .bind(&job.job_title)
            .bind(&job.status)
            .bind(&job.job_url)
            .bind(&job.job_description)
            .bind(&job.notes)
            .bind(&job.location)
            .bind(job.applied_date)
            .bind(job.resume_locator())
            .bind(job.resume_folder())
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete(&self, id: i32) -> Result<Option<JobRow>, sqlx::Error> {
        debug!("Deleting job {}", id);
        let sql = format!("DELETE FROM jobs WHERE id = $1 RETURNING {}", JOB_COLUMNS);
        sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn count_by_resume(&self, reference: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE resume_reference = $1")
            .bind(reference)
            .fetch_one(&self.pool)
            .await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
