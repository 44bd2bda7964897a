use chrono::{NaiveDate, NaiveDateTime};
use sqlx::FromRow;

use crate::resume::ResumeRef;

/// Database representation of a job with all fields
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct JobRow {
    pub id: i32,
    pub company_name: String,
    pub job_title: String,
    pub status: String,
    pub job_url: Option<String>,
    pub job_description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub applied_date: NaiveDate,
    pub resume_reference: Option<String>,
    pub resume_folder: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl JobRow {
    pub fn resume(&self) -> Option<ResumeRef> {
        self.resume_reference.as_ref().map(|locator| ResumeRef {
            locator: locator.clone(),
            folder: self.resume_folder.clone(),
        })
    }
}

/// Every mutable column of a job, ready to insert or overwrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub company_name: String,
    pub job_title: String,
    pub status: String,
    pub job_url: Option<String>,
    pub job_description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub applied_date: NaiveDate,
    pub resume: Option<ResumeRef>,
}

impl NewJob {
    pub fn resume_locator(&self) -> Option<&str> {
        self.resume.as_ref().map(|r| r.locator.as_str())
    }

    pub fn resume_folder(&self) -> Option<&str> {
        self.resume.as_ref().and_then(|r| r.folder.as_deref())
    }
}

/// Row after a full update, plus the resume reference it held before
#[derive(Debug, Clone, FromRow)]
pub struct UpdatedJob {
    #[sqlx(flatten)]
    pub job: JobRow,
    pub previous_reference: Option<String>,
}
