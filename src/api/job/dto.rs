use chrono::NaiveDateTime;
use serde::Serialize;

use super::models::DATE_FORMAT;
use crate::db::models::JobRow;

/// Job as returned to clients. The raw resume locator stays internal;
/// clients download through `resume_url`.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: i32,
    pub company_name: String,
    pub job_title: String,
    pub status: String,
    pub job_url: Option<String>,
    pub job_description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub applied_date: String,
    pub has_resume: bool,
    pub resume_url: Option<String>,
    pub resume_folder: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<JobRow> for JobView {
    fn from(row: JobRow) -> Self {
        let has_resume = row.resume_reference.is_some();
        JobView {
            resume_url: has_resume.then(|| format!("/jobs/{}/resume", row.id)),
            applied_date: row.applied_date.format(DATE_FORMAT).to_string(),
            id: row.id,
            company_name: row.company_name,
            job_title: row.job_title,
            status: row.status,
            job_url: row.job_url,
            job_description: row.job_description,
            notes: row.notes,
            location: row.location,
            has_resume,
            resume_folder: row.resume_folder,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
