use std::borrow::Cow;

use actix_multipart::form::{bytes::Bytes, text::Text, MultipartForm};
use chrono::NaiveDate;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::api::validation::validation_message;
use crate::error::ServiceError;
use crate::resume::{ResumeSource, ResumeUpload};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_applied_date(value: &str) -> Result<NaiveDate, ServiceError> {
    let value = value.trim();
    // chrono accepts unpadded fields; the wire format does not
    if value.len() != 10 {
        return Err(invalid_date());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid_date())
}

fn invalid_date() -> ServiceError {
    ServiceError::Validation("Invalid date format. Use YYYY-MM-DD".to_string())
}

fn validate_applied_date(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    parse_applied_date(value).map(|_| ()).map_err(|_| {
        ValidationError::new("applied_date").with_message(Cow::Borrowed("Invalid date format. Use YYYY-MM-DD"))
    })
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Must not be blank")));
    }
    Ok(())
}

/// Job fields as sent by a client, either as JSON or as multipart text parts
#[derive(Debug, Default, Deserialize, Validate)]
pub struct JobPayload {
    #[validate(
        required(message = "company_name is required"),
        length(max = 255, message = "company_name must be at most 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub company_name: Option<String>,

    #[validate(
        required(message = "job_title is required"),
        length(max = 255, message = "job_title must be at most 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub job_title: Option<String>,

    #[validate(
        required(message = "status is required"),
        length(max = 255, message = "status must be at most 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub status: Option<String>,

    #[validate(length(max = 2048, message = "job_url must be at most 2048 characters"))]
    pub job_url: Option<String>,

    pub job_description: Option<String>,

    pub notes: Option<String>,

    #[validate(length(max = 255, message = "location must be at most 255 characters"))]
    pub location: Option<String>,

    #[validate(custom(function = "validate_applied_date"))]
    pub applied_date: Option<String>,

    /// URL of a resume uploaded elsewhere beforehand
    pub resume_url: Option<String>,

    /// Reuse the resume already attached to this job
    pub resume_from_job: Option<i32>,
}

/// Validated, normalized job fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFields {
    pub company_name: String,
    pub job_title: String,
    pub status: String,
    pub job_url: Option<String>,
    pub job_description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    /// `None` means "default": today on create, unchanged on update
    pub applied_date: Option<NaiveDate>,
}

impl JobPayload {
    /// Validate the payload and split it into job fields and a resume source
    pub fn into_parts(self, upload: Option<ResumeUpload>) -> Result<(JobFields, ResumeSource), ServiceError> {
        self.validate()
            .map_err(|errors| ServiceError::Validation(validation_message(&errors)))?;

        let resume_url = non_empty(self.resume_url);
        let supplied = [upload.is_some(), resume_url.is_some(), self.resume_from_job.is_some()]
            .iter()
            .filter(|supplied| **supplied)
            .count();
        if supplied > 1 {
            return Err(ServiceError::Validation(
                "Supply only one of resume, resume_url or resume_from_job".to_string(),
            ));
        }

        let source = match (upload, resume_url, self.resume_from_job) {
            (Some(upload), _, _) => ResumeSource::Upload(upload),
            (_, Some(url), _) => ResumeSource::Locator(url),
            (_, _, Some(job_id)) => ResumeSource::ShareFrom(job_id),
            _ => ResumeSource::Keep,
        };

        let applied_date = match non_empty(self.applied_date) {
            Some(raw) => Some(parse_applied_date(&raw)?),
            None => None,
        };

        let fields = JobFields {
            company_name: required(self.company_name),
            job_title: required(self.job_title),
            status: required(self.status),
            job_url: non_empty(self.job_url),
            job_description: non_empty(self.job_description),
            notes: non_empty(self.notes),
            location: non_empty(self.location),
            applied_date,
        };

        Ok((fields, source))
    }
}

// Only called after validation guaranteed presence
fn required(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Multipart body for create and full update; `resume` is the PDF file part
#[derive(MultipartForm)]
pub struct JobUploadForm {
    pub company_name: Option<Text<String>>,
    pub job_title: Option<Text<String>>,
    pub status: Option<Text<String>>,
    pub job_url: Option<Text<String>>,
    pub job_description: Option<Text<String>>,
    pub notes: Option<Text<String>>,
    pub location: Option<Text<String>>,
    pub applied_date: Option<Text<String>>,
    pub resume_url: Option<Text<String>>,
    pub resume_from_job: Option<Text<String>>,
    pub resume: Option<Bytes>,
}

impl JobUploadForm {
    pub fn into_parts(self) -> Result<(JobFields, ResumeSource), ServiceError> {
        let resume_from_job = match self.resume_from_job.map(Text::into_inner) {
            Some(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<i32>().map_err(|_| {
                ServiceError::Validation("resume_from_job must be a job id".to_string())
            })?),
            _ => None,
        };

        // Browsers send an empty, unnamed file part when nothing was picked
        let upload = self
            .resume
            .filter(|file| !(file.data.is_empty() && file.file_name.as_deref().unwrap_or_default().is_empty()))
            .map(|file| ResumeUpload {
                data: file.data,
                file_name: file.file_name,
                content_type: file.content_type.map(|mime| mime.essence_str().to_string()),
            });

        let payload = JobPayload {
            company_name: self.company_name.map(Text::into_inner),
            job_title: self.job_title.map(Text::into_inner),
            status: self.status.map(Text::into_inner),
            job_url: self.job_url.map(Text::into_inner),
            job_description: self.job_description.map(Text::into_inner),
            notes: self.notes.map(Text::into_inner),
            location: self.location.map(Text::into_inner),
            applied_date: self.applied_date.map(Text::into_inner),
            resume_url: self.resume_url.map(Text::into_inner),
            resume_from_job,
        };

        payload.into_parts(upload)
    }
}

/// Status-only update, from `?status=` or a JSON body
#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}
