use actix_web::{get, web, HttpResponse};

use super::job::JobService;
use crate::error::ServiceError;

/// Stored resumes grouped by reference, with the jobs that hold each one
#[get("/")]
async fn list_resumes(service: web::Data<JobService>) -> Result<HttpResponse, ServiceError> {
    let summaries = service.resume_summaries().await?;
    Ok(HttpResponse::Ok().json(summaries))
}

pub fn resumes_config(config: &mut web::ServiceConfig) {
    config.service(web::scope("/resumes").service(list_resumes));
}
