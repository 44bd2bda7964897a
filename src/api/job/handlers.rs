use actix_multipart::form::MultipartForm;
use actix_web::{
    delete, get,
    guard::GuardContext,
    http::header,
    post, put,
    web::{self, Data, Path, Query, ServiceConfig},
    HttpResponse,
};
use actix_web_validator::Json;

use super::dto::{JobView, MessageResponse};
use super::models::{JobPayload, JobUploadForm, StatusUpdate};
use super::service::JobService;
use crate::error::ServiceError;
use crate::storage::ResumeFetch;

fn is_multipart(ctx: &GuardContext) -> bool {
    ctx.head()
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[get("/")]
async fn list_jobs(service: Data<JobService>) -> Result<HttpResponse, ServiceError> {
    let jobs: Vec<JobView> = service.list_jobs().await?.into_iter().map(JobView::from).collect();
    Ok(HttpResponse::Ok().json(jobs))
}

#[post("/", guard = "is_multipart")]
async fn create_job_multipart(
    service: Data<JobService>,
    form: MultipartForm<JobUploadForm>,
) -> Result<HttpResponse, ServiceError> {
    let (fields, source) = form.into_inner().into_parts()?;
    let job = service.create_job(fields, source).await?;
    Ok(HttpResponse::Created().json(JobView::from(job)))
}

#[post("/")]
async fn create_job_json(
    service: Data<JobService>,
    payload: Json<JobPayload>,
) -> Result<HttpResponse, ServiceError> {
    let (fields, source) = payload.into_inner().into_parts(None)?;
    let job = service.create_job(fields, source).await?;
    Ok(HttpResponse::Created().json(JobView::from(job)))
}

#[get("/{id}")]
async fn get_job(service: Data<JobService>, path: Path<i32>) -> Result<HttpResponse, ServiceError> {
    let job = service.get_job(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(JobView::from(job)))
}

#[put("/{id}", guard = "is_multipart")]
async fn update_job_multipart(
    service: Data<JobService>,
    path: Path<i32>,
    form: MultipartForm<JobUploadForm>,
) -> Result<HttpResponse, ServiceError> {
    let (fields, source) = form.into_inner().into_parts()?;
    let job = service.update_job(path.into_inner(), fields, source).await?;
    Ok(HttpResponse::Ok().json(JobView::from(job)))
}

#[put("/{id}")]
async fn update_job_json(
    service: Data<JobService>,
    path: Path<i32>,
    payload: Json<JobPayload>,
) -> Result<HttpResponse, ServiceError> {
    let (fields, source) = payload.into_inner().into_parts(None)?;
    let job = service.update_job(path.into_inner(), fields, source).await?;
    Ok(HttpResponse::Ok().json(JobView::from(job)))
}

/// Accepts `?status=Interviewing` or a `{"status": "Interviewing"}` body
#[put("/{id}/status")]
async fn update_status(
    service: Data<JobService>,
    path: Path<i32>,
    query: Query<StatusUpdate>,
    body: Option<web::Json<StatusUpdate>>,
) -> Result<HttpResponse, ServiceError> {
    let status = query
        .into_inner()
        .status
        .or_else(|| body.and_then(|b| b.into_inner().status));
    let job = service.update_status(path.into_inner(), status.as_deref()).await?;
    Ok(HttpResponse::Ok().json(JobView::from(job)))
}

#[delete("/{id}")]
async fn delete_job(service: Data<JobService>, path: Path<i32>) -> Result<HttpResponse, ServiceError> {
    service.delete_job(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Job deleted successfully")))
}

#[get("/{id}/resume")]
async fn get_resume(service: Data<JobService>, path: Path<i32>) -> Result<HttpResponse, ServiceError> {
    match service.resume_fetch(path.into_inner()).await? {
        ResumeFetch::Redirect(url) => Ok(HttpResponse::TemporaryRedirect()
            .insert_header((header::LOCATION, url))
            .finish()),
        ResumeFetch::Inline { data, file_name } => Ok(HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file_name.replace('"', "")),
            ))
            .body(data)),
    }
}

pub fn job_config(config: &mut ServiceConfig) {
    // Multipart handlers first: their guard falls through to the JSON variants
    config.service(
        web::scope("/jobs")
            .service(list_jobs)
            .service(create_job_multipart)
            .service(create_job_json)
            .service(get_job)
            .service(update_job_multipart)
            .service(update_job_json)
            .service(update_status)
            .service(delete_job)
            .service(get_resume),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation;
    use crate::testing::{self, FakeStorage, MemoryJobStore};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    const BOUNDARY: &str = "------------------------jobtrackertest";

    fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, file_name, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        (format!("multipart/form-data; boundary={}", BOUNDARY), body)
    }

    fn job_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("company_name", "Acme"),
            ("job_title", "Engineer"),
            ("status", "Applied"),
            ("applied_date", "2024-03-15"),
            ("notes", ""),
        ]
    }

    macro_rules! app {
        ($store:expr, $storage:expr) => {
            test::init_service(
                App::new()
                    .app_data(Data::new(testing::job_service($store.clone(), $storage.clone())))
                    .app_data(validation::json_config())
                    .configure(job_config),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn json_create_then_get_round_trips_date() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        let req = test::TestRequest::post()
            .uri("/jobs/")
            .set_json(json!({
                "company_name": "Acme",
                "job_title": "Engineer",
                "status": "Applied",
                "applied_date": "2024-03-15",
                "location": "Berlin"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["applied_date"], "2024-03-15");
        assert_eq!(created["has_resume"], false);
        assert_eq!(created["resume_url"], Value::Null);

        let req = test::TestRequest::get()
            .uri(&format!("/jobs/{}", created["id"]))
            .to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched, created);

        let req = test::TestRequest::get().uri("/jobs/").to_request();
        let listed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }

    #[actix_web::test]
    async fn malformed_date_is_rejected_and_nothing_persisted() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        let req = test::TestRequest::post()
            .uri("/jobs/")
            .set_json(json!({
                "company_name": "Acme",
                "job_title": "Engineer",
                "status": "Applied",
                "applied_date": "15-03-2024"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Validation failed");
        assert!(body["fields"]["applied_date"].is_object());
        assert_eq!(store.len(), 0);
    }

    #[actix_web::test]
    async fn unknown_ids_are_404() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        for req in [
            test::TestRequest::get().uri("/jobs/41").to_request(),
            test::TestRequest::delete().uri("/jobs/41").to_request(),
            test::TestRequest::get().uri("/jobs/41/resume").to_request(),
            test::TestRequest::put().uri("/jobs/41/status?status=Offer").to_request(),
        ] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }

    #[actix_web::test]
    async fn status_update_via_query_twice_is_stable() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        let (content_type, body) = multipart(&job_fields(), None);
        let req = test::TestRequest::post()
            .uri("/jobs/")
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let uri = format!("/jobs/{}/status?status=Interviewing", created["id"]);

        let first: Value =
            test::call_and_read_body_json(&app, test::TestRequest::put().uri(&uri).to_request()).await;
        let second: Value =
            test::call_and_read_body_json(&app, test::TestRequest::put().uri(&uri).to_request()).await;
        assert_eq!(first, second);
        assert_eq!(second["status"], "Interviewing");

        let req = test::TestRequest::put()
            .uri(&format!("/jobs/{}/status", created["id"]))
            .set_json(json!({"status": "Offer"}))
            .to_request();
        let third: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(third["status"], "Offer");
    }

    #[actix_web::test]
    async fn multipart_upload_is_served_back_and_purged_on_delete() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        let (content_type, body) = multipart(
            &job_fields(),
            Some(("My CV.pdf", "application/pdf", b"%PDF-1.7 resume bytes")),
        );
        let req = test::TestRequest::post()
            .uri("/jobs/")
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["has_resume"], true);
        assert_eq!(created["resume_folder"], "resumes/acme");
        assert_eq!(created["notes"], Value::Null);
        let resume_url = created["resume_url"].as_str().unwrap().to_string();
        assert_eq!(resume_url, format!("/jobs/{}/resume", created["id"]));

        let resp = test::call_service(&app, test::TestRequest::get().uri(&resume_url).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        let bytes = test::read_body(resp).await;
        assert_eq!(&bytes[..], b"%PDF-1.7 resume bytes");

        let req = test::TestRequest::delete()
            .uri(&format!("/jobs/{}", created["id"]))
            .to_request();
        let deleted: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(deleted["message"], "Job deleted successfully");
        assert_eq!(storage.object_count(), 0);
        assert_eq!(storage.deleted().len(), 1);
    }

    #[actix_web::test]
    async fn non_pdf_upload_is_rejected_before_storage() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        let (content_type, body) = multipart(&job_fields(), Some(("cv.txt", "text/plain", b"plain text")));
        let req = test::TestRequest::post()
            .uri("/jobs/")
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(storage.put_count(), 0);
        assert_eq!(store.len(), 0);
    }

    #[actix_web::test]
    async fn multipart_update_without_file_keeps_resume() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        let (content_type, body) = multipart(&job_fields(), Some(("cv.pdf", "application/pdf", b"%PDF-1.4")));
        let req = test::TestRequest::post()
            .uri("/jobs/")
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;

        let mut fields = job_fields();
        fields[2] = ("status", "Rejected");
        let (content_type, body) = multipart(&fields, None);
        let req = test::TestRequest::put()
            .uri(&format!("/jobs/{}", created["id"]))
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: Value = test::read_body_json(resp).await;
        assert_eq!(updated["status"], "Rejected");
        assert_eq!(updated["has_resume"], true);
        assert_eq!(storage.object_count(), 1);
        assert!(storage.deleted().is_empty());
    }

    #[actix_web::test]
    async fn missing_resume_is_404() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        let req = test::TestRequest::post()
            .uri("/jobs/")
            .set_json(json!({"company_name": "Acme", "job_title": "Engineer", "status": "Applied"}))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::get()
            .uri(&format!("/jobs/{}/resume", created["id"]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn external_resume_url_redirects() {
        let (store, storage) = (Arc::new(MemoryJobStore::default()), Arc::new(FakeStorage::default()));
        let app = app!(store, storage);

        let url = "https://res.cloudinary.com/demo/raw/upload/resumes/acme/cv";
        let req = test::TestRequest::post()
            .uri("/jobs/")
            .set_json(json!({
                "company_name": "Acme",
                "job_title": "Engineer",
                "status": "Applied",
                "resume_url": url
            }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::get()
            .uri(&format!("/jobs/{}/resume", created["id"]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), url);
    }
}
