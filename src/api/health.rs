use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;
use tracing::error;

use super::job::dto::MessageResponse;
use super::job::JobService;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(MessageResponse::new("Job Application Tracker API is running!"))
}

/// Health check endpoint
///
/// General health check including database connectivity.
/// Use for load balancers and uptime monitors.
#[get("/health")]
async fn health_check(service: web::Data<JobService>) -> impl Responder {
    probe(&service, "healthy", "unhealthy").await
}

/// Readiness check endpoint
///
/// Returns 503 while the database is unreachable; recovers once it returns.
#[get("/ready")]
async fn readiness_check(service: web::Data<JobService>) -> impl Responder {
    probe(&service, "ready", "not_ready").await
}

/// Liveness check endpoint. Does not check dependencies.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        database: "not_checked".to_string(),
        storage: "not_checked".to_string(),
        error: None,
    })
}

async fn probe(service: &JobService, up: &str, down: &str) -> HttpResponse {
    let storage = service.storage_backend().to_string();
    match service.ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: up.to_string(),
            database: "connected".to_string(),
            storage,
            error: None,
        }),
        Err(e) => {
            error!("{} check failed: {:?}", down, e);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: down.to_string(),
                database: "disconnected".to_string(),
                storage,
                error: Some(e.to_string()),
            })
        }
    }
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(index)
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
