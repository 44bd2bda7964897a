use std::sync::Arc;

use actix_cors::Cors;
use actix_multipart::form::MultipartFormConfig;
use actix_web::{http::header, middleware, web, App, HttpServer};
use clap::Parser;
use sqlx::{Pool, Postgres};
use tracing::{error, info, warn};

mod api;
mod cli;
mod config;
mod db;
mod error;
mod logging;
mod resume;
mod shutdown;
mod storage;
#[cfg(test)]
mod testing;

use crate::api::{
    health::health_config,
    job::{job_config, JobService},
    resumes::resumes_config,
    validation,
};
use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::db::JobRepository;
use crate::resume::ResumeLifecycle;
use crate::shutdown::ShutdownCoordinator;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = Config::from_env().map_err(std::io::Error::other)?;

    // Log files will be created as: logs/info.log.2024-12-22, logs/error.log.2024-12-22, etc.
    logging::init(&config.log_dir)?;

    let pool = db::connection::get_connection(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            std::io::Error::other(e)
        })?;
    info!("Database connection pool established");

    match cli.command() {
        Command::Migrate => migrate(&pool).await,
        Command::Sweep { dry_run } => sweep(&config, pool, *dry_run).await,
        Command::Serve => serve(config, pool).await,
    }
}

async fn migrate(pool: &Pool<Postgres>) -> std::io::Result<()> {
    db::migrations::run_migrations(pool).await.map_err(|e| {
        error!("Failed to run database migrations: {}", e);
        std::io::Error::other(e)
    })
}

fn resume_lifecycle(
    config: &Config,
    storage: Arc<dyn storage::ResumeStorage>,
    pool: &Pool<Postgres>,
) -> (Arc<JobRepository>, Arc<ResumeLifecycle>) {
    let repository = Arc::new(JobRepository::new(pool.clone()));
    let lifecycle = ResumeLifecycle::new(storage, repository.clone(), config.storage_timeout)
        .with_sweep_grace(config.sweep_grace);
    (repository, Arc::new(lifecycle))
}

async fn sweep(config: &Config, pool: Pool<Postgres>, dry_run: bool) -> std::io::Result<()> {
    migrate(&pool).await?;
    let storage = storage::connect(&config.storage).await.map_err(std::io::Error::other)?;
    let (_, lifecycle) = resume_lifecycle(config, storage, &pool);

    let report = lifecycle.sweep(dry_run).await.map_err(std::io::Error::other)?;
    info!(
        "Sweep finished: scanned={} recent={} orphaned={} deleted={} failed={} dry_run={}",
        report.scanned,
        report.recent,
        report.orphaned.len(),
        report.deleted,
        report.failed,
        dry_run
    );
    for locator in &report.orphaned {
        info!("  orphan: {}", locator);
    }

    pool.close().await;
    Ok(())
}

async fn serve(config: Config, pool: Pool<Postgres>) -> std::io::Result<()> {
    info!("Starting job-tracker application");
    info!("Configuration loaded successfully:");
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Max database connections: {}", config.max_db_connections);
    info!("  - Storage timeout: {:?}", config.storage_timeout);

    // Run migrations on startup (auto-migrate when starting server)
    migrate(&pool).await?;

    let storage = storage::connect(&config.storage).await.map_err(|e| {
        error!("Failed to initialise resume storage: {}", e);
        std::io::Error::other(e)
    })?;
    info!("Resume storage backend: {}", storage.backend());

    let (repository, lifecycle) = resume_lifecycle(&config, storage, &pool);
    let job_service = web::Data::new(JobService::new(repository, lifecycle));

    if config.cors_allowed_origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty; browsers on other origins will be refused");
    }

    let max_payload_size = config.max_payload_size;
    let origins = config.cors_allowed_origins.clone();

    let server = HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
            .supports_credentials()
            .max_age(3600);

        // Configure payload size limits globally
        let payload_config = web::PayloadConfig::default().limit(max_payload_size);

        let multipart_config = MultipartFormConfig::default()
            .total_limit(max_payload_size)
            .memory_limit(max_payload_size);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(job_service.clone())
            .app_data(payload_config)
            .app_data(multipart_config)
            .app_data(validation::json_config())
            .configure(health_config)
            .configure(job_config)
            .configure(resumes_config)
    });

    info!("Server starting on http://{}:{}", config.bind_addr, config.port);

    let server = server.bind((config.bind_addr.as_str(), config.port))?.run();

    // Get server handle for graceful shutdown
    let server_handle = server.handle();

    // Spawn server in background
    let server_task = tokio::spawn(server);

    ShutdownCoordinator::new(server_handle, server_task, pool)
        .wait_for_shutdown()
        .await
}
