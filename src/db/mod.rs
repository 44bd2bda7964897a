pub mod connection;
pub mod job_repository;
pub mod migrations;
pub mod models;

pub use job_repository::{JobRepository, JobStore};
pub use models::{JobRow, NewJob, UpdatedJob};
