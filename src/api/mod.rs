pub mod health;
pub mod job;
pub mod resumes;
pub mod validation;
