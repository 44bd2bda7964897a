//! Resume artifacts and the rules tying them to job records.

use actix_web::web::Bytes;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

pub mod lifecycle;
pub mod locks;

pub use lifecycle::ResumeLifecycle;

/// A persisted pointer to a resume artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeRef {
    /// Local path, `s3://` URI, or an external URL
    pub locator: String,
    /// Display folder recorded at upload time
    pub folder: Option<String>,
}

/// Raw resume bytes received from a client
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub data: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// What a create or update request supplied for the resume
#[derive(Debug, Clone)]
pub enum ResumeSource {
    /// Nothing supplied: no resume on create, unchanged on update
    Keep,
    /// New bytes to store
    Upload(ResumeUpload),
    /// A pre-uploaded artifact URL, used as-is
    Locator(String),
    /// Reuse whatever resume another job holds
    ShareFrom(i32),
}

/// The reference chosen for a write, and whether it was uploaded just now.
///
/// A reference borrowed from another job stays locked until the resolution
/// is dropped, so it cannot be purged before the write that shares it commits.
#[derive(Debug)]
pub struct Resolution {
    pub reference: Option<ResumeRef>,
    pub uploaded: bool,
    pin: Option<OwnedMutexGuard<()>>,
}

impl Resolution {
    pub fn new(reference: Option<ResumeRef>, uploaded: bool) -> Self {
        Self {
            reference,
            uploaded,
            pin: None,
        }
    }

    fn pinned(reference: ResumeRef, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            reference: Some(reference),
            uploaded: false,
            pin: Some(guard),
        }
    }

    #[cfg(test)]
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }

    pub fn locator(&self) -> Option<&str> {
        self.reference.as_ref().map(|r| r.locator.as_str())
    }
}

/// One artifact and the jobs that hold it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeSummary {
    pub folder: Option<String>,
    pub job_ids: Vec<i32>,
    pub shared: bool,
    /// False for external URLs the service will never delete
    pub managed: bool,
}

/// Outcome of an orphan sweep over the storage backend
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    /// Unreferenced but younger than the grace period; possibly mid-write
    pub recent: usize,
    pub orphaned: Vec<String>,
    pub deleted: usize,
    pub failed: usize,
}
