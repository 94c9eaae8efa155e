//! Bulk reconciliation jobs.
//!
//! # Responsibility
//! - Scan objects in pages and commit each page's partial updates as one
//!   batch (`bulk`).
//! - Admin maintenance jobs built on that scan: tag and space renames,
//!   custom badges, merges, recounts, wipes (`jobs`).
//! - Export/import of the whole store (`backup`).
//! - Run jobs off the request path on a worker pool (`worker`).
//!
//! # Invariants
//! - A failure stops the job; pages committed before it stay committed.
//! - Jobs never hold one transaction across pages.

pub mod backup;
pub mod bulk;
pub mod jobs;
pub mod worker;

use crate::repo::RepoError;
use crate::service::tag_refcount::TagError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("job `{job}` aborted after {pages} pages: {source}")]
    Aborted {
        job: String,
        pages: u64,
        #[source]
        source: RepoError,
    },
    #[error("job `{job}` failed: {source}")]
    Tags {
        job: String,
        #[source]
        source: TagError,
    },
    #[error("job `{job}` target not found: {target}")]
    MissingTarget { job: String, target: String },
    #[error("unsupported backup format version {0}")]
    UnsupportedBackup(u32),
}

/// Progress counters of one job run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub job: String,
    pub pages: u64,
    pub scanned: u64,
    pub patched: u64,
    pub created: u64,
    pub deleted: u64,
}

impl ReconcileReport {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            ..Self::default()
        }
    }

    /// Folds another run's counters into this one.
    pub fn absorb(&mut self, other: &ReconcileReport) {
        self.pages += other.pages;
        self.scanned += other.scanned;
        self.patched += other.patched;
        self.created += other.created;
        self.deleted += other.deleted;
    }
}
