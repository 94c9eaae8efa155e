//! Datastore contract and persistence implementations.
//!
//! # Responsibility
//! - Define the object-datastore contract the ledger consumes: document
//!   CRUD, batch operations, paginated typed queries, partial updates and the
//!   atomic conditional vote write.
//! - Provide the SQLite document-store adapter for that contract.
//!
//! # Invariants
//! - Services depend on the [`datastore::Datastore`] trait only.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   transport errors.

pub mod datastore;
pub mod pager;
pub mod sqlite_store;

use crate::db::DbError;
use crate::model::record::ObjectKey;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from datastore operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("object not found: {0}")]
    NotFound(ObjectKey),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("document encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
