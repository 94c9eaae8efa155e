//! Reputation and moderation ledger for a Q&A forum.
//!
//! Votes, reputation, badges and tag counts live here; the forum's request
//! handlers call into [`service`], administrators into [`reconcile`].

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, LedgerConfig};
pub use logging::{init_logging, LoggingError};
pub use model::badge::{Badge, BadgeSet};
pub use model::comment::Comment;
pub use model::post::{Post, PostKind};
pub use model::profile::{Profile, Role};
pub use model::record::{ObjectKey, ObjectKind, Record};
pub use model::report::{Report, ReportKind};
pub use model::space::Space;
pub use model::tag::Tag;
pub use model::votable::{Votable, VotableKind};
pub use model::vote::{Vote, VoteValue};
pub use reconcile::backup::{export_all, import_all, Backup};
pub use reconcile::bulk::{BulkReconciler, PageScan};
pub use reconcile::jobs::UserSelection;
pub use reconcile::worker::{JobTicket, ReconcileJob, ReconcileWorkerHandle, WorkerError};
pub use reconcile::{ReconcileError, ReconcileReport};
pub use repo::datastore::{Datastore, Document, Filter, Patch, VoteOutcome, VoteRejection};
pub use repo::pager::{Pager, SortKey};
pub use repo::sqlite_store::SqliteDatastore;
pub use repo::{RepoError, RepoResult};
pub use service::badges::BadgeEngine;
pub use service::post_service::{PostEdit, PostError, PostService, QuestionDraft};
pub use service::reputation::ReputationEngine;
pub use service::space_cache::SpaceCache;
pub use service::tag_refcount::{TagError, TagRefcounter};
pub use service::vote_ledger::{PriorVote, VoteLedger};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
