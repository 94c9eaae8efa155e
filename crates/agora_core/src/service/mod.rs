//! Request-path ledger services.
//!
//! # Responsibility
//! - Vote ledger, reputation and badge engines, tag refcounting and the post
//!   use-cases that drive them, all executed synchronously on the caller's
//!   thread.
//! - Keep storage access behind the `Datastore` contract.
//!
//! # Invariants
//! - Profiles touched by one operation are written in one batch.
//! - Business rejections return `false`/no-op; datastore failures propagate.

pub mod badges;
pub mod post_service;
pub mod reputation;
pub mod space_cache;
pub mod tag_refcount;
pub mod vote_ledger;
