//! Ledger domain model.
//!
//! # Responsibility
//! - Define the records the ledger derives aggregate state from (posts,
//!   comments, votes) and the aggregates themselves (profiles, tags).
//! - Keep pure, storage-independent rules (rolling vote-gain buckets, badge
//!   multiset, tag normalization) next to the data they govern.
//!
//! # Invariants
//! - Every stored object has a stable string id unique within its kind.
//! - Reputation never goes below zero.

pub mod badge;
pub mod comment;
pub mod post;
pub mod profile;
pub mod record;
pub mod report;
pub mod space;
pub mod tag;
pub mod votable;
pub mod vote;
