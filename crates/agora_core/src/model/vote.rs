//! Vote records.
//!
//! # Invariants
//! - One record per (voter, target): the id is derived from both.
//! - Corrections and recasts overwrite the record in place.

use crate::model::record::{ObjectKind, Record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn from_upvote(is_upvote: bool) -> Self {
        if is_upvote {
            Self::Up
        } else {
            Self::Down
        }
    }

    /// Counter contribution of this vote.
    pub fn delta(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub voter_id: String,
    pub target_id: String,
    pub value: VoteValue,
    pub created_at: i64,
    /// After this instant the same-direction vote may be cast again.
    pub expires_at: i64,
    /// Before this instant the vote cannot be reversed.
    pub locked_until: i64,
}

impl Record for Vote {
    const KIND: ObjectKind = ObjectKind::Vote;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Vote {
    /// Deterministic record id for a (voter, target) pair.
    pub fn id_for(voter_id: &str, target_id: &str) -> String {
        format!("{voter_id}:{target_id}")
    }

    pub fn new(
        voter_id: &str,
        target_id: &str,
        value: VoteValue,
        now_millis: i64,
        expires_after_sec: i64,
        locked_after_sec: i64,
    ) -> Self {
        Self {
            id: Self::id_for(voter_id, target_id),
            voter_id: voter_id.to_string(),
            target_id: target_id.to_string(),
            value,
            created_at: now_millis,
            expires_at: now_millis.saturating_add(expires_after_sec.saturating_mul(1000)),
            locked_until: now_millis.saturating_add(locked_after_sec.saturating_mul(1000)),
        }
    }

    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }

    pub fn is_locked(&self, now_millis: i64) -> bool {
        now_millis < self.locked_until
    }
}
