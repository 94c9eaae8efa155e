//! Object datastore contract.
//!
//! # Responsibility
//! - Document-level primitives every adapter implements.
//! - Typed conveniences (`create`, `read_all`, `find_query`, ...) layered on
//!   those primitives as default methods.
//! - The atomic conditional vote write and its decision rule.
//! - `update_all_partially`, the page-callback loop bulk jobs are built on.
//!
//! # Invariants
//! - `create_documents` upserts: creating an existing object overwrites it.
//! - `patch_all` only touches the named fields of each object.
//! - `vote` writes the vote record and the votable counter atomically or not
//!   at all.

use crate::config::VoteWindowConfig;
use crate::model::record::{ObjectKey, ObjectKind, Record};
use crate::model::vote::{Vote, VoteValue};
use crate::repo::pager::Pager;
use crate::repo::{RepoError, RepoResult};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One stored object as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: ObjectKind,
    pub id: String,
    pub body: Value,
}

impl Document {
    pub fn from_record<T: Record>(record: &T) -> RepoResult<Self> {
        Ok(Self {
            kind: T::KIND,
            id: record.id().to_string(),
            body: serde_json::to_value(record)?,
        })
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind, self.id.clone())
    }

    /// Decodes into `T`, rejecting documents of another kind.
    pub fn decode<T: Record>(&self) -> RepoResult<T> {
        if self.kind != T::KIND {
            return Err(RepoError::InvalidData(format!(
                "document {} is not of kind {}",
                self.key(),
                T::KIND
            )));
        }
        serde_json::from_value(self.body.clone()).map_err(|err| {
            RepoError::InvalidData(format!("document {} failed to decode: {err}", self.key()))
        })
    }
}

/// Query predicate over document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Object's `tags` array contains every listed tag.
    Tagged(Vec<String>),
    /// Top-level field equals a scalar value.
    FieldEquals { field: String, value: Value },
    /// Top-level field (scalar or array) holds at least one of the terms.
    TermInList { field: String, terms: Vec<String> },
    And(Vec<Filter>),
}

impl Filter {
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self::Tagged(vec![tag.into()])
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn term_in_list(field: impl Into<String>, terms: Vec<String>) -> Self {
        Self::TermInList {
            field: field.into(),
            terms,
        }
    }
}

/// Partial update: object id plus the changed fields only.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Patch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteRejection {
    /// Reversal attempted before the lock window elapsed.
    Locked,
    /// Same direction as the live vote.
    Unchanged,
}

/// Result of the atomic conditional vote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote by this voter on the target.
    Cast,
    /// Same-direction vote cast again after the previous one expired.
    Recast,
    /// Direction reversed.
    Corrected { previous: VoteValue },
    Rejected(VoteRejection),
}

impl VoteOutcome {
    pub fn is_applied(self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    pub fn is_correction(self) -> bool {
        matches!(self, Self::Corrected { .. })
    }

    /// Change to the votable counter so it stays the sum of live votes.
    pub fn counter_delta(self, value: VoteValue) -> i64 {
        match self {
            Self::Cast | Self::Recast => value.delta(),
            Self::Corrected { .. } => value.delta() * 2,
            Self::Rejected(_) => 0,
        }
    }
}

/// Decides what a vote request does given the live record.
pub fn decide_vote(existing: Option<&Vote>, value: VoteValue, now_millis: i64) -> VoteOutcome {
    match existing {
        None => VoteOutcome::Cast,
        Some(vote) if vote.value == value => {
            if vote.is_expired(now_millis) {
                VoteOutcome::Recast
            } else {
                VoteOutcome::Rejected(VoteRejection::Unchanged)
            }
        }
        Some(vote) if vote.is_locked(now_millis) => VoteOutcome::Rejected(VoteRejection::Locked),
        Some(vote) => VoteOutcome::Corrected {
            previous: vote.value,
        },
    }
}

/// Object datastore consumed by the ledger.
pub trait Datastore: Send + Sync {
    /// Upserts documents in one batch.
    fn create_documents(&self, docs: &[Document]) -> RepoResult<()>;

    /// Reads documents in one batch; missing keys are absent from the map.
    fn read_documents(&self, keys: &[ObjectKey]) -> RepoResult<HashMap<ObjectKey, Document>>;

    /// Replaces existing documents; returns how many existed.
    fn update_documents(&self, docs: &[Document]) -> RepoResult<usize>;

    /// Deletes objects of one kind; returns how many existed.
    fn delete_all(&self, kind: ObjectKind, ids: &[String]) -> RepoResult<usize>;

    /// Fetches the next page of matches and advances `pager`.
    fn find_documents(
        &self,
        kind: ObjectKind,
        filter: &Filter,
        pager: &mut Pager,
    ) -> RepoResult<Vec<Document>>;

    fn count(&self, kind: ObjectKind, filter: &Filter) -> RepoResult<u64>;

    /// Merges each patch into its object in one batch; returns objects touched.
    fn patch_all(&self, kind: ObjectKind, patches: &[Patch]) -> RepoResult<usize>;

    /// Atomic conditional vote write.
    ///
    /// Applies [`decide_vote`] to the live record of `(voter_id, target)`.
    /// When applied, overwrites the vote record and adds
    /// [`VoteOutcome::counter_delta`] to the target's `votes` field in the same
    /// transaction. Returns `RepoError::NotFound` when the target is missing.
    fn vote(
        &self,
        target: &ObjectKey,
        voter_id: &str,
        value: VoteValue,
        window: VoteWindowConfig,
        now_millis: i64,
    ) -> RepoResult<VoteOutcome>;

    fn create<T: Record>(&self, record: &T) -> RepoResult<()> {
        self.create_documents(&[Document::from_record(record)?])
    }

    fn create_all<T: Record>(&self, records: &[T]) -> RepoResult<()> {
        let docs = records
            .iter()
            .map(Document::from_record)
            .collect::<RepoResult<Vec<_>>>()?;
        self.create_documents(&docs)
    }

    fn read<T: Record>(&self, id: &str) -> RepoResult<Option<T>> {
        let key = ObjectKey::new(T::KIND, id);
        match self.read_documents(std::slice::from_ref(&key))?.get(&key) {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Reads existing records in input order.
    fn read_all<T: Record>(&self, ids: &[String]) -> RepoResult<Vec<T>> {
        let keys: Vec<ObjectKey> = ids.iter().map(|id| ObjectKey::new(T::KIND, id)).collect();
        let docs = self.read_documents(&keys)?;
        keys.iter()
            .filter_map(|key| docs.get(key))
            .map(Document::decode)
            .collect()
    }

    fn update<T: Record>(&self, record: &T) -> RepoResult<()> {
        if self.update_documents(&[Document::from_record(record)?])? == 0 {
            return Err(RepoError::NotFound(record.key()));
        }
        Ok(())
    }

    fn update_all<T: Record>(&self, records: &[T]) -> RepoResult<usize> {
        let docs = records
            .iter()
            .map(Document::from_record)
            .collect::<RepoResult<Vec<_>>>()?;
        self.update_documents(&docs)
    }

    fn delete(&self, kind: ObjectKind, id: &str) -> RepoResult<bool> {
        Ok(self.delete_all(kind, &[id.to_string()])? > 0)
    }

    fn find_query<T: Record>(&self, filter: &Filter, pager: &mut Pager) -> RepoResult<Vec<T>> {
        self.find_documents(T::KIND, filter, pager)?
            .iter()
            .map(Document::decode)
            .collect()
    }

    fn find_tagged<T: Record>(&self, tags: &[String], pager: &mut Pager) -> RepoResult<Vec<T>> {
        self.find_query(&Filter::Tagged(tags.to_vec()), pager)
    }

    fn find_term_in_list<T: Record>(
        &self,
        field: &str,
        terms: &[String],
        pager: &mut Pager,
    ) -> RepoResult<Vec<T>> {
        self.find_query(&Filter::term_in_list(field, terms.to_vec()), pager)
    }

    fn get_count<T: Record>(&self, filter: &Filter) -> RepoResult<u64> {
        self.count(T::KIND, filter)
    }

    /// Repeatedly calls `callback` with a patch buffer and a shared cursor.
    ///
    /// After each call the buffered patches are committed as one batch and
    /// the buffer is cleared. The loop ends when the callback reports that
    /// its page was empty. Returns the number of objects patched.
    fn update_all_partially<F>(&self, kind: ObjectKind, page_size: u32, mut callback: F) -> RepoResult<usize>
    where
        F: FnMut(&mut Vec<Patch>, &mut Pager) -> RepoResult<usize>,
        Self: Sized,
    {
        let mut pager = Pager::new(page_size);
        let mut to_patch = Vec::new();
        let mut patched = 0;
        loop {
            let seen = callback(&mut to_patch, &mut pager)?;
            if !to_patch.is_empty() {
                patched += self.patch_all(kind, &to_patch)?;
                to_patch.clear();
            }
            if seen == 0 {
                return Ok(patched);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decide_vote, VoteOutcome, VoteRejection};
    use crate::model::vote::{Vote, VoteValue};

    fn vote_at(value: VoteValue, at: i64) -> Vote {
        Vote::new("voter", "target", value, at, 100, 10)
    }

    #[test]
    fn first_vote_is_cast() {
        assert_eq!(decide_vote(None, VoteValue::Up, 0), VoteOutcome::Cast);
    }

    #[test]
    fn same_direction_is_rejected_until_expiry() {
        let live = vote_at(VoteValue::Up, 0);
        assert_eq!(
            decide_vote(Some(&live), VoteValue::Up, 99_999),
            VoteOutcome::Rejected(VoteRejection::Unchanged)
        );
        assert_eq!(
            decide_vote(Some(&live), VoteValue::Up, 100_000),
            VoteOutcome::Recast
        );
    }

    #[test]
    fn reversal_waits_for_lock_window() {
        let live = vote_at(VoteValue::Up, 0);
        assert_eq!(
            decide_vote(Some(&live), VoteValue::Down, 9_999),
            VoteOutcome::Rejected(VoteRejection::Locked)
        );
        let outcome = decide_vote(Some(&live), VoteValue::Down, 10_000);
        assert_eq!(
            outcome,
            VoteOutcome::Corrected {
                previous: VoteValue::Up
            }
        );
        assert_eq!(outcome.counter_delta(VoteValue::Down), -2);
    }
}
