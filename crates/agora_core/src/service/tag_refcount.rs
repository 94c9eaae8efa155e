//! Tag reference counting.
//!
//! # Responsibility
//! - Normalize and cap a post's requested tags under the tag policy.
//! - Keep each tag record's `count` in step with the posts that carry it:
//!   create on first use, increment, decrement, delete when unused.
//!
//! # Invariants
//! - Only the symmetric difference of old/new tags touches storage.
//! - A decrement that would leave a tag at zero or below is verified by
//!   recounting tagged posts before the tag is deleted.
//! - Tag creates, updates and deletes are issued as one batch each.
//! - The tag policy (creation, max, min) applies to create/edit only;
//!   releasing a deleted post's tags never fails on policy.

use crate::config::TagPolicy;
use crate::model::profile::Role;
use crate::model::record::ObjectKind;
use crate::model::tag::{normalize_tags, Tag};
use crate::repo::datastore::{Datastore, Filter};
use crate::repo::RepoError;
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("post needs at least {min} tags, got {got}")]
    TooFewTags { min: usize, got: usize },
}

/// Tags added and removed between two tag lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Symmetric difference of two normalized tag lists, order-preserving.
pub fn diff_tags(old: &[String], new: &[String]) -> TagDiff {
    let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
    let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();
    TagDiff {
        added: new
            .iter()
            .filter(|tag| !old_set.contains(tag.as_str()))
            .cloned()
            .collect(),
        removed: old
            .iter()
            .filter(|tag| !new_set.contains(tag.as_str()))
            .cloned()
            .collect(),
    }
}

pub struct TagRefcounter<'a, S: Datastore> {
    store: &'a S,
    policy: TagPolicy,
}

impl<'a, S: Datastore> TagRefcounter<'a, S> {
    pub fn new(store: &'a S, policy: TagPolicy) -> Self {
        Self { store, policy }
    }

    /// Updates tag counts for a post whose tags change from `old_tags` to
    /// `new_tags` and returns the tag list the post should store.
    ///
    /// Must run before the post itself is persisted with its new tags.
    pub fn reconcile(
        &self,
        old_tags: &[String],
        new_tags: &[String],
        actor: Role,
    ) -> Result<Vec<String>, TagError> {
        let old = normalize_tags(old_tags);
        let mut requested = normalize_tags(new_tags);

        let mut ids = old.clone();
        ids.extend(requested.iter().filter(|tag| !old.contains(tag)).cloned());
        let existing = self.load_existing(&ids)?;

        if !self.policy.allow_tag_creation && !actor.is_moderator() {
            let before = requested.len();
            requested.retain(|tag| existing.contains_key(tag) || old.contains(tag));
            if requested.len() < before {
                info!(
                    "event=tag_reconcile module=tag_refcount status=filtered dropped={}",
                    before - requested.len()
                );
            }
        }
        requested.truncate(self.policy.max_tags_per_post);
        if requested.len() < self.policy.min_tags_per_post {
            return Err(TagError::TooFewTags {
                min: self.policy.min_tags_per_post,
                got: requested.len(),
            });
        }

        self.apply_diff(&old, &requested, &existing)?;
        Ok(requested)
    }

    /// Drops one use of each of `tags`, as when the post carrying them is
    /// deleted or merged away.
    pub fn release(&self, tags: &[String]) -> Result<(), TagError> {
        let old = normalize_tags(tags);
        if old.is_empty() {
            return Ok(());
        }
        let existing = self.load_existing(&old)?;
        self.apply_diff(&old, &[], &existing)
    }

    fn load_existing(&self, ids: &[String]) -> Result<HashMap<String, Tag>, TagError> {
        Ok(self
            .store
            .read_all::<Tag>(ids)?
            .into_iter()
            .map(|tag| (tag.id.clone(), tag))
            .collect())
    }

    fn apply_diff(
        &self,
        old: &[String],
        requested: &[String],
        existing: &HashMap<String, Tag>,
    ) -> Result<(), TagError> {
        let diff = diff_tags(old, requested);
        if diff.is_empty() {
            return Ok(());
        }

        let mut to_create = Vec::new();
        let mut to_update = Vec::new();
        let mut to_delete = Vec::new();

        for tag in &diff.added {
            match existing.get(tag) {
                Some(record) => {
                    let mut record = record.clone();
                    record.count += 1;
                    to_update.push(record);
                }
                None => to_create.push(Tag::new(tag.as_str(), 1)),
            }
        }

        for tag in &diff.removed {
            let Some(record) = existing.get(tag) else {
                continue;
            };
            let next = record.count - 1;
            if next > 0 {
                let mut record = record.clone();
                record.count = next;
                to_update.push(record);
                continue;
            }
            // The edited post still carries its old tags at this point.
            let tagged = self.store.count(ObjectKind::Post, &Filter::tagged(tag.as_str()))?;
            if tagged <= 1 {
                to_delete.push(tag.clone());
            } else {
                warn!(
                    "event=tag_reconcile module=tag_refcount status=drift tag={} stored={} actual={}",
                    tag, record.count, tagged
                );
                let mut record = record.clone();
                record.count = i64::try_from(tagged - 1).unwrap_or(i64::MAX);
                to_update.push(record);
            }
        }

        if !to_create.is_empty() {
            self.store.create_all(&to_create)?;
        }
        if !to_update.is_empty() {
            self.store.update_all(&to_update)?;
        }
        if !to_delete.is_empty() {
            self.store.delete_all(ObjectKind::Tag, &to_delete)?;
        }

        info!(
            "event=tag_reconcile module=tag_refcount status=ok created={} updated={} deleted={}",
            to_create.len(),
            to_update.len(),
            to_delete.len()
        );
        Ok(())
    }
}
