//! Admin maintenance jobs built on [`BulkReconciler`].
//!
//! Each job scans its targets page by page and commits one batch per page,
//! so progress survives a failure part-way through.

use crate::config::TagPolicy;
use crate::model::comment::Comment;
use crate::model::post::Post;
use crate::model::profile::{Profile, Role};
use crate::model::record::ObjectKind;
use crate::model::space::{Space, DEFAULT_SPACE};
use crate::model::tag::{normalize_tag, normalize_tags, Tag};
use crate::reconcile::bulk::{abort, log_done, BulkReconciler, PageScan};
use crate::reconcile::{ReconcileError, ReconcileReport};
use crate::repo::datastore::{Datastore, Filter, Patch};
use crate::service::tag_refcount::{TagError, TagRefcounter};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which profiles a bulk profile job touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelection {
    All,
    Ids(Vec<String>),
}

impl UserSelection {
    fn filter(&self) -> Filter {
        match self {
            Self::All => Filter::All,
            Self::Ids(ids) => Filter::term_in_list("id", ids.clone()),
        }
    }
}

fn tag_name(job: &str, raw: &str) -> Result<String, ReconcileError> {
    normalize_tag(raw).ok_or_else(|| ReconcileError::MissingTarget {
        job: job.to_string(),
        target: raw.to_string(),
    })
}

fn string_list(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

/// Replaces `from` with `to` on every tagged post and moves the tag record.
pub fn rename_tag<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    from: &str,
    to: &str,
) -> Result<ReconcileReport, ReconcileError> {
    const JOB: &str = "rename_tag";
    let from = tag_name(JOB, from)?;
    let to = tag_name(JOB, to)?;
    if from == to {
        return Ok(ReconcileReport::new(JOB));
    }

    let mut report = bulk.patch_each::<Post, _>(JOB, &Filter::tagged(from.as_str()), |post| {
        let renamed: Vec<String> = post
            .tags
            .iter()
            .map(|tag| if *tag == from { to.clone() } else { tag.clone() })
            .collect();
        Some(Patch::new(post.id.as_str()).set("tags", string_list(normalize_tags(&renamed))))
    })?;

    let store = bulk.store();
    let carried = store
        .count(ObjectKind::Post, &Filter::tagged(to.as_str()))
        .map_err(|source| abort(JOB, report.pages, source))?;
    let mut target = store
        .read::<Tag>(&to)
        .map_err(|source| abort(JOB, report.pages, source))?
        .unwrap_or_else(|| {
            report.created += 1;
            Tag::new(to.as_str(), 0)
        });
    if let Some(source_tag) = store
        .read::<Tag>(&from)
        .map_err(|source| abort(JOB, report.pages, source))?
    {
        if target.description.is_none() {
            target.description = source_tag.description;
        }
    }
    target.count = i64::try_from(carried).unwrap_or(i64::MAX);
    store
        .create(&target)
        .map_err(|source| abort(JOB, report.pages, source))?;
    report.deleted += store
        .delete_all(ObjectKind::Tag, &[from])
        .map_err(|source| abort(JOB, report.pages, source))? as u64;
    log_done(&report);
    Ok(report)
}

/// Strips `tag` from every post and deletes its record.
pub fn delete_tag<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    tag: &str,
) -> Result<ReconcileReport, ReconcileError> {
    const JOB: &str = "delete_tag";
    let tag = tag_name(JOB, tag)?;
    let mut report = bulk.patch_each::<Post, _>(JOB, &Filter::tagged(tag.as_str()), |post| {
        let kept: Vec<String> = post.tags.iter().filter(|t| **t != tag).cloned().collect();
        Some(Patch::new(post.id.as_str()).set("tags", string_list(kept)))
    })?;
    report.deleted += bulk
        .store()
        .delete_all(ObjectKind::Tag, &[tag])
        .map_err(|source| abort(JOB, report.pages, source))? as u64;
    Ok(report)
}

/// Renames a space and rewrites every `id:name` reference to it.
pub fn rename_space<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    space_id: &str,
    new_name: &str,
) -> Result<ReconcileReport, ReconcileError> {
    const JOB: &str = "rename_space";
    let store = bulk.store();
    let mut space = store
        .read::<Space>(space_id)
        .map_err(|source| abort(JOB, 0, source))?
        .ok_or_else(|| ReconcileError::MissingTarget {
            job: JOB.to_string(),
            target: space_id.to_string(),
        })?;
    let old_ref = space.reference();
    space.name = new_name.trim().to_string();
    let new_ref = space.reference();

    let mut report = replace_space_reference(bulk, JOB, &old_ref, &new_ref)?;
    store
        .update(&space)
        .map_err(|source| abort(JOB, report.pages, source))?;
    report.patched += 1;
    Ok(report)
}

/// Moves a space's posts to the default space, drops it from every profile
/// and deletes the space record.
pub fn delete_space<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    space_id: &str,
) -> Result<ReconcileReport, ReconcileError> {
    const JOB: &str = "delete_space";
    let store = bulk.store();
    let space = store
        .read::<Space>(space_id)
        .map_err(|source| abort(JOB, 0, source))?
        .ok_or_else(|| ReconcileError::MissingTarget {
            job: JOB.to_string(),
            target: space_id.to_string(),
        })?;
    let old_ref = space.reference();

    let mut report = bulk.patch_each::<Post, _>(JOB, &Filter::eq("space", old_ref.as_str()), |post| {
        Some(Patch::new(post.id.as_str()).set("space", DEFAULT_SPACE))
    })?;
    let profiles = bulk.patch_each::<Profile, _>(
        JOB,
        &Filter::term_in_list("spaces", vec![old_ref.clone()]),
        |profile| {
            let kept: Vec<String> = profile
                .spaces
                .iter()
                .filter(|space| **space != old_ref)
                .cloned()
                .collect();
            Some(Patch::new(profile.id.as_str()).set("spaces", string_list(kept)))
        },
    )?;
    report.absorb(&profiles);
    report.deleted += store
        .delete_all(ObjectKind::Space, &[space.id])
        .map_err(|source| abort(JOB, report.pages, source))? as u64;
    Ok(report)
}

fn replace_space_reference<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    job: &str,
    old_ref: &str,
    new_ref: &str,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = bulk.patch_each::<Post, _>(job, &Filter::eq("space", old_ref), |post| {
        Some(Patch::new(post.id.as_str()).set("space", new_ref))
    })?;
    let profiles = bulk.patch_each::<Profile, _>(
        job,
        &Filter::term_in_list("spaces", vec![old_ref.to_string()]),
        |profile| {
            let spaces: Vec<String> = profile
                .spaces
                .iter()
                .map(|space| {
                    if space == old_ref {
                        new_ref.to_string()
                    } else {
                        space.clone()
                    }
                })
                .collect();
            Some(Patch::new(profile.id.as_str()).set("spaces", string_list(spaces)))
        },
    )?;
    report.absorb(&profiles);
    Ok(report)
}

/// Adds space references to the selected profiles. Profiles already in
/// every listed space are left untouched.
pub fn assign_spaces<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    selection: &UserSelection,
    spaces: &[String],
) -> Result<ReconcileReport, ReconcileError> {
    bulk.patch_each::<Profile, _>("assign_spaces", &selection.filter(), |profile| {
        let missing: Vec<&String> = spaces
            .iter()
            .filter(|space| !profile.spaces.contains(space))
            .collect();
        if missing.is_empty() {
            return None;
        }
        let mut merged = profile.spaces.clone();
        merged.extend(missing.into_iter().cloned());
        Some(Patch::new(profile.id.as_str()).set("spaces", string_list(merged)))
    })
}

/// Adds (`grant`) or removes an admin-defined badge marker on the selected
/// profiles.
pub fn set_custom_badge<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    selection: &UserSelection,
    marker: &str,
    grant: bool,
) -> Result<ReconcileReport, ReconcileError> {
    let job = if grant {
        "assign_custom_badge"
    } else {
        "revoke_custom_badge"
    };
    let marker = marker.trim();
    bulk.patch_each::<Profile, _>(job, &selection.filter(), |profile| {
        let held = profile.custom_badges.iter().any(|badge| badge == marker);
        let badges: Vec<String> = match (grant, held) {
            (true, false) => {
                let mut badges = profile.custom_badges.clone();
                badges.push(marker.to_string());
                badges
            }
            (false, true) => profile
                .custom_badges
                .iter()
                .filter(|badge| *badge != marker)
                .cloned()
                .collect(),
            _ => return None,
        };
        Some(Patch::new(profile.id.as_str()).set("custom_badges", string_list(badges)))
    })
}

/// Points every answer and comment of `from_question` at `to_question`.
pub fn reparent_answers<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    from_question: &str,
    to_question: &str,
) -> Result<ReconcileReport, ReconcileError> {
    const JOB: &str = "reparent_answers";
    let filter = Filter::eq("parent_id", from_question);
    let mut report = bulk.patch_each::<Post, _>(JOB, &filter, |answer| {
        Some(Patch::new(answer.id.as_str()).set("parent_id", to_question))
    })?;
    let comments = bulk.patch_each::<Comment, _>(JOB, &filter, |comment| {
        Some(Patch::new(comment.id.as_str()).set("parent_id", to_question))
    })?;
    report.absorb(&comments);
    Ok(report)
}

/// Folds `source_id` into `target_id`: answers and comments move, tags are
/// unioned, answer counts add up, and the source question is deleted.
pub fn merge_questions<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    policy: TagPolicy,
    source_id: &str,
    target_id: &str,
) -> Result<ReconcileReport, ReconcileError> {
    const JOB: &str = "merge_questions";
    let store = bulk.store();
    let load = |id: &str| -> Result<Post, ReconcileError> {
        store
            .read::<Post>(id)
            .map_err(|source| abort(JOB, 0, source))?
            .filter(Post::is_question)
            .ok_or_else(|| ReconcileError::MissingTarget {
                job: JOB.to_string(),
                target: id.to_string(),
            })
    };
    let absorbed = load(source_id)?;
    let mut target = load(target_id)?;

    let mut report = reparent_answers(bulk, &absorbed.id, &target.id)?;
    report.job = JOB.to_string();

    let tags = TagRefcounter::new(store, policy);
    let tag_failure = |source: TagError| ReconcileError::Tags {
        job: JOB.to_string(),
        source,
    };
    let mut union = target.tags.clone();
    union.extend(absorbed.tags.iter().cloned());
    target.tags = tags
        .reconcile(&target.tags, &union, Role::Admin)
        .map_err(tag_failure)?;
    tags.release(&absorbed.tags).map_err(tag_failure)?;

    target.answer_count += absorbed.answer_count;
    if target.answer_id.is_none() {
        target.answer_id = absorbed.answer_id.clone();
    }
    store
        .update(&target)
        .map_err(|source| abort(JOB, report.pages, source))?;
    report.patched += 1;
    report.deleted += store
        .delete_all(ObjectKind::Post, &[absorbed.id])
        .map_err(|source| abort(JOB, report.pages, source))? as u64;
    log_done(&report);
    Ok(report)
}

/// Deletes every object of `kind`.
pub fn delete_all_of_kind<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    kind: ObjectKind,
) -> Result<ReconcileReport, ReconcileError> {
    bulk.delete_kind(&format!("delete_all_{kind}"), kind)
}

/// Recomputes every tag count from the posts that carry it.
///
/// Records whose true count is zero are deleted; tags in use without a
/// record get one.
pub fn recount_tags<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
) -> Result<ReconcileReport, ReconcileError> {
    const JOB: &str = "recount_tags";
    let store = bulk.store();
    let mut report = ReconcileReport::new(JOB);

    let mut actual: BTreeMap<String, i64> = BTreeMap::new();
    for page in PageScan::new(store, ObjectKind::Post, Filter::All, bulk.page_size()).records::<Post>()
    {
        let page = page.map_err(|source| abort(JOB, report.pages, source))?;
        report.pages += 1;
        report.scanned += page.len() as u64;
        for post in page {
            for tag in normalize_tags(&post.tags) {
                *actual.entry(tag).or_insert(0) += 1;
            }
        }
    }

    let mut stale = Vec::new();
    let corrected = bulk.patch_each::<Tag, _>(JOB, &Filter::All, |tag| match actual.remove(&tag.id) {
        None => {
            stale.push(tag.id.clone());
            None
        }
        Some(count) if count != tag.count => {
            Some(Patch::new(tag.id.as_str()).set("count", count))
        }
        Some(_) => None,
    })?;
    report.absorb(&corrected);

    let missing: Vec<Tag> = actual
        .into_iter()
        .map(|(tag, count)| Tag::new(tag, count))
        .collect();
    if !missing.is_empty() {
        store
            .create_all(&missing)
            .map_err(|source| abort(JOB, report.pages, source))?;
        report.created += missing.len() as u64;
    }
    if !stale.is_empty() {
        report.deleted += store
            .delete_all(ObjectKind::Tag, &stale)
            .map_err(|source| abort(JOB, report.pages, source))? as u64;
    }
    log_done(&report);
    Ok(report)
}
