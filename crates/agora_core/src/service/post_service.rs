//! Post use-cases that drive tag refcounting and answer approval.
//!
//! # Responsibility
//! - Create, edit and delete questions and replies, keeping tag counts and
//!   parent answer counts in step.
//! - Approve, change and undo accepted answers with their reputation and
//!   badge round trip.
//!
//! # Invariants
//! - Tag counts are reconciled before the post is written with new tags.
//! - Approval rewards are skipped when the approver wrote the answer.

use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::model::comment::Comment;
use crate::model::post::Post;
use crate::model::profile::Profile;
use crate::model::record::ObjectKind;
use crate::model::space::DEFAULT_SPACE;
use crate::repo::datastore::{Datastore, Filter};
use crate::reconcile::bulk::BulkReconciler;
use crate::reconcile::ReconcileError;
use crate::repo::RepoError;
use crate::service::reputation::ReputationEngine;
use crate::service::space_cache::SpaceCache;
use crate::service::tag_refcount::{TagError, TagRefcounter};
use chrono::{DateTime, Utc};
use log::info;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Tags(#[from] TagError),
    #[error(transparent)]
    Cleanup(#[from] ReconcileError),
    #[error("post not found: {0}")]
    PostNotFound(String),
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("post {0} is not a question")]
    NotAQuestion(String),
    #[error("post {answer_id} is not an answer to {question_id}")]
    NotAnAnswer {
        question_id: String,
        answer_id: String,
    },
    #[error("profile {0} may not approve answers on this question")]
    Forbidden(String),
}

pub type PostResult<T> = Result<T, PostError>;

/// Input for a new question.
#[derive(Debug, Clone, Default)]
pub struct QuestionDraft {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    /// Space reference; unknown spaces fall back to the default space.
    pub space: Option<String>,
}

/// Field changes for an existing post. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub struct PostService<'a, S: Datastore> {
    store: &'a S,
    config: &'a LedgerConfig,
    clock: &'a dyn Clock,
    spaces: Option<&'a SpaceCache>,
}

impl<'a, S: Datastore> PostService<'a, S> {
    pub fn new(store: &'a S, config: &'a LedgerConfig, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            config,
            clock,
            spaces: None,
        }
    }

    /// Validates question spaces against `cache`.
    pub fn with_space_cache(mut self, cache: &'a SpaceCache) -> Self {
        self.spaces = Some(cache);
        self
    }

    fn tags(&self) -> TagRefcounter<'a, S> {
        TagRefcounter::new(self.store, self.config.tags)
    }

    pub fn create_question(&self, author: &Profile, draft: QuestionDraft) -> PostResult<Post> {
        let now = self.clock.now_millis();
        let mut post = Post::question(author.id.as_str(), draft.title, draft.body, now);
        post.space = self.resolve_space(draft.space.as_deref())?;
        post.tags = self.tags().reconcile(&[], &draft.tags, author.role)?;
        self.store.create(&post)?;
        info!(
            "event=post_create module=post_service status=ok post={} kind=question tags={}",
            post.id,
            post.tags.len()
        );
        Ok(post)
    }

    pub fn create_reply(
        &self,
        author: &Profile,
        question_id: &str,
        body: impl Into<String>,
    ) -> PostResult<Post> {
        let mut question = self.load_post(question_id)?;
        if !question.is_question() {
            return Err(PostError::NotAQuestion(question.id));
        }
        let now = self.clock.now_millis();
        let reply = Post::reply(&question, author.id.as_str(), body, now);
        question.answer_count += 1;
        question.updated_at = now;
        self.store.create_all(&[reply.clone(), question])?;
        info!(
            "event=post_create module=post_service status=ok post={} kind=reply parent={}",
            reply.id, question_id
        );
        Ok(reply)
    }

    pub fn edit_post(&self, editor: &Profile, post_id: &str, edit: PostEdit) -> PostResult<Post> {
        let mut post = self.load_post(post_id)?;
        if let Some(title) = edit.title {
            post.title = title;
        }
        if let Some(body) = edit.body {
            post.body = body;
        }
        if let Some(tags) = edit.tags {
            post.tags = self.tags().reconcile(&post.tags, &tags, editor.role)?;
        }
        post.updated_at = self.clock.now_millis();
        self.store.update(&post)?;
        info!(
            "event=post_edit module=post_service status=ok post={} editor={}",
            post.id, editor.id
        );
        Ok(post)
    }

    /// Deletes a post, releasing its tags and deleting its comments.
    /// Deleting a question also deletes its answers; deleting an answer
    /// updates the parent question.
    pub fn delete_post(&self, post_id: &str) -> PostResult<bool> {
        let Some(post) = self.store.read::<Post>(post_id)? else {
            return Ok(false);
        };
        self.tags().release(&post.tags)?;

        let bulk = BulkReconciler::new(self.store, self.config.jobs.page_size);
        let children = Filter::eq("parent_id", post.id.as_str());
        let mut answers_deleted = 0;
        if post.is_question() {
            answers_deleted = bulk
                .delete_each::<Post, _>("delete_answers", &children, Post::is_reply)?
                .deleted;
        } else if let Some(parent_id) = post.parent_id.as_deref() {
            if let Some(mut question) = self.store.read::<Post>(parent_id)? {
                question.answer_count = (question.answer_count - 1).max(0);
                if question.answer_id.as_deref() == Some(post.id.as_str()) {
                    question.answer_id = None;
                }
                self.store.update(&question)?;
            }
        }
        bulk.delete_each::<Comment, _>("delete_comments", &children, |_| true)?;

        let deleted = self.store.delete(ObjectKind::Post, &post.id)?;
        info!(
            "event=post_delete module=post_service status=ok post={} answers_deleted={}",
            post.id, answers_deleted
        );
        Ok(deleted)
    }

    /// Toggles `answer_id` as the accepted answer of `question_id`.
    ///
    /// Approving a different answer first undoes the previous acceptance.
    /// Returns the updated question.
    pub fn approve_answer(
        &self,
        approver_id: &str,
        question_id: &str,
        answer_id: &str,
    ) -> PostResult<Post> {
        let mut question = self.load_post(question_id)?;
        if !question.is_question() {
            return Err(PostError::NotAQuestion(question.id));
        }
        let answer = self.load_post(answer_id)?;
        if !answer.is_reply() || answer.parent_id.as_deref() != Some(question.id.as_str()) {
            return Err(PostError::NotAnAnswer {
                question_id: question.id,
                answer_id: answer.id,
            });
        }

        let mut profiles = ProfileBatch::default();
        let approver = profiles.load(self.store, approver_id)?;
        if question.creator_id != approver_id && !approver.role.is_moderator() {
            return Err(PostError::Forbidden(approver_id.to_string()));
        }

        let engine = ReputationEngine::new(self.config);
        let now = self.clock.now();

        let undo_only = question.answer_id.as_deref() == Some(answer_id);
        if let Some(previous_id) = question.answer_id.take() {
            if let Some(previous) = self.store.read::<Post>(&previous_id)? {
                self.settle_approval(&engine, &mut profiles, approver_id, &previous, false, now)?;
            }
        }
        if !undo_only {
            self.settle_approval(&engine, &mut profiles, approver_id, &answer, true, now)?;
            question.answer_id = Some(answer.id.clone());
        }

        question.updated_at = now.timestamp_millis();
        self.store.update(&question)?;
        self.store.update_all(&profiles.into_vec())?;
        info!(
            "event=answer_approve module=post_service status=ok question={} answer={} accepted={}",
            question.id,
            answer_id,
            !undo_only
        );
        Ok(question)
    }

    fn settle_approval(
        &self,
        engine: &ReputationEngine<'_>,
        profiles: &mut ProfileBatch,
        approver_id: &str,
        answer: &Post,
        approve: bool,
        now: DateTime<Utc>,
    ) -> PostResult<()> {
        if answer.creator_id == approver_id {
            return Ok(());
        }
        profiles.load(self.store, &answer.creator_id)?;
        let (author, approver) = profiles.pair_mut(&answer.creator_id, approver_id);
        if let (Some(author), Some(approver)) = (author, approver) {
            engine.apply_answer_approval(author, approver, approve, now);
        }
        Ok(())
    }

    fn load_post(&self, post_id: &str) -> PostResult<Post> {
        self.store
            .read::<Post>(post_id)?
            .ok_or_else(|| PostError::PostNotFound(post_id.to_string()))
    }

    fn resolve_space(&self, requested: Option<&str>) -> PostResult<String> {
        let Some(requested) = requested else {
            return Ok(DEFAULT_SPACE.to_string());
        };
        let Some(cache) = self.spaces else {
            return Ok(requested.to_string());
        };
        match cache.resolve(self.store, requested)? {
            Some(reference) => Ok(reference),
            None => {
                info!(
                    "event=post_create module=post_service status=fallback reason=unknown_space space={}",
                    requested
                );
                Ok(DEFAULT_SPACE.to_string())
            }
        }
    }
}

/// Profiles loaded once and written back together.
#[derive(Default)]
struct ProfileBatch {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileBatch {
    fn load<S: Datastore>(&mut self, store: &S, id: &str) -> PostResult<&Profile> {
        if !self.profiles.contains_key(id) {
            let profile = store
                .read::<Profile>(id)?
                .ok_or_else(|| PostError::ProfileNotFound(id.to_string()))?;
            self.profiles.insert(id.to_string(), profile);
        }
        self.profiles
            .get(id)
            .ok_or_else(|| PostError::ProfileNotFound(id.to_string()))
    }

    /// Mutable access to two distinct loaded profiles.
    fn pair_mut(&mut self, first: &str, second: &str) -> (Option<&mut Profile>, Option<&mut Profile>) {
        let mut a = None;
        let mut b = None;
        for (id, profile) in self.profiles.iter_mut() {
            if id == first {
                a = Some(profile);
            } else if id == second {
                b = Some(profile);
            }
        }
        (a, b)
    }

    fn into_vec(self) -> Vec<Profile> {
        self.profiles.into_values().collect()
    }
}
