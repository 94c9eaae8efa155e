//! Posts: questions, replies and their moderation variants.
//!
//! Kind and approval state are orthogonal: any kind can sit in the
//! moderation queue via `needs_approval`.

use crate::model::record::{ObjectKind, Record};
use crate::model::space::DEFAULT_SPACE;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Question,
    /// Answer to a question; `parent_id` points at the question.
    Reply,
    Feedback,
    /// Pinned announcement.
    Sticky,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub kind: PostKind,
    #[serde(default)]
    pub needs_approval: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Normalized tags in insertion order.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_space")]
    pub space: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub creator_id: String,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub answer_count: i64,
    /// Accepted reply id.
    #[serde(default)]
    pub answer_id: Option<String>,
    #[serde(default)]
    pub closed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_space() -> String {
    DEFAULT_SPACE.to_string()
}

impl Record for Post {
    const KIND: ObjectKind = ObjectKind::Post;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Post {
    /// Creates a post with a generated id in the default space.
    pub fn new(kind: PostKind, creator_id: impl Into<String>, now_millis: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            needs_approval: false,
            title: String::new(),
            body: String::new(),
            tags: Vec::new(),
            space: default_space(),
            parent_id: None,
            creator_id: creator_id.into(),
            votes: 0,
            answer_count: 0,
            answer_id: None,
            closed: false,
            created_at: now_millis,
            updated_at: now_millis,
        }
    }

    pub fn question(
        creator_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        now_millis: i64,
    ) -> Self {
        let mut post = Self::new(PostKind::Question, creator_id, now_millis);
        post.title = title.into();
        post.body = body.into();
        post
    }

    pub fn reply(
        question: &Post,
        creator_id: impl Into<String>,
        body: impl Into<String>,
        now_millis: i64,
    ) -> Self {
        let mut post = Self::new(PostKind::Reply, creator_id, now_millis);
        post.body = body.into();
        post.parent_id = Some(question.id.clone());
        post.space = question.space.clone();
        post
    }

    pub fn is_question(&self) -> bool {
        self.kind == PostKind::Question
    }

    pub fn is_reply(&self) -> bool {
        self.kind == PostKind::Reply
    }
}
