//! Anything carrying a vote counter and an owning creator.

use crate::model::comment::Comment;
use crate::model::post::{Post, PostKind};
use crate::model::record::{ObjectKey, ObjectKind, Record};

/// Reward class of a votable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotableKind {
    Question,
    Answer,
    OtherPost,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Votable {
    Post(Post),
    Comment(Comment),
}

impl Votable {
    pub fn id(&self) -> &str {
        match self {
            Self::Post(post) => &post.id,
            Self::Comment(comment) => &comment.id,
        }
    }

    pub fn creator_id(&self) -> &str {
        match self {
            Self::Post(post) => &post.creator_id,
            Self::Comment(comment) => &comment.creator_id,
        }
    }

    pub fn votes(&self) -> i64 {
        match self {
            Self::Post(post) => post.votes,
            Self::Comment(comment) => comment.votes,
        }
    }

    pub fn set_votes(&mut self, votes: i64) {
        match self {
            Self::Post(post) => post.votes = votes,
            Self::Comment(comment) => comment.votes = votes,
        }
    }

    pub fn kind(&self) -> VotableKind {
        match self {
            Self::Post(post) => match post.kind {
                PostKind::Question => VotableKind::Question,
                PostKind::Reply => VotableKind::Answer,
                PostKind::Feedback | PostKind::Sticky => VotableKind::OtherPost,
            },
            Self::Comment(_) => VotableKind::Comment,
        }
    }

    pub fn object_kind(&self) -> ObjectKind {
        match self {
            Self::Post(_) => ObjectKind::Post,
            Self::Comment(_) => ObjectKind::Comment,
        }
    }

    pub fn key(&self) -> ObjectKey {
        match self {
            Self::Post(post) => post.key(),
            Self::Comment(comment) => comment.key(),
        }
    }
}

impl From<Post> for Votable {
    fn from(value: Post) -> Self {
        Self::Post(value)
    }
}

impl From<Comment> for Votable {
    fn from(value: Comment) -> Self {
        Self::Comment(value)
    }
}
