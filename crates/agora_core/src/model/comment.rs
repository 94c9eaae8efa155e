use crate::model::record::{ObjectKind, Record};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short remark attached to a post. Votable, and hidden by auto-moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub parent_id: String,
    pub creator_id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub hidden: bool,
    pub created_at: i64,
}

impl Record for Comment {
    const KIND: ObjectKind = ObjectKind::Comment;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Comment {
    pub fn new(
        parent_id: impl Into<String>,
        creator_id: impl Into<String>,
        body: impl Into<String>,
        now_millis: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: parent_id.into(),
            creator_id: creator_id.into(),
            body: body.into(),
            votes: 0,
            hidden: false,
            created_at: now_millis,
        }
    }
}
