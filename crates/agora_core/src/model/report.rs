use crate::model::record::{ObjectKind, Record};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Opened by auto-moderation when a post's score sinks too low.
    ForClosing,
    Spam,
    Offensive,
    Other,
}

/// Moderation report about one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub parent_id: String,
    pub kind: ReportKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub closed: bool,
    pub created_at: i64,
}

impl Record for Report {
    const KIND: ObjectKind = ObjectKind::Report;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Report {
    pub fn new(
        parent_id: impl Into<String>,
        kind: ReportKind,
        description: impl Into<String>,
        now_millis: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: parent_id.into(),
            kind,
            description: description.into(),
            author_name: String::new(),
            closed: false,
            created_at: now_millis,
        }
    }
}
