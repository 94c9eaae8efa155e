//! Tag aggregate and tag-string normalization.
//!
//! # Invariants
//! - A tag's id is its normalized string.
//! - `count` is the number of posts bearing the tag, or reconcilable to it.
//! - Normalized tag lists keep first-seen order and contain no duplicates.

use crate::model::record::{ObjectKind, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static DISALLOWED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s+#.\-]+").expect("valid tag charset regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static DASHES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid dash regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for Tag {
    const KIND: ObjectKind = ObjectKind::Tag;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Tag {
    pub fn new(tag: impl Into<String>, count: i64) -> Self {
        Self {
            id: tag.into(),
            count,
            description: None,
        }
    }
}

/// Normalizes one tag value; `None` when nothing usable remains.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let lowered = tag.trim().to_lowercase();
    let cleaned = DISALLOWED_RE.replace_all(&lowered, " ");
    let dashed = WHITESPACE_RE.replace_all(cleaned.trim(), "-");
    let collapsed = DASHES_RE.replace_all(&dashed, "-");
    let value = collapsed.trim_matches('-');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Normalizes and deduplicates tags, keeping first-seen order.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter_map(|tag| normalize_tag(tag.as_ref()))
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
