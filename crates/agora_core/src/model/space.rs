//! Spaces partition posts and profiles.
//!
//! Posts and profiles reference a space by the string `"<id>:<name>"`, so a
//! rename rewrites that reference everywhere it appears.

use crate::model::record::{ObjectKind, Record};
use serde::{Deserialize, Serialize};

/// Reference of the implicit space every post starts in.
pub const DEFAULT_SPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
}

impl Record for Space {
    const KIND: ObjectKind = ObjectKind::Space;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Space {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Reference string stored on posts and profiles.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.id, self.name)
    }

    /// Extracts the space id from a reference string.
    pub fn id_from_reference(reference: &str) -> &str {
        reference.split_once(':').map_or(reference, |(id, _)| id)
    }
}
