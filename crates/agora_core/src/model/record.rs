//! Storage identity shared by every persisted object.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Object type discriminator persisted alongside each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Post,
    Comment,
    Profile,
    Vote,
    Tag,
    Report,
    Space,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Post,
        ObjectKind::Comment,
        ObjectKind::Profile,
        ObjectKind::Vote,
        ObjectKind::Tag,
        ObjectKind::Report,
        ObjectKind::Space,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Profile => "profile",
            Self::Vote => "vote",
            Self::Tag => "tag",
            Self::Report => "report",
            Self::Space => "space",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully qualified object address: kind plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub id: String,
}

impl ObjectKey {
    pub fn new(kind: ObjectKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A typed object that can be stored as a JSON document.
pub trait Record: Serialize + DeserializeOwned {
    const KIND: ObjectKind;

    fn id(&self) -> &str;

    fn key(&self) -> ObjectKey {
        ObjectKey::new(Self::KIND, self.id())
    }
}
