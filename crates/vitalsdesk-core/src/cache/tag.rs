use std::fmt;

/// Sentinel id for "the list of this type".
pub const LIST_ID: &str = "LIST";

/// Sentinel id for "the latest item of this type".
pub const LATEST_ID: &str = "LATEST";

/// Label attached to cached data for invalidation.
///
/// `Type` is a bare category such as `Record`; `Id` scopes a category to one
/// item (or a sentinel like `LIST`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Type(String),
    Id { kind: String, id: String },
}

impl Tag {
    pub fn of(kind: &str) -> Self {
        Tag::Type(kind.to_string())
    }

    pub fn id(kind: &str, id: impl Into<String>) -> Self {
        Tag::Id {
            kind: kind.to_string(),
            id: id.into(),
        }
    }

    pub fn list(kind: &str) -> Self {
        Tag::id(kind, LIST_ID)
    }

    pub fn latest(kind: &str) -> Self {
        Tag::id(kind, LATEST_ID)
    }

    pub fn kind(&self) -> &str {
        match self {
            Tag::Type(kind) => kind,
            Tag::Id { kind, .. } => kind,
        }
    }

    pub fn scoped_id(&self) -> Option<&str> {
        match self {
            Tag::Type(_) => None,
            Tag::Id { id, .. } => Some(id),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Type(kind) => f.write_str(kind),
            Tag::Id { kind, id } => write!(f, "{}:{}", kind, id),
        }
    }
}
