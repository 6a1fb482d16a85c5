use serde::{Deserialize, Serialize};

// Row identifiers are SQLite INTEGER primary keys
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BookId(pub i64);

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AttachmentId(pub i64);

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The entity type a search is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Book,
    Author,
    Tag,
    Series,
    Publisher,
}

impl Subject {
    pub const ALL: [Subject; 5] = [
        Subject::Book,
        Subject::Author,
        Subject::Tag,
        Subject::Series,
        Subject::Publisher,
    ];

    /// Map a query prefix (colon included) to a subject.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "book:" => Some(Self::Book),
            "author:" => Some(Self::Author),
            "tag:" => Some(Self::Tag),
            "series:" => Some(Self::Series),
            "publisher:" => Some(Self::Publisher),
            _ => None,
        }
    }

    /// Path segment of the subject's search endpoint.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Book => "books",
            Self::Author => "authors",
            Self::Tag => "tags",
            Self::Series => "series",
            Self::Publisher => "publishers",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Book => "book",
            Self::Author => "author",
            Self::Tag => "tag",
            Self::Series => "series",
            Self::Publisher => "publisher",
        };
        f.write_str(name)
    }
}
