//! Domain model structs persisted in the catalogue database.
//!
//! Every struct derives `Serialize` so it can be returned directly from the
//! HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use libris_shared::{AttachmentId, BookId, Subject};

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

/// A catalogued book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    /// Stable identifier used to namespace the book's cover blob.
    pub uuid: Uuid,
    pub title: String,
    pub description: String,
    pub isbn: String,
    /// Set once a cover image has been uploaded.
    pub has_cover: bool,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Fields supplied when creating a book.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBook {
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub isbn: String,
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// One stored file of a book. A book has at most one attachment per extension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub id: AttachmentId,
    pub book_id: BookId,
    /// Lower-case extension without the leading dot.
    pub extension: String,
    /// Size in bytes.
    pub size: i64,
    /// Identity of whoever uploaded the file.
    pub uploader: String,
    /// Freshly generated for every upload; never derived from content.
    pub storage_key: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Registry row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub book_id: BookId,
    pub extension: String,
    pub size: i64,
    pub uploader: String,
    pub storage_key: Uuid,
}

// ---------------------------------------------------------------------------
// Catalogue entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub link: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Publisher {
    pub id: i64,
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shelf {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_public: bool,
}

/// Number of rows per catalogue table.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CatalogueCounts {
    pub books: i64,
    pub authors: i64,
    pub tags: i64,
    pub series: i64,
    pub publishers: i64,
    pub shelves: i64,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// A search hit, reduced to what a result list displays.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CatalogueEntry {
    pub subject: Subject,
    pub id: i64,
    /// Title or name, depending on the entity.
    pub label: String,
}
