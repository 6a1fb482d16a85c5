//! v001 -- Initial schema creation.
//!
//! Creates `books`, the `attachments` registry and the catalogue tables
//! `authors`, `tags`, `series`, `publishers` and `shelves`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Books
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS books (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid          TEXT NOT NULL UNIQUE,           -- UUID v4, namespaces the cover blob
    title         TEXT NOT NULL DEFAULT 'Untitled book',
    description   TEXT NOT NULL DEFAULT '',
    isbn          TEXT NOT NULL DEFAULT '',
    has_cover     INTEGER NOT NULL DEFAULT 0,     -- boolean 0/1
    created_at    TEXT NOT NULL,                  -- ISO-8601 / RFC-3339
    last_modified TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Attachments (one stored file per book and extension)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS attachments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id     INTEGER NOT NULL,                 -- FK -> books(id)
    extension   TEXT NOT NULL,                    -- lower-case, no leading dot
    size        INTEGER NOT NULL,
    uploader    TEXT NOT NULL,
    storage_key TEXT NOT NULL UNIQUE,             -- UUID v4, blob lives at books/<hex>
    created_at  TEXT NOT NULL,

    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
    UNIQUE (book_id, extension)
);

CREATE INDEX IF NOT EXISTS idx_attachments_book_id ON attachments(book_id);

-- ----------------------------------------------------------------
-- Catalogue entities
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS authors (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    link        TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS tags (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS series (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS publishers (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    link TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS shelves (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_public   INTEGER NOT NULL DEFAULT 0
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
