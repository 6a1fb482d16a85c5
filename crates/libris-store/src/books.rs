//! CRUD operations for [`Book`] records.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use libris_shared::constants::UNTITLED_BOOK;
use libris_shared::BookId;

use crate::database::{conversion_error, not_found, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{Book, NewBook};

const BOOK_COLUMNS: &str =
    "id, uuid, title, description, isbn, has_cover, created_at, last_modified";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new book and return it with its generated id and uuid.
    pub fn create_book(&self, new: &NewBook) -> Result<Book> {
        let now = Utc::now();
        let book_uuid = Uuid::new_v4();
        let title = book_title(new);

        self.conn().execute(
            "INSERT INTO books (uuid, title, description, isbn, has_cover, created_at, last_modified)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
            params![
                book_uuid.to_string(),
                title,
                new.description,
                new.isbn,
                now.to_rfc3339(),
            ],
        )?;

        Ok(Book {
            id: BookId(self.conn().last_insert_rowid()),
            uuid: book_uuid,
            title,
            description: new.description.clone(),
            isbn: new.isbn.clone(),
            has_cover: false,
            created_at: now,
            last_modified: now,
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single book by id.
    pub fn get_book(&self, id: BookId) -> Result<Book> {
        self.conn()
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                params![id.0],
                row_to_book,
            )
            .map_err(not_found)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace the editable fields of a book. A blank title falls back to
    /// the untitled placeholder.
    pub fn update_book(&self, id: BookId, changes: &NewBook) -> Result<Book> {
        let affected = self.conn().execute(
            "UPDATE books SET title = ?1, description = ?2, isbn = ?3, last_modified = ?4
             WHERE id = ?5",
            params![
                book_title(changes),
                changes.description,
                changes.isbn,
                Utc::now().to_rfc3339(),
                id.0,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_book(id)
    }

    /// Flip the cover flag of a book.
    pub fn set_book_cover(&self, id: BookId, has_cover: bool) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE books SET has_cover = ?1, last_modified = ?2 WHERE id = ?3",
            params![has_cover as i32, Utc::now().to_rfc3339(), id.0],
        )?;
        Ok(affected > 0)
    }

    /// Mark the book as modified without changing any field.
    pub fn touch_book(&self, id: BookId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE books SET last_modified = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id.0],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a book.  Attachment rows go with it (ON DELETE CASCADE); their
    /// blobs are the caller's responsibility.
    pub fn delete_book(&self, id: BookId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM books WHERE id = ?1", params![id.0])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn book_title(new: &NewBook) -> String {
    new.title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED_BOOK)
        .to_string()
}

/// Map a `rusqlite::Row` to a [`Book`].
fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    let id: i64 = row.get(0)?;
    let uuid_str: String = row.get(1)?;
    let has_cover_int: i32 = row.get(5)?;
    let created_str: String = row.get(6)?;
    let modified_str: String = row.get(7)?;

    let uuid = Uuid::parse_str(&uuid_str).map_err(|e| conversion_error(1, e))?;

    Ok(Book {
        id: BookId(id),
        uuid,
        title: row.get(2)?,
        description: row.get(3)?,
        isbn: row.get(4)?,
        has_cover: has_cover_int != 0,
        created_at: parse_timestamp(6, &created_str)?,
        last_modified: parse_timestamp(7, &modified_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("books.db")).unwrap();
        (db, dir)
    }

    #[test]
    fn create_defaults_to_untitled() {
        let (db, _dir) = test_db();

        let book = db.create_book(&NewBook::default()).unwrap();
        assert_eq!(book.title, UNTITLED_BOOK);
        assert!(!book.has_cover);

        let stored = db.get_book(book.id).unwrap();
        assert_eq!(stored.uuid, book.uuid);
        assert_eq!(stored.title, UNTITLED_BOOK);
    }

    #[test]
    fn update_replaces_fields_and_bumps_modified() {
        let (db, _dir) = test_db();
        let book = db.create_book(&NewBook::default()).unwrap();

        let updated = db
            .update_book(
                book.id,
                &NewBook {
                    title: Some("  Roadside Picnic ".into()),
                    description: "Zone stalkers".into(),
                    isbn: "9781613743416".into(),
                },
            )
            .unwrap();
        assert_eq!(updated.title, "Roadside Picnic");
        assert_eq!(updated.description, "Zone stalkers");
        assert_eq!(updated.isbn, "9781613743416");
        assert_eq!(updated.uuid, book.uuid);
        assert!(updated.last_modified >= book.last_modified);

        let blanked = db
            .update_book(
                book.id,
                &NewBook {
                    title: Some("   ".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(blanked.title, UNTITLED_BOOK);
        assert!(blanked.isbn.is_empty());
    }

    #[test]
    fn update_missing_book_is_not_found() {
        let (db, _dir) = test_db();
        assert!(matches!(
            db.update_book(BookId(404), &NewBook::default()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn corrupt_uuid_surfaces_as_conversion_failure() {
        let (db, _dir) = test_db();
        let book = db.create_book(&NewBook::default()).unwrap();
        db.conn()
            .execute("UPDATE books SET uuid = 'not-a-uuid' WHERE id = ?1", params![book.id.0])
            .unwrap();

        assert!(matches!(
            db.get_book(book.id),
            Err(StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(1, _, _)))
        ));
    }

    #[test]
    fn cover_flag_persists() {
        let (db, _dir) = test_db();
        let book = db
            .create_book(&NewBook {
                title: Some("Solaris".into()),
                ..Default::default()
            })
            .unwrap();

        assert!(db.set_book_cover(book.id, true).unwrap());

        let stored = db.get_book(book.id).unwrap();
        assert_eq!(stored.title, "Solaris");
        assert!(stored.has_cover);
        assert!(stored.last_modified >= book.last_modified);
    }

    #[test]
    fn missing_book_is_not_found() {
        let (db, _dir) = test_db();
        assert!(matches!(db.get_book(BookId(42)), Err(StoreError::NotFound)));
        assert!(!db.delete_book(BookId(42)).unwrap());
    }
}
