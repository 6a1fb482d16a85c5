//! The attachment registry: one row per stored book file.
//!
//! `(book_id, extension)` is UNIQUE in the schema, so a second row for the
//! same slot is rejected by SQLite even when two writers race.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use libris_shared::{AttachmentId, BookId};

use crate::database::{conversion_error, not_found, parse_timestamp, Database};
use crate::error::Result;
use crate::models::{Attachment, NewAttachment};

const ATTACHMENT_COLUMNS: &str =
    "id, book_id, extension, size, uploader, storage_key, created_at";

impl Database {
    /// Insert a registry row for a new upload.
    pub fn insert_attachment(&self, new: &NewAttachment) -> Result<Attachment> {
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO attachments (book_id, extension, size, uploader, storage_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.book_id.0,
                new.extension,
                new.size,
                new.uploader,
                new.storage_key.to_string(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(Attachment {
            id: AttachmentId(self.conn().last_insert_rowid()),
            book_id: new.book_id,
            extension: new.extension.clone(),
            size: new.size,
            uploader: new.uploader.clone(),
            storage_key: new.storage_key,
            created_at: now,
        })
    }

    pub fn get_attachment(&self, id: AttachmentId) -> Result<Attachment> {
        self.conn()
            .query_row(
                &format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1"),
                params![id.0],
                row_to_attachment,
            )
            .map_err(not_found)
    }

    /// Look up the attachment occupying a book's extension slot.
    pub fn find_attachment(&self, book_id: BookId, extension: &str) -> Result<Option<Attachment>> {
        match self.conn().query_row(
            &format!(
                "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE book_id = ?1 AND extension = ?2"
            ),
            params![book_id.0, extension],
            row_to_attachment,
        ) {
            Ok(attachment) => Ok(Some(attachment)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All attachments of a book, ordered by extension.
    pub fn list_attachments_for_book(&self, book_id: BookId) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE book_id = ?1 ORDER BY extension ASC"
        ))?;

        let rows = stmt.query_map(params![book_id.0], row_to_attachment)?;

        let mut attachments = Vec::new();
        for row in rows {
            attachments.push(row?);
        }
        Ok(attachments)
    }

    // only removes the registry row, not the blob
    pub fn delete_attachment(&self, id: AttachmentId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM attachments WHERE id = ?1", params![id.0])?;
        Ok(affected > 0)
    }
}

fn row_to_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    let id: i64 = row.get(0)?;
    let book_id: i64 = row.get(1)?;
    let key_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;

    let storage_key = Uuid::parse_str(&key_str).map_err(|e| conversion_error(5, e))?;

    Ok(Attachment {
        id: AttachmentId(id),
        book_id: BookId(book_id),
        extension: row.get(2)?,
        size: row.get(3)?,
        uploader: row.get(4)?,
        storage_key,
        created_at: parse_timestamp(6, &created_str)?,
    })
}
