//! Attachment lifecycle: storing, replacing, serving and deleting book files
//! and covers.
//!
//! A book holds at most one file per extension. Uploading a file whose
//! extension is already taken deletes the old blob and registry row, then
//! records and stores the new file under a fresh key.
//!
//! The registry (SQLite) and the blob store are separate resources with no
//! shared transaction. Ordering rules:
//! - the registry row of a new file is created before its blob is saved, so a
//!   blob never exists without an owning row;
//! - deletes of old or orphaned blobs are best-effort: a failure is logged
//!   and reported as a [`CleanupOutcome`], never allowed to block the upload
//!   or the row removal it belongs to;
//! - a failed save leaves a row without a blob behind. [`AttachmentManager::prune_orphans`]
//!   removes such rows.
//!
//! Without [`BookLocks`], two overlapping requests replacing the same
//! `(book, extension)` slot race: the registry keeps the last writer and the
//! loser's blob may be orphaned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use libris_shared::constants::COVER_CONTENT_TYPE;
use libris_shared::files::{content_type_for_extension, normalize_extension, safe_filename};
use libris_shared::{AttachmentId, BookId};
use libris_store::{Attachment, Book, Database, NewAttachment, NewBook};

use crate::blob_store::{book_file_key, cover_key, BlobError, BlobStore};
use crate::error::ServerError;

/// Catalogue database shared between request handlers.
///
/// Queries are short and run inline on the async workers; the guard is only
/// taken inside synchronous closures and never held across an `.await`.
pub type SharedDb = Arc<Mutex<Database>>;

/// A file received in an upload request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// What a best-effort blob delete did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Removed,
    /// The blob was already gone.
    Missing,
    /// The store refused; the blob is now an orphan.
    Failed(String),
}

/// An attachment that was replaced by a same-extension upload.
#[derive(Debug, Clone, Serialize)]
pub struct Replacement {
    pub extension: String,
    pub old_storage_key: Uuid,
    pub blob: CleanupOutcome,
}

/// A file of an upload batch that could not be stored.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub file_name: Option<String>,
    pub extension: Option<String>,
    pub error: String,
}

/// Result of an upload batch. Failures are per file; successfully stored
/// files are kept even when others fail.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub book_id: BookId,
    /// The book's attachments after the batch.
    pub attachments: Vec<Attachment>,
    pub replaced: Vec<Replacement>,
    pub failures: Vec<FileFailure>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub book_id: BookId,
    pub blob: CleanupOutcome,
}

/// Result of storing a cover.
#[derive(Debug, Clone, Serialize)]
pub struct CoverUpload {
    pub book: Book,
    /// What happened to the previous cover blob, if there was one.
    pub replaced: Option<CleanupOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookDeletion {
    pub book_id: BookId,
    pub files: Vec<CleanupOutcome>,
    pub cover: Option<CleanupOutcome>,
}

/// A blob ready to be sent to the client.
#[derive(Debug, Clone)]
pub struct Download {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Per-book advisory locks.
///
/// Entries are dropped once nobody holds or waits for them.
#[derive(Clone, Default)]
pub struct BookLocks {
    locks: Arc<Mutex<HashMap<BookId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl BookLocks {
    pub async fn acquire(&self, book_id: BookId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(book_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct AttachmentManager {
    db: SharedDb,
    blobs: Arc<dyn BlobStore>,
    max_upload_size: usize,
    locks: Option<BookLocks>,
}

impl AttachmentManager {
    pub fn new(db: SharedDb, blobs: Arc<dyn BlobStore>, max_upload_size: usize) -> Self {
        Self {
            db,
            blobs,
            max_upload_size,
            locks: None,
        }
    }

    /// Serialize all lifecycle operations on the same book.
    pub fn with_book_locks(mut self, locks: BookLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> libris_store::Result<T>,
    ) -> Result<T, ServerError> {
        let db = self
            .db
            .lock()
            .map_err(|e| ServerError::Internal(format!("Lock poisoned: {e}")))?;
        Ok(f(&db)?)
    }

    async fn lock_book(&self, book_id: BookId) -> Option<OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.acquire(book_id).await),
            None => None,
        }
    }

    async fn remove_blob(&self, key: &str) -> CleanupOutcome {
        match self.blobs.delete(key).await {
            Ok(()) => CleanupOutcome::Removed,
            Err(BlobError::NotFound(_)) => {
                warn!(key, "Blob already missing");
                CleanupOutcome::Missing
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to delete blob, leaving it orphaned");
                CleanupOutcome::Failed(e.to_string())
            }
        }
    }

    fn check_size(&self, data: &[u8]) -> Result<(), ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty file".into()));
        }
        if data.len() > self.max_upload_size {
            return Err(ServerError::PayloadTooLarge {
                size: data.len(),
                max: self.max_upload_size,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Book files
    // ------------------------------------------------------------------

    /// Store a batch of files for a book, replacing same-extension files.
    pub async fn upload_files(
        &self,
        book_id: BookId,
        files: Vec<UploadedFile>,
        uploader: &str,
    ) -> Result<UploadReport, ServerError> {
        let _guard = self.lock_book(book_id).await;
        self.with_db(|db| db.get_book(book_id))?;

        let mut replaced = Vec::new();
        let mut failures = Vec::new();
        let mut stored = 0usize;

        for file in &files {
            let extension = normalize_extension(file.file_name.as_deref(), file.content_type.as_deref());
            match self.store_file(book_id, file, extension.as_deref(), uploader).await {
                Ok(replacement) => {
                    stored += 1;
                    replaced.extend(replacement);
                }
                Err(e) => {
                    warn!(
                        book_id = %book_id,
                        file_name = ?file.file_name,
                        error = %e,
                        "File upload failed"
                    );
                    failures.push(FileFailure {
                        file_name: file.file_name.clone(),
                        extension,
                        error: e.to_string(),
                    });
                }
            }
        }

        if stored > 0 {
            if let Err(e) = self.with_db(|db| db.touch_book(book_id)) {
                warn!(book_id = %book_id, error = %e, "Failed to bump book modification time");
            }
        }

        let attachments = self.with_db(|db| db.list_attachments_for_book(book_id))?;

        info!(
            book_id = %book_id,
            stored,
            replaced = replaced.len(),
            failed = failures.len(),
            "Processed upload batch"
        );

        Ok(UploadReport {
            book_id,
            attachments,
            replaced,
            failures,
        })
    }

    async fn store_file(
        &self,
        book_id: BookId,
        file: &UploadedFile,
        extension: Option<&str>,
        uploader: &str,
    ) -> Result<Option<Replacement>, ServerError> {
        let extension = extension
            .ok_or_else(|| ServerError::BadRequest("Cannot determine file extension".into()))?;
        self.check_size(&file.data)?;

        let existing = self.with_db(|db| db.find_attachment(book_id, extension))?;
        let replacement = match existing {
            Some(old) => {
                let blob = self.remove_blob(&book_file_key(&old.storage_key)).await;
                self.with_db(|db| db.delete_attachment(old.id))?;
                debug!(book_id = %book_id, extension, old_key = %old.storage_key, "Replaced attachment");
                Some(Replacement {
                    extension: extension.to_string(),
                    old_storage_key: old.storage_key,
                    blob,
                })
            }
            None => None,
        };

        let new = NewAttachment {
            book_id,
            extension: extension.to_string(),
            size: file.data.len() as i64,
            uploader: uploader.to_string(),
            storage_key: Uuid::new_v4(),
        };
        let attachment = self.with_db(|db| db.insert_attachment(&new))?;

        let key = book_file_key(&attachment.storage_key);
        if let Err(e) = self.blobs.save(&key, &file.data).await {
            warn!(
                attachment_id = %attachment.id,
                key = %key,
                error = %e,
                "Blob save failed after registry insert; row has no blob"
            );
            return Err(e.into());
        }

        info!(
            book_id = %book_id,
            attachment_id = %attachment.id,
            extension,
            size = file.data.len(),
            "Stored attachment"
        );

        Ok(replacement)
    }

    /// Create an untitled book from a bare upload and store its files.
    pub async fn create_book_from_upload(
        &self,
        files: Vec<UploadedFile>,
        uploader: &str,
    ) -> Result<UploadReport, ServerError> {
        if files.is_empty() {
            return Err(ServerError::BadRequest("No files uploaded".into()));
        }

        let book = self.with_db(|db| db.create_book(&NewBook::default()))?;
        info!(book_id = %book.id, files = files.len(), "Created book from upload");

        self.upload_files(book.id, files, uploader).await
    }

    /// Remove an attachment's blob (best-effort) and its registry row.
    /// Returns the owning book.
    pub async fn delete_attachment(&self, id: AttachmentId) -> Result<DeleteOutcome, ServerError> {
        let book_id = self.with_db(|db| db.get_attachment(id))?.book_id;
        let _guard = self.lock_book(book_id).await;

        // May have been replaced while waiting for the lock
        let attachment = self.with_db(|db| db.get_attachment(id))?;

        let blob = self
            .remove_blob(&book_file_key(&attachment.storage_key))
            .await;
        self.with_db(|db| db.delete_attachment(attachment.id))?;

        info!(attachment_id = %id, book_id = %book_id, blob = ?blob, "Deleted attachment");

        Ok(DeleteOutcome { book_id, blob })
    }

    /// Read an attachment for download.
    pub async fn download(&self, id: AttachmentId) -> Result<Download, ServerError> {
        let (attachment, book) = self.with_db(|db| {
            let attachment = db.get_attachment(id)?;
            let book = db.get_book(attachment.book_id)?;
            Ok((attachment, book))
        })?;

        let key = book_file_key(&attachment.storage_key);
        let data = match self.blobs.open(&key).await {
            Ok(data) => data,
            Err(BlobError::NotFound(_)) => {
                warn!(attachment_id = %id, key = %key, "Orphan attachment: registry row without blob");
                return Err(ServerError::NotFound(format!("File {id} is missing from storage")));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Download {
            data,
            content_type: content_type_for_extension(&attachment.extension),
            filename: safe_filename(&book.title, &attachment.extension),
        })
    }

    /// Drop registry rows whose blob no longer exists.
    pub async fn prune_orphans(&self, book_id: BookId) -> Result<Vec<Attachment>, ServerError> {
        let _guard = self.lock_book(book_id).await;
        let attachments = self.with_db(|db| {
            db.get_book(book_id)?;
            db.list_attachments_for_book(book_id)
        })?;

        let mut removed = Vec::new();
        for attachment in attachments {
            let key = book_file_key(&attachment.storage_key);
            if self.blobs.exists(&key).await? {
                continue;
            }
            warn!(attachment_id = %attachment.id, key = %key, "Removing orphan attachment row");
            self.with_db(|db| db.delete_attachment(attachment.id))?;
            removed.push(attachment);
        }

        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Covers
    // ------------------------------------------------------------------

    /// Store a book's cover, overwriting the previous one.
    pub async fn upload_cover(
        &self,
        book_id: BookId,
        data: &[u8],
    ) -> Result<CoverUpload, ServerError> {
        let _guard = self.lock_book(book_id).await;
        let book = self.with_db(|db| db.get_book(book_id))?;
        self.check_size(data)?;

        let key = cover_key(&book.uuid);
        let replaced = if self.blobs.exists(&key).await? {
            Some(self.remove_blob(&key).await)
        } else {
            None
        };
        self.blobs.save(&key, data).await?;

        self.with_db(|db| db.set_book_cover(book_id, true))?;
        info!(book_id = %book_id, size = data.len(), "Stored cover");

        let book = self.with_db(|db| db.get_book(book_id))?;
        Ok(CoverUpload { book, replaced })
    }

    /// Read a book's cover image.
    pub async fn cover(&self, book_id: BookId) -> Result<Download, ServerError> {
        let book = self.with_db(|db| db.get_book(book_id))?;
        if !book.has_cover {
            return Err(ServerError::NotFound(format!("Book {book_id} has no cover")));
        }

        let key = cover_key(&book.uuid);
        let data = match self.blobs.open(&key).await {
            Ok(data) => data,
            Err(BlobError::NotFound(_)) => {
                warn!(book_id = %book_id, key = %key, "Cover flagged but blob missing");
                return Err(ServerError::NotFound(format!("Cover of book {book_id} is missing")));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Download {
            data,
            content_type: COVER_CONTENT_TYPE,
            filename: safe_filename(&book.title, "jpg"),
        })
    }

    // ------------------------------------------------------------------
    // Books
    // ------------------------------------------------------------------

    /// Delete a book together with its file and cover blobs.
    pub async fn delete_book(&self, book_id: BookId) -> Result<BookDeletion, ServerError> {
        let _guard = self.lock_book(book_id).await;
        let (book, attachments) = self.with_db(|db| {
            let book = db.get_book(book_id)?;
            let attachments = db.list_attachments_for_book(book_id)?;
            Ok((book, attachments))
        })?;

        let mut files = Vec::with_capacity(attachments.len());
        for attachment in &attachments {
            files.push(self.remove_blob(&book_file_key(&attachment.storage_key)).await);
        }
        let cover = if book.has_cover {
            Some(self.remove_blob(&cover_key(&book.uuid)).await)
        } else {
            None
        };

        // attachment rows cascade
        self.with_db(|db| db.delete_book(book_id))?;
        info!(book_id = %book_id, files = files.len(), "Deleted book");

        Ok(BookDeletion {
            book_id,
            files,
            cover,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::memory::{BlobOp, MemoryBlobStore};

    struct Fixture {
        manager: AttachmentManager,
        blobs: Arc<MemoryBlobStore>,
        db: SharedDb,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Mutex::new(
            Database::open_at(&dir.path().join("libris.db")).unwrap(),
        ));
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = AttachmentManager::new(db.clone(), blobs.clone(), 1024)
            .with_book_locks(BookLocks::default());
        Fixture {
            manager,
            blobs,
            db,
            _dir: dir,
        }
    }

    fn file(name: &str, data: &'static [u8]) -> UploadedFile {
        UploadedFile {
            file_name: Some(name.to_string()),
            content_type: None,
            data: Bytes::from_static(data),
        }
    }

    fn new_book(fx: &Fixture, title: &str) -> Book {
        fx.db
            .lock()
            .unwrap()
            .create_book(&NewBook {
                title: Some(title.to_string()),
                ..Default::default()
            })
            .unwrap()
    }

    fn rows(fx: &Fixture, book_id: BookId) -> Vec<Attachment> {
        fx.db
            .lock()
            .unwrap()
            .list_attachments_for_book(book_id)
            .unwrap()
    }

    #[tokio::test]
    async fn upload_creates_one_attachment_per_extension() {
        let fx = fixture();
        let book = new_book(&fx, "Roadside Picnic");

        let report = fx
            .manager
            .upload_files(
                book.id,
                vec![file("picnic.epub", b"epub"), file("picnic.PDF", b"pdf")],
                "alice",
            )
            .await
            .unwrap();

        assert!(report.is_complete());
        assert!(report.replaced.is_empty());
        let extensions: Vec<_> = report.attachments.iter().map(|a| a.extension.as_str()).collect();
        assert_eq!(extensions, vec!["epub", "pdf"]);
        assert_eq!(report.attachments[0].uploader, "alice");
        assert_eq!(report.attachments[0].size, 4);

        for attachment in &report.attachments {
            assert!(fx.blobs.get(&book_file_key(&attachment.storage_key)).is_some());
        }
    }

    #[tokio::test]
    async fn same_extension_replaces_with_one_delete_and_one_save() {
        let fx = fixture();
        let book = new_book(&fx, "Solaris");

        let first = fx
            .manager
            .upload_files(book.id, vec![file("solaris.epub", b"v1")], "alice")
            .await
            .unwrap();
        let old_key = book_file_key(&first.attachments[0].storage_key);
        fx.blobs.clear_ops();

        let second = fx
            .manager
            .upload_files(book.id, vec![file("Solaris.EPUB", b"v2")], "bob")
            .await
            .unwrap();

        assert_eq!(second.attachments.len(), 1);
        let new_key = book_file_key(&second.attachments[0].storage_key);
        assert_ne!(old_key, new_key);
        assert_eq!(
            fx.blobs.ops(),
            vec![BlobOp::Delete(old_key.clone()), BlobOp::Save(new_key.clone())]
        );
        assert!(fx.blobs.get(&old_key).is_none());
        assert_eq!(fx.blobs.get(&new_key).as_deref(), Some(&b"v2"[..]));

        assert_eq!(second.replaced.len(), 1);
        assert_eq!(second.replaced[0].extension, "epub");
        assert_eq!(second.replaced[0].blob, CleanupOutcome::Removed);
        assert_eq!(second.attachments[0].uploader, "bob");
    }

    #[tokio::test]
    async fn duplicate_extensions_in_one_batch_keep_the_last() {
        let fx = fixture();
        let book = new_book(&fx, "Dune");

        let report = fx
            .manager
            .upload_files(
                book.id,
                vec![file("a.txt", b"one"), file("b.TXT", b"two"), file("c.txt", b"three")],
                "alice",
            )
            .await
            .unwrap();

        assert_eq!(report.attachments.len(), 1);
        assert_eq!(report.replaced.len(), 2);
        assert_eq!(fx.blobs.keys().len(), 1);
        let key = book_file_key(&report.attachments[0].storage_key);
        assert_eq!(fx.blobs.get(&key).as_deref(), Some(&b"three"[..]));
    }

    #[tokio::test]
    async fn failed_cleanup_does_not_block_replacement() {
        let fx = fixture();
        let book = new_book(&fx, "Hyperion");

        let first = fx
            .manager
            .upload_files(book.id, vec![file("h.mobi", b"old")], "alice")
            .await
            .unwrap();
        let old_key = book_file_key(&first.attachments[0].storage_key);

        fx.blobs.fail_deletes(true);
        let second = fx
            .manager
            .upload_files(book.id, vec![file("h.mobi", b"new")], "alice")
            .await
            .unwrap();

        assert!(second.is_complete());
        assert!(matches!(second.replaced[0].blob, CleanupOutcome::Failed(_)));
        assert_eq!(rows(&fx, book.id).len(), 1);
        // the old blob is an orphan now
        assert_eq!(fx.blobs.get(&old_key).as_deref(), Some(&b"old"[..]));
    }

    #[tokio::test]
    async fn failures_are_per_file() {
        let fx = fixture();
        let book = new_book(&fx, "Ubik");
        fx.blobs.fail_saves_of(b"unlucky");

        let report = fx
            .manager
            .upload_files(
                book.id,
                vec![
                    file("ubik.epub", b"fine"),
                    file("ubik.pdf", b"unlucky"),
                    file("README", b"no extension"),
                    file("empty.txt", b""),
                ],
                "alice",
            )
            .await
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 3);
        assert_eq!(report.failures[0].extension.as_deref(), Some("pdf"));
        assert_eq!(report.failures[1].extension, None);
        assert_eq!(report.failures[2].file_name.as_deref(), Some("empty.txt"));

        let epub = report.attachments.iter().find(|a| a.extension == "epub").unwrap();
        assert_eq!(fx.blobs.get(&book_file_key(&epub.storage_key)).as_deref(), Some(&b"fine"[..]));
    }

    #[tokio::test]
    async fn prune_removes_rows_left_by_failed_saves() {
        let fx = fixture();
        let book = new_book(&fx, "Ubik");
        fx.blobs.fail_saves_of(b"unlucky");

        fx.manager
            .upload_files(
                book.id,
                vec![file("ubik.epub", b"fine"), file("ubik.pdf", b"unlucky")],
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(rows(&fx, book.id).len(), 2);

        let removed = fx.manager.prune_orphans(book.id).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].extension, "pdf");

        let remaining = rows(&fx, book.id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].extension, "epub");
    }

    #[tokio::test]
    async fn content_type_used_when_name_has_no_extension() {
        let fx = fixture();
        let book = new_book(&fx, "Blindsight");

        let upload = UploadedFile {
            file_name: Some("blindsight".to_string()),
            content_type: Some("application/epub+zip".to_string()),
            data: Bytes::from_static(b"zip"),
        };
        let report = fx.manager.upload_files(book.id, vec![upload], "alice").await.unwrap();

        assert_eq!(report.attachments[0].extension, "epub");
    }

    #[tokio::test]
    async fn oversized_file_rejected() {
        let fx = fixture();
        let book = new_book(&fx, "Big");
        let upload = UploadedFile {
            file_name: Some("big.pdf".to_string()),
            content_type: None,
            data: Bytes::from(vec![0u8; 2048]),
        };

        let report = fx.manager.upload_files(book.id, vec![upload], "alice").await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.attachments.is_empty());
        assert!(fx.blobs.ops().is_empty());
    }

    #[tokio::test]
    async fn upload_to_missing_book_is_not_found() {
        let fx = fixture();
        let result = fx
            .manager
            .upload_files(BookId(404), vec![file("x.epub", b"x")], "alice")
            .await;
        assert!(matches!(result, Err(ServerError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_book_from_upload() {
        let fx = fixture();
        let report = fx
            .manager
            .create_book_from_upload(vec![file("new.fb2", b"<FictionBook/>")], "alice")
            .await
            .unwrap();

        let book = fx.db.lock().unwrap().get_book(report.book_id).unwrap();
        assert_eq!(book.title, "Untitled book");
        assert_eq!(report.attachments.len(), 1);
        assert_eq!(report.attachments[0].extension, "fb2");

        let empty = fx.manager.create_book_from_upload(Vec::new(), "alice").await;
        assert!(matches!(empty, Err(ServerError::BadRequest(_))));
    }

    #[tokio::test]
    async fn cover_reupload_leaves_single_blob() {
        let fx = fixture();
        let book = new_book(&fx, "Neuromancer");
        let key = cover_key(&book.uuid);

        let first = fx.manager.upload_cover(book.id, b"cover-a").await.unwrap();
        assert!(first.book.has_cover);
        assert_eq!(first.replaced, None);

        fx.blobs.clear_ops();
        let second = fx.manager.upload_cover(book.id, b"cover-b").await.unwrap();
        assert_eq!(second.replaced, Some(CleanupOutcome::Removed));

        assert_eq!(
            fx.blobs.ops(),
            vec![
                BlobOp::Exists(key.clone()),
                BlobOp::Delete(key.clone()),
                BlobOp::Save(key.clone())
            ]
        );
        assert_eq!(fx.blobs.keys(), vec![key.clone()]);
        assert_eq!(fx.blobs.get(&key).as_deref(), Some(&b"cover-b"[..]));

        let cover = fx.manager.cover(book.id).await.unwrap();
        assert_eq!(cover.data, b"cover-b");
        assert_eq!(cover.content_type, "image/jpeg");
        assert!(fx.db.lock().unwrap().get_book(book.id).unwrap().has_cover);
    }

    #[tokio::test]
    async fn failed_cover_cleanup_still_stores_new_cover() {
        let fx = fixture();
        let book = new_book(&fx, "Snow Crash");
        let key = cover_key(&book.uuid);
        fx.manager.upload_cover(book.id, b"cover-a").await.unwrap();

        fx.blobs.fail_deletes(true);
        let upload = fx.manager.upload_cover(book.id, b"cover-b").await.unwrap();

        assert!(matches!(upload.replaced, Some(CleanupOutcome::Failed(_))));
        assert!(upload.book.has_cover);
        assert_eq!(fx.blobs.get(&key).as_deref(), Some(&b"cover-b"[..]));
    }

    #[tokio::test]
    async fn cover_missing_is_not_found() {
        let fx = fixture();
        let book = new_book(&fx, "Coverless");
        assert!(matches!(
            fx.manager.cover(book.id).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_with_missing_blob_still_removes_row() {
        let fx = fixture();
        let book = new_book(&fx, "Stalker");
        let report = fx
            .manager
            .upload_files(book.id, vec![file("s.epub", b"s")], "alice")
            .await
            .unwrap();
        let attachment = report.attachments[0].clone();
        fx.blobs.remove_silently(&book_file_key(&attachment.storage_key));

        let outcome = fx.manager.delete_attachment(attachment.id).await.unwrap();

        assert_eq!(outcome.book_id, book.id);
        assert_eq!(outcome.blob, CleanupOutcome::Missing);
        assert!(rows(&fx, book.id).is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_attachment_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.manager.delete_attachment(AttachmentId(7)).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn download_names_file_after_book() {
        let fx = fixture();
        let book = new_book(&fx, "The Cyberiad: Fables");
        let report = fx
            .manager
            .upload_files(book.id, vec![file("whatever.epub", b"contents")], "alice")
            .await
            .unwrap();

        let download = fx.manager.download(report.attachments[0].id).await.unwrap();

        assert_eq!(download.data, b"contents");
        assert_eq!(download.content_type, "application/epub+zip");
        assert_eq!(download.filename, "The_Cyberiad_Fables.epub");
    }

    #[tokio::test]
    async fn download_of_orphan_row_is_not_found() {
        let fx = fixture();
        let book = new_book(&fx, "Orphan");
        let report = fx
            .manager
            .upload_files(book.id, vec![file("o.pdf", b"o")], "alice")
            .await
            .unwrap();
        let attachment = &report.attachments[0];
        fx.blobs.remove_silently(&book_file_key(&attachment.storage_key));

        assert!(matches!(
            fx.manager.download(attachment.id).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_book_removes_all_blobs() {
        let fx = fixture();
        let book = new_book(&fx, "Gone");
        fx.manager
            .upload_files(book.id, vec![file("g.epub", b"e"), file("g.pdf", b"p")], "alice")
            .await
            .unwrap();
        fx.manager.upload_cover(book.id, b"jpg").await.unwrap();

        let deletion = fx.manager.delete_book(book.id).await.unwrap();

        assert_eq!(deletion.files, vec![CleanupOutcome::Removed, CleanupOutcome::Removed]);
        assert_eq!(deletion.cover, Some(CleanupOutcome::Removed));
        assert!(fx.blobs.keys().is_empty());
        assert!(fx.db.lock().unwrap().get_book(book.id).is_err());
    }

    #[tokio::test]
    async fn concurrent_uploads_to_same_slot_leave_no_orphan() {
        let fx = fixture();
        let book = new_book(&fx, "Race");

        let (a, b) = tokio::join!(
            fx.manager.upload_files(book.id, vec![file("r.epub", b"a")], "alice"),
            fx.manager.upload_files(book.id, vec![file("r.epub", b"b")], "bob"),
        );
        assert!(a.unwrap().is_complete());
        assert!(b.unwrap().is_complete());

        let remaining = rows(&fx, book.id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(fx.blobs.keys(), vec![book_file_key(&remaining[0].storage_key)]);
    }
}
