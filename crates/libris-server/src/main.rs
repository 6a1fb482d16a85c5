//! # libris-server
//!
//! HTTP server for the Libris library catalogue.
//!
//! This binary provides:
//! - **Attachment lifecycle**: one stored file per book and extension, with
//!   replace-on-upload, downloads and deletes
//! - **Covers**: one JPEG cover per book
//! - **Search**: a single query box routed to per-subject searches by
//!   `book:`, `author:`, `tag:`, `series:` and `publisher:` prefixes
//! - **REST API** (axum) exposing all of the above plus health and stats

mod api;
mod attachments;
mod blob_store;
mod config;
mod error;
mod search;

use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use libris_store::Database;

use crate::api::AppState;
use crate::attachments::{AttachmentManager, BookLocks};
use crate::blob_store::FsBlobStore;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,libris_server=debug")),
        )
        .init();

    info!("Starting Libris server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::open_at(&config.database_path)?;
    let db = Arc::new(Mutex::new(db));

    // Blob store (creates directory if missing)
    let blob_store = Arc::new(
        FsBlobStore::new(config.blob_storage_path.clone(), config.max_upload_size).await?,
    );

    let mut attachments = AttachmentManager::new(db.clone(), blob_store, config.max_upload_size);
    if config.book_upload_lock {
        attachments = attachments.with_book_locks(BookLocks::default());
    } else {
        tracing::warn!("Per-book upload lock disabled; concurrent replacements may orphan blobs");
    }

    let http_addr = config.http_addr;
    let app_state = AppState {
        db,
        attachments: Arc::new(attachments),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
