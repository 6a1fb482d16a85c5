//! # libris-store
//!
//! SQLite-backed persistence for the Libris catalogue.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for books, their
//! attachments (the attachment registry) and the other catalogue entities,
//! plus the substring search used by the per-subject search endpoints.

pub mod attachments;
pub mod books;
pub mod catalogue;
pub mod database;
pub mod migrations;
pub mod models;
pub mod search;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
