//! # libris-shared
//!
//! Pure catalogue logic shared by the store and the HTTP server: identifier
//! newtypes, the search [`Subject`](types::Subject) enumeration, the search
//! query parser and router, and the file-name helpers used for attachments.
//!
//! Nothing in this crate performs I/O.

pub mod constants;
pub mod error;
pub mod files;
pub mod query;
pub mod types;

pub use error::QueryError;
pub use query::{parse, route, ParsedQuery, RouteDecision};
pub use types::{AttachmentId, BookId, Subject};
