/// Application name
pub const APP_NAME: &str = "Libris";

/// Minimum length (in characters) of a search term
pub const MIN_QUERY_LEN: usize = 3;

/// Default number of search results per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Maximum stored length of a normalized file extension
pub const MAX_EXTENSION_LEN: usize = 8;

/// Maximum upload size in bytes (50 MiB)
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Maximum size of a whole upload request, all files together (256 MiB)
pub const MAX_REQUEST_SIZE: usize = 256 * 1024 * 1024;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Title given to books created from a bare file upload
pub const UNTITLED_BOOK: &str = "Untitled book";

/// Blob store namespaces
pub const BOOK_FILES_NAMESPACE: &str = "books";
pub const COVERS_NAMESPACE: &str = "covers";

/// Content type served for cover images
pub const COVER_CONTENT_TYPE: &str = "image/jpeg";

/// User-visible warnings produced by the search router
pub const WARN_TERM_TOO_SHORT: &str = "Query must have min 3 character!";
pub const WARN_UNKNOWN_OPERATOR: &str = "Wrong search operator!";
