//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use libris_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_PAGE_SIZE, MAX_REQUEST_SIZE, MAX_UPLOAD_SIZE,
};
use libris_store::Database;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite catalogue database.
    /// Env: `DATABASE_PATH`
    /// Default: platform data directory, else `./libris.db`
    pub database_path: PathBuf,

    /// Filesystem path where book files and covers are stored.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./media`
    pub blob_storage_path: PathBuf,

    /// Maximum size of a single uploaded file, in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 50 MiB
    pub max_upload_size: usize,

    /// Maximum size of a whole request body. A batch may carry several
    /// files, each checked against `max_upload_size` on its own.
    /// Never below `max_upload_size`.
    /// Env: `MAX_REQUEST_SIZE`
    /// Default: 256 MiB
    pub max_request_size: usize,

    /// Search results per page.
    /// Env: `ITEMS_PER_PAGE`
    /// Default: `20`
    pub items_per_page: usize,

    /// Serialize uploads, replacements and deletes per book.
    /// Without it, two overlapping uploads of the same extension race and
    /// may orphan a blob.
    /// Env: `BOOK_UPLOAD_LOCK` (true/false)
    /// Default: `true`
    pub book_upload_lock: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: Database::default_path()
                .unwrap_or_else(|_| PathBuf::from("./libris.db")),
            blob_storage_path: PathBuf::from("./media"),
            max_upload_size: MAX_UPLOAD_SIZE,
            max_request_size: MAX_REQUEST_SIZE,
            items_per_page: DEFAULT_PAGE_SIZE,
            book_upload_lock: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(val) = lookup("MAX_REQUEST_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_request_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_REQUEST_SIZE, using default"),
            }
        }
        if config.max_request_size < config.max_upload_size {
            tracing::warn!(
                max_request_size = config.max_request_size,
                max_upload_size = config.max_upload_size,
                "MAX_REQUEST_SIZE below MAX_UPLOAD_SIZE, raising it"
            );
            config.max_request_size = config.max_upload_size;
        }

        if let Some(val) = lookup("ITEMS_PER_PAGE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.items_per_page = n,
                _ => tracing::warn!(value = %val, "Invalid ITEMS_PER_PAGE, using default"),
            }
        }

        if let Some(val) = lookup("BOOK_UPLOAD_LOCK") {
            config.book_upload_lock = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.items_per_page, 20);
        assert_eq!(config.max_upload_size, 50 * 1024 * 1024);
        assert_eq!(config.max_request_size, 256 * 1024 * 1024);
        assert!(config.book_upload_lock);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/catalogue.db"),
            ("BLOB_STORAGE_PATH", "/srv/media"),
            ("ITEMS_PER_PAGE", "50"),
            ("BOOK_UPLOAD_LOCK", "false"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, PathBuf::from("/tmp/catalogue.db"));
        assert_eq!(config.blob_storage_path, PathBuf::from("/srv/media"));
        assert_eq!(config.items_per_page, 50);
        assert!(!config.book_upload_lock);
    }

    #[test]
    fn test_request_limit_never_below_file_limit() {
        let config = config_from(&[
            ("MAX_UPLOAD_SIZE", "4096"),
            ("MAX_REQUEST_SIZE", "1024"),
        ]);
        assert_eq!(config.max_upload_size, 4096);
        assert_eq!(config.max_request_size, 4096);

        let config = config_from(&[("MAX_REQUEST_SIZE", "1048576")]);
        assert_eq!(config.max_request_size, 1024 * 1024);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("ITEMS_PER_PAGE", "0"),
            ("MAX_UPLOAD_SIZE", "lots"),
        ]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.items_per_page, 20);
        assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
    }
}
