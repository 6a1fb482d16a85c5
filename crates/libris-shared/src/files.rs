//! File-name helpers for book attachments.
//!
//! Every place that needs an attachment's extension goes through
//! [`normalize_extension`], so uploads, replacements and downloads all agree
//! on which extension slot a file occupies.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::constants::MAX_EXTENSION_LEN;

/// Derive the normalized extension of an uploaded file.
///
/// The suffix of `file_name` wins when present. The content type is only
/// consulted when the name has no usable suffix. Returns `None` when neither
/// yields a valid extension.
pub fn normalize_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<String> {
    file_name
        .and_then(extension_from_name)
        .or_else(|| content_type.and_then(extension_from_content_type))
}

fn extension_from_name(file_name: &str) -> Option<String> {
    // Browsers on Windows may send the full client path
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let ext = Path::new(base).extension()?.to_str()?;
    clean_extension(ext)
}

fn extension_from_content_type(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let ext = match essence.as_str() {
        "application/epub+zip" => "epub",
        "application/pdf" => "pdf",
        "application/x-mobipocket-ebook" => "mobi",
        "application/vnd.amazon.ebook" => "azw3",
        "application/x-fictionbook+xml" => "fb2",
        "image/vnd.djvu" | "image/x-djvu" => "djvu",
        "text/plain" => "txt",
        "text/html" => "html",
        "application/rtf" | "text/rtf" => "rtf",
        "application/zip" => "zip",
        "application/vnd.comicbook+zip" | "application/x-cbz" => "cbz",
        "application/vnd.comicbook-rar" | "application/x-cbr" => "cbr",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => return None,
    };
    Some(ext.to_string())
}

fn clean_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() || ext.chars().count() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_alphanumeric()) {
        return None;
    }
    Some(ext)
}

/// Content type served for a stored extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "epub" => "application/epub+zip",
        "pdf" => "application/pdf",
        "mobi" => "application/x-mobipocket-ebook",
        "azw" | "azw3" => "application/vnd.amazon.ebook",
        "fb2" => "application/x-fictionbook+xml",
        "djvu" => "image/vnd.djvu",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "rtf" => "application/rtf",
        "zip" => "application/zip",
        "cbz" => "application/vnd.comicbook+zip",
        "cbr" => "application/vnd.comicbook-rar",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn unsafe_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^-\w.]").expect("filename pattern is valid"))
}

/// Build a download file name from a book title and extension.
///
/// Spaces become underscores and everything outside `[-\w.]` is dropped.
pub fn safe_filename(title: &str, ext: &str) -> String {
    let sanitize = |s: &str| unsafe_chars().replace_all(&s.trim().replace(' ', "_"), "").into_owned();

    let mut stem = sanitize(title);
    if stem.trim_matches('.').is_empty() {
        stem = "book".to_string();
    }

    let ext = sanitize(ext);
    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}
