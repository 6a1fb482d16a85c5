//! Per-subject search endpoints.
//!
//! The router in `libris_shared::query` decides which subject a query goes
//! to; this module runs the search for one subject and pages the results.
//! The endpoints are reachable directly, so the term is validated again.

use serde::Serialize;

use libris_shared::query::validate_term;
use libris_shared::Subject;
use libris_store::{CatalogueEntry, Database};

use crate::error::ServerError;

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub subject: Subject,
    pub query: String,
    pub total: i64,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    pub num_pages: usize,
    pub items: Vec<CatalogueEntry>,
}

/// Row offset of a 1-based page, saturating at what SQLite can take.
fn page_offset(page: usize, page_size: usize) -> usize {
    (page - 1)
        .saturating_mul(page_size)
        .min(i64::MAX as usize)
}

/// Search one subject. Pages past the end clamp to the last page.
pub fn search_subject(
    db: &Database,
    subject: Subject,
    term: &str,
    page: usize,
    page_size: usize,
) -> Result<SearchPage, ServerError> {
    validate_term(term)?;

    let page_size = page_size.max(1);
    let mut page = page.max(1);

    let mut results = db.search(subject, term, page_size, page_offset(page, page_size))?;
    let num_pages = (results.total.max(0) as usize).div_ceil(page_size).max(1);

    if page > num_pages {
        page = num_pages;
        results = db.search(subject, term, page_size, page_offset(page, page_size))?;
    }

    tracing::debug!(%subject, term, page, total = results.total, "Subject search");

    Ok(SearchPage {
        subject,
        query: term.to_string(),
        total: results.total,
        page,
        page_size,
        num_pages,
        items: results.entries,
    })
}
