//! Free-text search queries.
//!
//! A query may start with a subject operator such as `author:` which routes
//! the search to that entity type; without one the query searches books.
//!
//! ```text
//! "author:   tolkien"  -> Dispatch(Author, "tolkien")
//! "hobbit"             -> Dispatch(Book, "hobbit")
//! "xyz:hobbit"         -> Reject(UnknownOperator)
//! "ab"                 -> Reject(TermTooShort)
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::constants::MIN_QUERY_LEN;
use crate::error::QueryError;
use crate::types::Subject;

fn subject_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\w*:)(.*)").expect("subject pattern is valid"))
}

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*(.*)").expect("term pattern is valid"))
}

/// A raw query split into its optional operator and the search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    /// Leading `word:` operator, colon included. Not validated here.
    pub subject_tag: Option<String>,
    /// Search term with leading whitespace removed. Trailing whitespace is kept.
    pub term: String,
}

/// Split a raw query into operator and term.
///
/// Neither `.` in the patterns crosses a line break, so anything after the
/// first newline of the term is dropped.
pub fn parse(raw: &str) -> ParsedQuery {
    let (subject_tag, rest) = match subject_pattern().captures(raw) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().to_string()),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => (None, raw),
    };

    let term = term_pattern()
        .captures(rest)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str())
        .to_string();

    ParsedQuery { subject_tag, term }
}

/// Where a search request should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Dispatch { subject: Subject, term: String },
    Reject(QueryError),
}

impl RouteDecision {
    /// Redirect target of a dispatch decision.
    pub fn location(&self) -> Option<String> {
        match self {
            RouteDecision::Dispatch { subject, term } => Some(search_location(*subject, term)),
            RouteDecision::Reject(_) => None,
        }
    }
}

/// Path of a subject's search endpoint with the term as `query` parameter.
pub fn search_location(subject: Subject, term: &str) -> String {
    format!("/search/{}?query={}", subject.slug(), urlencoding::encode(term))
}

/// Check the minimum term length, counted in characters.
pub fn validate_term(term: &str) -> Result<(), QueryError> {
    if term.chars().count() < MIN_QUERY_LEN {
        return Err(QueryError::TermTooShort);
    }
    Ok(())
}

/// Decide where a raw query is dispatched. The length check runs before the
/// operator is looked at.
pub fn route(raw: &str) -> RouteDecision {
    let parsed = parse(raw);

    if let Err(e) = validate_term(&parsed.term) {
        return RouteDecision::Reject(e);
    }

    let subject = match parsed.subject_tag {
        None => Subject::Book,
        Some(tag) => match Subject::from_tag(&tag) {
            Some(subject) => subject,
            None => return RouteDecision::Reject(QueryError::UnknownOperator(tag)),
        },
    };

    RouteDecision::Dispatch {
        subject,
        term: parsed.term,
    }
}
