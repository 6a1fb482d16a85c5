use thiserror::Error;

use crate::constants::{WARN_TERM_TOO_SHORT, WARN_UNKNOWN_OPERATOR};

/// Reasons a search query is rejected before any search runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("term too short")]
    TermTooShort,

    #[error("unknown search operator: {0}")]
    UnknownOperator(String),
}

impl QueryError {
    /// Warning text shown to the user alongside the redirect.
    pub fn warning(&self) -> &'static str {
        match self {
            QueryError::TermTooShort => WARN_TERM_TOO_SHORT,
            QueryError::UnknownOperator(_) => WARN_UNKNOWN_OPERATOR,
        }
    }

    /// Short machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            QueryError::TermTooShort => "term too short",
            QueryError::UnknownOperator(_) => "unknown search operator",
        }
    }
}
