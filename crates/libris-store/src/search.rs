//! Substring search over the catalogue tables.
//!
//! One implementation serves every [`Subject`]; the subjects differ only in
//! the table, the column shown as the label and the columns searched.
//! Matching is SQLite `LIKE`, so it is case-insensitive for ASCII only.

use rusqlite::params;

use libris_shared::Subject;

use crate::database::Database;
use crate::error::Result;
use crate::models::CatalogueEntry;

struct SearchTarget {
    table: &'static str,
    label: &'static str,
    fields: &'static [&'static str],
    order_by: &'static str,
}

fn target(subject: Subject) -> SearchTarget {
    match subject {
        Subject::Book => SearchTarget {
            table: "books",
            label: "title",
            fields: &["title", "description"],
            order_by: "id DESC",
        },
        Subject::Author => SearchTarget {
            table: "authors",
            label: "name",
            fields: &["name"],
            order_by: "name ASC",
        },
        Subject::Tag => SearchTarget {
            table: "tags",
            label: "name",
            fields: &["name"],
            order_by: "name ASC",
        },
        Subject::Series => SearchTarget {
            table: "series",
            label: "title",
            fields: &["title"],
            order_by: "title ASC",
        },
        Subject::Publisher => SearchTarget {
            table: "publishers",
            label: "name",
            fields: &["name"],
            order_by: "name ASC",
        },
    }
}

/// One page of matches plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub total: i64,
    pub entries: Vec<CatalogueEntry>,
}

/// Escape `LIKE` wildcards so the term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Database {
    /// Find rows of `subject` whose searched columns contain `term`.
    pub fn search(
        &self,
        subject: Subject,
        term: &str,
        limit: usize,
        offset: usize,
    ) -> Result<SearchResults> {
        let target = target(subject);
        let filter = target
            .fields
            .iter()
            .map(|field| format!("{field} LIKE ?1 ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let pattern = like_pattern(term);

        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {filter}", target.table),
            params![pattern],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT id, {} FROM {} WHERE {filter} ORDER BY {} LIMIT ?2 OFFSET ?3",
            target.label, target.table, target.order_by
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![pattern, limit, offset], |row| {
            Ok(CatalogueEntry {
                subject,
                id: row.get(0)?,
                label: row.get(1)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }

        tracing::debug!(%subject, term, total, returned = entries.len(), "catalogue search");

        Ok(SearchResults { total, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBook;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("search.db")).unwrap();
        (db, dir)
    }

    fn book(db: &Database, title: &str, description: &str) {
        db.create_book(&NewBook {
            title: Some(title.to_string()),
            description: description.to_string(),
            isbn: String::new(),
        })
        .unwrap();
    }

    #[test]
    fn books_match_title_or_description() {
        let (db, _dir) = test_db();
        book(&db, "The Dispossessed", "An ambiguous utopia");
        book(&db, "Utopia", "Thomas More");
        book(&db, "Dune", "Desert planet");

        let results = db.search(Subject::Book, "utopia", 20, 0).unwrap();
        assert_eq!(results.total, 2);
        // newest first
        let labels: Vec<_> = results.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Utopia", "The Dispossessed"]);
        assert!(results.entries.iter().all(|e| e.subject == Subject::Book));
    }

    #[test]
    fn each_subject_searches_its_own_table() {
        let (db, _dir) = test_db();
        db.create_author("Ursula K. Le Guin", "", "Earthsea").unwrap();
        db.create_tag("earth science").unwrap();
        db.create_series("Earthsea Cycle", "").unwrap();
        db.create_publisher("Earthlight Press", "").unwrap();

        for subject in [Subject::Tag, Subject::Series, Subject::Publisher] {
            let results = db.search(subject, "Earth", 20, 0).unwrap();
            assert_eq!(results.total, 1, "{subject}");
        }
        // author description is not searched
        assert_eq!(db.search(Subject::Author, "Earthsea", 20, 0).unwrap().total, 0);
        assert_eq!(db.search(Subject::Author, "Le Guin", 20, 0).unwrap().total, 1);
    }

    #[test]
    fn offset_past_sqlite_range_is_empty() {
        let (db, _dir) = test_db();
        db.create_tag("fantasy").unwrap();

        let results = db.search(Subject::Tag, "fantasy", usize::MAX, usize::MAX).unwrap();
        assert_eq!(results.total, 1);
        assert!(results.entries.is_empty());
    }

    #[test]
    fn pagination_reports_total() {
        let (db, _dir) = test_db();
        for i in 0..25 {
            db.create_tag(&format!("tag-{i:02}")).unwrap();
        }

        let first = db.search(Subject::Tag, "tag-", 20, 0).unwrap();
        assert_eq!(first.total, 25);
        assert_eq!(first.entries.len(), 20);
        assert_eq!(first.entries[0].label, "tag-00");

        let second = db.search(Subject::Tag, "tag-", 20, 20).unwrap();
        assert_eq!(second.entries.len(), 5);
        assert_eq!(second.entries[4].label, "tag-24");
    }

    #[test]
    fn wildcards_match_literally() {
        let (db, _dir) = test_db();
        db.create_tag("100% fiction").unwrap();
        db.create_tag("1000 fiction").unwrap();
        db.create_tag("snake_case").unwrap();
        db.create_tag("snakes").unwrap();

        assert_eq!(db.search(Subject::Tag, "100%", 20, 0).unwrap().total, 1);
        assert_eq!(db.search(Subject::Tag, "e_c", 20, 0).unwrap().total, 1);
    }
}
