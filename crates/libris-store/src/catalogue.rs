//! Authors, tags, series, publishers and shelves.
//!
//! These are plain rows; the catalogue only needs to create them and count
//! them here. Searching them goes through [`crate::search`].

use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{Author, CatalogueCounts, Publisher, Series, Shelf, Tag};

impl Database {
    pub fn create_author(&self, name: &str, link: &str, description: &str) -> Result<Author> {
        self.conn().execute(
            "INSERT INTO authors (name, link, description) VALUES (?1, ?2, ?3)",
            params![name, link, description],
        )?;
        Ok(Author {
            id: self.conn().last_insert_rowid(),
            name: name.to_string(),
            link: link.to_string(),
            description: description.to_string(),
        })
    }

    pub fn create_tag(&self, name: &str) -> Result<Tag> {
        self.conn()
            .execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
        Ok(Tag {
            id: self.conn().last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn create_series(&self, title: &str, description: &str) -> Result<Series> {
        self.conn().execute(
            "INSERT INTO series (title, description) VALUES (?1, ?2)",
            params![title, description],
        )?;
        Ok(Series {
            id: self.conn().last_insert_rowid(),
            title: title.to_string(),
            description: description.to_string(),
        })
    }

    pub fn create_publisher(&self, name: &str, link: &str) -> Result<Publisher> {
        self.conn().execute(
            "INSERT INTO publishers (name, link) VALUES (?1, ?2)",
            params![name, link],
        )?;
        Ok(Publisher {
            id: self.conn().last_insert_rowid(),
            name: name.to_string(),
            link: link.to_string(),
        })
    }

    pub fn create_shelf(&self, name: &str, description: &str, is_public: bool) -> Result<Shelf> {
        self.conn().execute(
            "INSERT INTO shelves (name, description, is_public) VALUES (?1, ?2, ?3)",
            params![name, description, is_public as i32],
        )?;
        Ok(Shelf {
            id: self.conn().last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            is_public,
        })
    }

    /// Row counts for the statistics page.
    pub fn catalogue_counts(&self) -> Result<CatalogueCounts> {
        self.conn()
            .query_row(
                "SELECT
                    (SELECT COUNT(*) FROM books),
                    (SELECT COUNT(*) FROM authors),
                    (SELECT COUNT(*) FROM tags),
                    (SELECT COUNT(*) FROM series),
                    (SELECT COUNT(*) FROM publishers),
                    (SELECT COUNT(*) FROM shelves)",
                [],
                |row| {
                    Ok(CatalogueCounts {
                        books: row.get(0)?,
                        authors: row.get(1)?,
                        tags: row.get(2)?,
                        series: row.get(3)?,
                        publishers: row.get(4)?,
                        shelves: row.get(5)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}
