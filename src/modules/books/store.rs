//! Book rows in SQLite.

use anyhow::Context;
use rusqlite::{params, OptionalExtension, Row, Transaction};

use bookshelf_db::Database;

use super::models::{Book, BookPatch, NewBook};

const COLUMNS: &str = "id, title, author, year, price";

/// Pass-through store over the `book` table. Each call is one transaction.
#[derive(Clone)]
pub struct BookStore {
    db: Database,
}

impl BookStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(&self, book: NewBook) -> anyhow::Result<Book> {
        self.db.transaction(|tx| {
            tx.execute(
                "INSERT INTO book (title, author, year, price) VALUES (?1, ?2, ?3, ?4)",
                params![book.title, book.author, book.year, book.price],
            )
            .context("failed to insert book")?;

            let id = tx.last_insert_rowid();
            Ok(Book {
                id,
                title: book.title,
                author: book.author,
                year: book.year,
                price: book.price,
            })
        })
    }

    pub fn get(&self, id: i64) -> anyhow::Result<Option<Book>> {
        self.db.transaction(|tx| fetch(tx, id))
    }

    /// Books whose title or author contains `query` (case-sensitive), in
    /// insertion order. An empty query matches everything. A negative
    /// `limit` is unbounded and a negative `offset` is treated as 0.
    pub fn list(&self, query: Option<&str>, limit: i64, offset: i64) -> anyhow::Result<Vec<Book>> {
        let pattern = query.unwrap_or_default();
        let limit = if limit < 0 { -1 } else { limit };
        let offset = offset.max(0);

        self.db.transaction(|tx| {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM book
                     WHERE ?1 = '' OR instr(title, ?1) > 0 OR instr(author, ?1) > 0
                     ORDER BY id
                     LIMIT ?2 OFFSET ?3"
                ))
                .context("failed to prepare book query")?;

            let books = stmt
                .query_map(params![pattern, limit, offset], book_from_row)
                .context("failed to query books")?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read book row")?;

            Ok(books)
        })
    }

    /// Apply the supplied fields. `None` when no such book exists.
    pub fn update(&self, id: i64, patch: BookPatch) -> anyhow::Result<Option<Book>> {
        self.db.transaction(|tx| {
            let Some(mut book) = fetch(tx, id)? else {
                return Ok(None);
            };
            if patch.is_empty() {
                return Ok(Some(book));
            }

            patch.apply(&mut book);
            tx.execute(
                "UPDATE book SET title = ?1, author = ?2, year = ?3, price = ?4 WHERE id = ?5",
                params![book.title, book.author, book.year, book.price, id],
            )
            .context("failed to update book")?;

            Ok(Some(book))
        })
    }

    /// `false` when no such book exists.
    pub fn delete(&self, id: i64) -> anyhow::Result<bool> {
        self.db.transaction(|tx| {
            let removed = tx
                .execute("DELETE FROM book WHERE id = ?1", params![id])
                .context("failed to delete book")?;
            Ok(removed > 0)
        })
    }
}

fn fetch(tx: &Transaction<'_>, id: i64) -> anyhow::Result<Option<Book>> {
    tx.query_row(
        &format!("SELECT {COLUMNS} FROM book WHERE id = ?1"),
        params![id],
        book_from_row,
    )
    .optional()
    .with_context(|| format!("failed to load book {id}"))
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        year: row.get(3)?,
        price: row.get(4)?,
    })
}
