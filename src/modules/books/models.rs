use serde::{Deserialize, Serialize};

/// A stored book record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Assigned by the store, never reused
    pub id: i64,
    pub title: String,
    pub author: String,
    pub year: i64,
    pub price: f64,
}

/// A validated creation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub year: i64,
    pub price: f64,
}

/// A validated partial update. `None` means the field was not supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i64>,
    pub price: Option<f64>,
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.year.is_none() && self.price.is_none()
    }

    /// Copy supplied fields onto `book`.
    pub fn apply(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(year) = self.year {
            book.year = year;
        }
        if let Some(price) = self.price {
            book.price = price;
        }
    }
}

/// Query string of `GET /books/`. A negative `limit` means no limit and a
/// negative `offset` counts from the start.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default = "ListQuery::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub q: Option<String>,
}

impl ListQuery {
    fn default_limit() -> i64 {
        10
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: Self::default_limit(),
            offset: 0,
            q: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteConfirmation {
    pub message: String,
}

impl DeleteConfirmation {
    pub fn for_id(id: i64) -> Self {
        Self {
            message: format!("Book with ID {id} has been deleted"),
        }
    }
}
