//! Terminal output.

use colored::Colorize;

use crate::client::{Book, Token};

/// Summary printed after a create or update.
pub fn saved(heading: &str, book: &Book) -> String {
    let mut output = format!("{}\n", heading.green());
    output.push_str(&format!("ID: {}\n", book.id));
    output.push_str(&format!("Title: {}\n", book.title));
    output.push_str(&format!("Author: {}\n", book.author));
    output.push_str(&format!("Year: {}\n", book.year));
    output.push_str(&format!("Price: {}", price(book.price)));
    output
}

pub fn details(book: &Book) -> String {
    let mut output = format!("\n{}\n\n", "Book Details".bold().cyan());
    output.push_str(&format!("{} {}\n", "ID:".cyan(), book.id));
    output.push_str(&format!("{} {}\n", "Title:".green(), book.title));
    output.push_str(&format!("{} {}\n", "Author:".magenta(), book.author));
    output.push_str(&format!("{} {}\n", "Year:".blue(), book.year));
    output.push_str(&format!("{} {}\n", "Price:".yellow(), price(book.price)));
    output
}

/// Column-aligned listing.
pub fn table(books: &[Book]) -> String {
    if books.is_empty() {
        return "No books found.".yellow().to_string();
    }

    let rows: Vec<[String; 5]> = books
        .iter()
        .map(|b| {
            [
                b.id.to_string(),
                b.title.clone(),
                b.author.clone(),
                b.year.to_string(),
                price(b.price),
            ]
        })
        .collect();
    let headers = ["ID", "Title", "Author", "Year", "Price"];

    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 5]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| pad(cell, width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut output = format!("{}\n", format!("Books (showing {})", books.len()).bold());
    output.push_str(&line(headers).bold().to_string());
    output.push('\n');
    for row in &rows {
        let cells = [
            row[0].as_str(),
            row[1].as_str(),
            row[2].as_str(),
            row[3].as_str(),
            row[4].as_str(),
        ];
        output.push_str(&line(cells));
        output.push('\n');
    }
    output
}

pub fn token(token: &Token) -> String {
    format!(
        "{}\n{}\n{}",
        "Login successful.".green(),
        token.access_token,
        format!(
            "({} token, expires in {} minutes; pass it with --token or BOOKS_API_TOKEN)",
            token.token_type,
            token.expires_in / 60
        )
        .dimmed()
    )
}

fn price(value: f64) -> String {
    format!("${value:.2}")
}

fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.chars().count());
    format!("{cell}{}", " ".repeat(fill))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: i64, title: &str) -> Book {
        Book {
            id,
            title: title.to_string(),
            author: "Frank Herbert".to_string(),
            year: 1965,
            price: 9.5,
        }
    }

    #[test]
    fn test_price_has_two_decimals() {
        assert_eq!(price(9.5), "$9.50");
        assert_eq!(price(0.0), "$0.00");
    }

    #[test]
    fn test_table_lists_every_book() {
        colored::control::set_override(false);
        let output = table(&[book(1, "Dune"), book(2, "Dune Messiah")]);
        assert!(output.starts_with("Books (showing 2)"));
        assert!(output.contains("Dune Messiah"));
        assert_eq!(output.lines().count(), 4);
    }

    #[test]
    fn test_empty_table() {
        colored::control::set_override(false);
        assert_eq!(table(&[]), "No books found.");
    }

    #[test]
    fn test_saved_summary() {
        colored::control::set_override(false);
        let output = saved("Book created successfully!", &book(7, "Dune"));
        assert!(output.contains("ID: 7"));
        assert!(output.ends_with("Price: $9.50"));
    }
}
