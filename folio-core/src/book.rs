//! Book and spread data model with JSON persistence
//!
//! A book is an ordered sequence of spreads; each spread holds raw Markdown
//! for its left and right page plus fractional pane weights. Spreads have no
//! identity beyond position, except optional backend page ids kept for
//! persistence round-trips.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One side of a spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSide {
    Left,
    Right,
}

/// A two-page unit of the document being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spread {
    pub left: String,
    pub right: String,
    /// Fractional pane weight, must be > 0. Pane sizing only, never content.
    pub left_width: f32,
    pub right_width: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_page_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_page_id: Option<u64>,
}

impl Default for Spread {
    fn default() -> Self {
        Self {
            left: String::new(),
            right: String::new(),
            left_width: 1.0,
            right_width: 1.0,
            left_page_id: None,
            right_page_id: None,
        }
    }
}

/// An ordered sequence of spreads, with optional backend identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub spreads: Vec<Spread>,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    /// Create a new book with a generated filename and one empty spread.
    pub fn new() -> Self {
        Self {
            id: None,
            filename: generate_filename(),
            status: None,
            spreads: vec![Spread::default()],
        }
    }

    pub fn spread_count(&self) -> usize {
        self.spreads.len()
    }

    /// Append an empty spread and return its index.
    pub fn add_spread(&mut self) -> usize {
        self.spreads.push(Spread::default());
        self.spreads.len() - 1
    }

    /// Remove the spread at `index`. The last remaining spread cannot be
    /// deleted; a book always has at least one.
    pub fn delete_spread(&mut self, index: usize) -> bool {
        if self.spreads.len() == 1 || index >= self.spreads.len() {
            return false;
        }
        self.spreads.remove(index);
        true
    }

    /// Raw Markdown for one page, or `None` when the spread doesn't exist.
    pub fn page_source(&self, spread: usize, side: PageSide) -> Option<&str> {
        let spread = self.spreads.get(spread)?;
        match side {
            PageSide::Left => Some(&spread.left),
            PageSide::Right => Some(&spread.right),
        }
    }

    /// Clamp a current-spread index after mutation.
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.spreads.len().saturating_sub(1))
    }

    /// Check the structural invariants: at least one spread, all pane
    /// weights strictly positive.
    pub fn validate(&self) -> Result<()> {
        if self.spreads.is_empty() {
            anyhow::bail!("Book \"{}\" has no spreads", self.filename);
        }
        for (i, spread) in self.spreads.iter().enumerate() {
            // Written with negation so NaN weights fail too.
            if !(spread.left_width > 0.0) || !(spread.right_width > 0.0) {
                anyhow::bail!(
                    "Spread {} of \"{}\" has non-positive pane weight",
                    i,
                    self.filename
                );
            }
        }
        Ok(())
    }

    /// Load a book from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read book file: {}", path.display()))?;

        let book: Book = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse book file: {}", path.display()))?;

        book.validate()?;
        Ok(book)
    }

    /// Save the book as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize book")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write book file: {}", path.display()))?;

        Ok(())
    }
}

/// Timestamped default filename for a fresh book.
pub fn generate_filename() -> String {
    chrono::Local::now().format("book-%Y%m%d-%H%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_new_book_has_one_empty_spread() {
        let book = Book::new();
        assert_eq!(book.spread_count(), 1);
        assert_eq!(book.spreads[0].left, "");
        assert_eq!(book.spreads[0].right, "");
        assert_eq!(book.spreads[0].left_width, 1.0);
        assert!(book.filename.starts_with("book-"));
    }

    #[test]
    fn test_add_spread_returns_new_index() {
        let mut book = Book::new();
        let index = book.add_spread();
        assert_eq!(index, 1);
        assert_eq!(book.spread_count(), 2);
    }

    #[test]
    fn test_delete_spread_refuses_last() {
        let mut book = Book::new();
        assert!(!book.delete_spread(0));
        assert_eq!(book.spread_count(), 1);

        book.add_spread();
        assert!(book.delete_spread(0));
        assert_eq!(book.spread_count(), 1);
    }

    #[test]
    fn test_delete_spread_out_of_bounds() {
        let mut book = Book::new();
        book.add_spread();
        assert!(!book.delete_spread(5));
        assert_eq!(book.spread_count(), 2);
    }

    #[test]
    fn test_clamp_index_after_delete() {
        let mut book = Book::new();
        book.add_spread();
        book.add_spread();
        book.delete_spread(2);
        assert_eq!(book.clamp_index(2), 1);
        assert_eq!(book.clamp_index(0), 0);
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut book = Book::new();
        book.spreads[0].left_width = 0.0;
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nan_weights() {
        let mut book = Book::new();
        book.spreads[0].right_width = f32::NAN;
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_page_source_selects_side() {
        let mut book = Book::new();
        book.spreads[0].left = "left text".to_string();
        book.spreads[0].right = "right text".to_string();

        assert_eq!(book.page_source(0, PageSide::Left), Some("left text"));
        assert_eq!(book.page_source(0, PageSide::Right), Some("right text"));
        assert_eq!(book.page_source(1, PageSide::Left), None);
    }

    #[test]
    fn test_save_and_load_round_trip() -> Result<()> {
        let file = NamedTempFile::new()?;

        let mut book = Book::new();
        book.spreads[0].left = "# Left page\n".to_string();
        book.spreads[0].right = "Right page\n".to_string();
        book.spreads[0].left_page_id = Some(42);
        book.add_spread();

        book.save(file.path())?;
        let loaded = Book::load(file.path())?;

        assert_eq!(loaded, book);
        Ok(())
    }

    #[test]
    fn test_load_uses_camel_case_wire_format() -> Result<()> {
        let file = NamedTempFile::new()?;
        fs::write(
            file.path(),
            r#"{
  "filename": "book-20250101-0900",
  "spreads": [
    {"left": "a", "right": "b", "leftWidth": 1.5, "rightWidth": 0.5, "leftPageId": 7}
  ]
}"#,
        )?;

        let book = Book::load(file.path())?;
        assert_eq!(book.spreads[0].left_width, 1.5);
        assert_eq!(book.spreads[0].left_page_id, Some(7));
        assert_eq!(book.spreads[0].right_page_id, None);
        Ok(())
    }

    #[test]
    fn test_load_rejects_invalid_json() -> Result<()> {
        let file = NamedTempFile::new()?;
        fs::write(file.path(), "not json")?;
        assert!(Book::load(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_load_rejects_empty_spreads() -> Result<()> {
        let file = NamedTempFile::new()?;
        fs::write(file.path(), r#"{"filename": "x", "spreads": []}"#)?;
        assert!(Book::load(file.path()).is_err());
        Ok(())
    }
}
