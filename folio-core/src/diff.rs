//! Line-based diff alignment for side-by-side spread comparison
//!
//! Computes a line-granularity diff of two texts and produces two parallel
//! sequences of annotated lines. The sequences are always the same length:
//! a line that exists on only one side gets a placeholder entry on the other
//! side, so the two columns stay vertically aligned row-for-row.

use similar::{ChangeTag, TextDiff};

use crate::html;

/// Sentinel line number carried by placeholder entries.
pub const PLACEHOLDER_LINE: i32 = -1;

/// Change status of one row relative to the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    Added,
    Removed,
    Unchanged,
    /// Alignment filler opposite an added/removed line; carries no content.
    Placeholder,
}

/// One row of a side-by-side comparison view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub content: String,
    pub kind: DiffLineKind,
    /// 1-based line number on its own side, or [`PLACEHOLDER_LINE`].
    pub line_number: i32,
}

impl DiffLine {
    fn placeholder() -> Self {
        Self {
            content: String::new(),
            kind: DiffLineKind::Placeholder,
            line_number: PLACEHOLDER_LINE,
        }
    }
}

/// Two equal-length aligned line sequences.
#[derive(Debug, Clone, Default)]
pub struct AlignedDiff {
    pub left: Vec<DiffLine>,
    pub right: Vec<DiffLine>,
}

/// Compute an aligned line diff between two texts.
///
/// Invariant: `left.len() == right.len()` for any input pair, including
/// empty strings. Lines are emitted in the order the underlying diff reports
/// them, which respects original document order on both sides.
pub fn compute_diff(left: &str, right: &str) -> AlignedDiff {
    let diff = TextDiff::from_lines(left, right);

    let mut result = AlignedDiff::default();
    let mut left_line = 1;
    let mut right_line = 1;

    for change in diff.iter_all_changes() {
        let content = strip_newline(change.value());

        match change.tag() {
            ChangeTag::Equal => {
                result.left.push(DiffLine {
                    content: content.to_string(),
                    kind: DiffLineKind::Unchanged,
                    line_number: left_line,
                });
                result.right.push(DiffLine {
                    content: content.to_string(),
                    kind: DiffLineKind::Unchanged,
                    line_number: right_line,
                });
                left_line += 1;
                right_line += 1;
            }
            ChangeTag::Delete => {
                result.left.push(DiffLine {
                    content: content.to_string(),
                    kind: DiffLineKind::Removed,
                    line_number: left_line,
                });
                result.right.push(DiffLine::placeholder());
                left_line += 1;
            }
            ChangeTag::Insert => {
                result.right.push(DiffLine {
                    content: content.to_string(),
                    kind: DiffLineKind::Added,
                    line_number: right_line,
                });
                result.left.push(DiffLine::placeholder());
                right_line += 1;
            }
        }
    }

    debug_assert_eq!(result.left.len(), result.right.len());
    result
}

/// Drop the line terminator kept by the line-level tokenizer.
fn strip_newline(value: &str) -> &str {
    let value = value.strip_suffix('\n').unwrap_or(value);
    value.strip_suffix('\r').unwrap_or(value)
}

/// Render one aligned sequence to HTML fragments, one `div` per row.
///
/// Content is HTML-escaped; empty content falls back to a non-breaking space
/// so empty lines remain visible and clickable.
pub fn render_diff_html(lines: &[DiffLine]) -> String {
    let mut out = String::new();

    for line in lines {
        let (class, symbol) = match line.kind {
            DiffLineKind::Added => (" diff-line-added", "+"),
            DiffLineKind::Removed => (" diff-line-removed", "-"),
            DiffLineKind::Placeholder => (" diff-line-placeholder", "&nbsp;"),
            DiffLineKind::Unchanged => ("", "&nbsp;"),
        };

        let escaped = html::escape(&line.content);
        let content = if escaped.is_empty() {
            "&nbsp;"
        } else {
            escaped.as_str()
        };

        out.push_str(&format!(
            "<div class=\"diff-line{}\"><span class=\"diff-symbol\">{}</span>{}</div>",
            class, symbol, content
        ));
    }

    out
}
