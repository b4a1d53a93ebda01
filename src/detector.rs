use crate::normalizer::{is_label_cell, normalize_cell};
use crate::schema::{Cell, MetricBlock};
use regex::Regex;
use std::sync::LazyLock;

static LEADING_BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-•*·]+\s*").expect("valid bullet regex"));

static TRAILING_BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[-•*·]+\s*$").expect("valid trailing bullet regex"));

static ENUMERATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+").expect("valid enumeration regex"));

static FOOTNOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d+\)\s*$").expect("valid footnote regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strips bullets, enumeration and footnote markers from a line-item label.
/// Falls back to the trimmed input if cleaning would remove every letter.
pub fn clean_label(raw: &str) -> String {
    let text = raw.replace('\u{a0}', " ");
    let text = LEADING_BULLET_RE.replace(&text, "");
    let text = TRAILING_BULLET_RE.replace(&text, "");
    let text = ENUMERATION_RE.replace(&text, "");
    let text = FOOTNOTE_RE.replace(&text, "");
    let cleaned = WHITESPACE_RE.replace_all(text.trim(), " ").to_string();

    if cleaned.chars().any(char::is_alphabetic) {
        cleaned
    } else {
        WHITESPACE_RE.replace_all(raw.trim(), " ").to_string()
    }
}

/// Segments one row into (label, values) blocks, scanning left to right.
///
/// Blank cells and punctuation-only text act as spacers between values; a cell with a
/// letter ends the current block and starts the next candidate label. Labels that
/// collect no value produce no block.
pub fn detect_blocks(row: &[Cell], source_row: usize) -> Vec<MetricBlock> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < row.len() {
        if !is_label_cell(&row[i]) {
            i += 1;
            continue;
        }

        let label_col = i;
        let mut values = Vec::new();
        let mut value_cols = Vec::new();
        let mut j = i + 1;

        while j < row.len() {
            let cell = &row[j];
            if is_label_cell(cell) {
                break;
            }
            if let Some(token) = normalize_cell(cell) {
                values.push(token);
                value_cols.push(j);
            }
            j += 1;
        }

        if let (Some(&last_col), Some(label)) = (value_cols.last(), row[label_col].as_text()) {
            blocks.push(MetricBlock {
                label: clean_label(label),
                values,
                source_row,
                source_col_range: (label_col, last_col),
                value_cols,
            });
        }

        i = j;
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValueToken;

    fn text(s: &str) -> Cell {
        Cell::text(s)
    }

    #[test]
    fn test_single_block_with_spacers() {
        let row = vec![
            text("Revenue"),
            Cell::Empty,
            Cell::Numeric(100.0),
            Cell::Empty,
            text("$110"),
            text("—"),
        ];
        let blocks = detect_blocks(&row, 3);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].label, "Revenue");
        assert_eq!(
            blocks[0].values,
            vec![ValueToken::new(100.0), ValueToken::new(110.0)]
        );
        assert_eq!(blocks[0].source_row, 3);
        assert_eq!(blocks[0].source_col_range, (0, 4));
        assert_eq!(blocks[0].value_cols, vec![2, 4]);
    }

    #[test]
    fn test_repeated_blocks_in_one_row() {
        let row = vec![
            text("Net sales"),
            Cell::Numeric(10.0),
            Cell::Numeric(20.0),
            Cell::Empty,
            text("Net sales"),
            Cell::Numeric(20.0),
            Cell::Numeric(30.0),
        ];
        let blocks = detect_blocks(&row, 0);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].source_col_range, (4, 6));
    }

    #[test]
    fn test_labels_without_values_are_dropped() {
        let row = vec![
            text("Current assets:"),
            text("Cash"),
            Cell::Numeric(5.0),
            text("Notes"),
        ];
        let blocks = detect_blocks(&row, 0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].label, "Cash");
        assert_eq!(blocks[0].source_col_range, (1, 2));
    }

    #[test]
    fn test_leading_numbers_and_empty_rows() {
        let row = vec![Cell::Numeric(1.0), Cell::Empty, Cell::Numeric(2.0)];
        assert!(detect_blocks(&row, 0).is_empty());
        assert!(detect_blocks(&[], 0).is_empty());
    }

    #[test]
    fn test_restated_cells_kept_as_chains() {
        let row = vec![text("Total assets"), text("1,000{1050}"), text("900")];
        let blocks = detect_blocks(&row, 0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].values[0].chain(), vec![1000.0, 1050.0]);
        assert_eq!(blocks[0].values[1].chain(), vec![900.0]);
    }

    #[test]
    fn test_column_ranges_increase() {
        let row = vec![
            text("A item"),
            Cell::Numeric(1.0),
            text("B item"),
            Cell::Empty,
            Cell::Numeric(2.0),
            text("C item"),
            Cell::Numeric(3.0),
            Cell::Numeric(4.0),
        ];
        let blocks = detect_blocks(&row, 0);
        assert_eq!(blocks.len(), 3);
        for pair in blocks.windows(2) {
            assert!(pair[0].source_col_range.1 < pair[1].source_col_range.0);
        }
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("  • Accounts   receivable "), "Accounts receivable");
        assert_eq!(clean_label("1. Revenue"), "Revenue");
        assert_eq!(clean_label("Goodwill (2)"), "Goodwill");
        assert_eq!(clean_label("Net income -"), "Net income");
        assert_eq!(clean_label("Q4"), "Q4");
    }
}
