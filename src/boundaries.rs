use crate::classifier::{detect_header_type, StatementClassifier};
use crate::schema::{Cell, StatementRange, StatementType};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Seeking,
    InStatement {
        statement_type: StatementType,
        start: usize,
        header_rows: usize,
    },
}

/// Splits a sheet holding several statements into one row range per statement type.
///
/// A statement starts at its header row and runs until a header of a different type
/// (exclusive) or the end of the sheet. Repeated headers of the same type, such as the
/// column-header row under the title, stay inside the range. When a type appears twice,
/// only the first range is kept.
pub fn extract_boundaries(
    rows: &[Vec<Cell>],
    classifier: &StatementClassifier,
) -> Vec<StatementRange> {
    let mut ranges: Vec<StatementRange> = Vec::new();
    let mut state = ScanState::Seeking;

    let mut close = |statement_type: StatementType, start: usize, end: usize, header_rows: usize| {
        if ranges.iter().any(|r| r.statement_type == statement_type) {
            info!(
                "Ignoring repeated {} section at rows {}..={}",
                statement_type, start, end
            );
            return;
        }
        let confidence_score = classifier.score_rows(statement_type, &rows[start..=end]);
        debug!(
            "{} spans rows {}..={} ({} header rows, confidence {})",
            statement_type, start, end, header_rows, confidence_score
        );
        ranges.push(StatementRange {
            statement_type,
            start_row: start,
            end_row: end,
            confidence_score,
        });
    };

    for (idx, row) in rows.iter().enumerate() {
        let Some(header) = detect_header_type(row) else {
            continue;
        };

        state = match state {
            ScanState::Seeking => ScanState::InStatement {
                statement_type: header,
                start: idx,
                header_rows: 1,
            },
            ScanState::InStatement {
                statement_type,
                start,
                header_rows,
            } if statement_type == header => ScanState::InStatement {
                statement_type,
                start,
                header_rows: header_rows + 1,
            },
            ScanState::InStatement {
                statement_type,
                start,
                header_rows,
            } => {
                close(statement_type, start, idx - 1, header_rows);
                ScanState::InStatement {
                    statement_type: header,
                    start: idx,
                    header_rows: 1,
                }
            }
        };
    }

    if let ScanState::InStatement {
        statement_type,
        start,
        header_rows,
    } = state
    {
        close(statement_type, start, rows.len() - 1, header_rows);
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(text: &str) -> Vec<Cell> {
        vec![Cell::text(text), Cell::text("Dec. 31, 2024"), Cell::text("Dec. 31, 2023")]
    }

    fn data(label: &str, a: f64, b: f64) -> Vec<Cell> {
        vec![Cell::text(label), Cell::Numeric(a), Cell::Numeric(b)]
    }

    fn stacked_sheet() -> Vec<Vec<Cell>> {
        let mut rows = vec![
            header("Consolidated Balance Sheets"),
            header("Consolidated Balance Sheets - USD ($) $ in Millions"),
        ];
        for i in 2..=40 {
            rows.push(data(&format!("Balance item {}", i), i as f64, i as f64 + 1.0));
        }
        rows.push(header("Consolidated Statements of Cash Flows"));
        for i in 42..=50 {
            rows.push(data(&format!("Net cash item {}", i), i as f64, 1.0));
        }
        rows
    }

    #[test]
    fn test_stacked_statements() {
        let ranges = extract_boundaries(&stacked_sheet(), &StatementClassifier::default());

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].statement_type, StatementType::Balance);
        assert_eq!((ranges[0].start_row, ranges[0].end_row), (0, 40));
        assert_eq!(ranges[1].statement_type, StatementType::CashFlow);
        assert_eq!((ranges[1].start_row, ranges[1].end_row), (41, 50));
        assert!(ranges.iter().all(|r| r.confidence_score > 0.0));
    }

    #[test]
    fn test_repeated_type_keeps_first_range() {
        let rows = vec![
            header("Consolidated Statements of Operations"),
            data("Net sales", 10.0, 9.0),
            header("Consolidated Balance Sheets"),
            data("Total assets", 50.0, 40.0),
            header("Consolidated Statements of Operations (Restated)"),
            data("Net sales", 11.0, 9.0),
        ];
        let ranges = extract_boundaries(&rows, &StatementClassifier::default());

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].statement_type, StatementType::Income);
        assert_eq!((ranges[0].start_row, ranges[0].end_row), (0, 1));
        assert_eq!((ranges[1].start_row, ranges[1].end_row), (2, 3));
    }

    #[test]
    fn test_rows_before_first_header_are_outside() {
        let rows = vec![
            data("Stray", 1.0, 2.0),
            header("Consolidated Statements of Cash Flows"),
            data("Net cash provided by operating activities", 5.0, 4.0),
        ];
        let ranges = extract_boundaries(&rows, &StatementClassifier::default());
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start_row, ranges[0].end_row), (1, 2));
        assert!(!ranges[0].contains(0));
    }

    #[test]
    fn test_headers_with_numeric_year_columns() {
        let year_header = |text: &str| vec![Cell::text(text), Cell::Numeric(2024.0), Cell::Numeric(2023.0)];
        let rows = vec![
            year_header("Consolidated Balance Sheets"),
            data("Total assets", 500.0, 450.0),
            data("Total liabilities", 300.0, 280.0),
            vec![Cell::text("Consolidated Statements of Cash Flows"), Cell::text("2024"), Cell::text("2023")],
            data("Net cash provided by operating activities", 90.0, 80.0),
        ];
        let ranges = extract_boundaries(&rows, &StatementClassifier::default());

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].statement_type, StatementType::Balance);
        assert_eq!((ranges[0].start_row, ranges[0].end_row), (0, 2));
        assert_eq!(ranges[1].statement_type, StatementType::CashFlow);
        assert_eq!((ranges[1].start_row, ranges[1].end_row), (3, 4));
    }

    #[test]
    fn test_sub_headings_do_not_end_a_statement() {
        let rows = vec![
            header("Consolidated Statements of Cash Flows"),
            data("Net cash provided by operating activities", 90.0, 80.0),
            vec![Cell::text("Supplemental balance sheet information")],
            data("Cash paid for income taxes", 12.0, 11.0),
            header("Consolidated Balance Sheets"),
            data("Total assets", 500.0, 450.0),
        ];
        let ranges = extract_boundaries(&rows, &StatementClassifier::default());

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].statement_type, StatementType::CashFlow);
        assert_eq!((ranges[0].start_row, ranges[0].end_row), (0, 3));
        assert_eq!((ranges[1].start_row, ranges[1].end_row), (4, 5));
    }

    #[test]
    fn test_no_headers() {
        let rows = vec![data("Revenue", 1.0, 2.0)];
        assert!(extract_boundaries(&rows, &StatementClassifier::default()).is_empty());
        assert!(extract_boundaries(&[], &StatementClassifier::default()).is_empty());
    }
}
