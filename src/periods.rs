use crate::normalizer::normalize_cell;
use crate::schema::Cell;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid year regex"));

static PERIOD_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s*(\d{1,2}),?\s*((?:19|20)\d{2})\b")
        .expect("valid period end regex")
});

static NAME_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])(20\d{2})(?:[^0-9]|$)").expect("valid name year regex"));

static NAME_SHORT_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])([2-9][0-9])(?:[^0-9]|$)").expect("valid short year regex")
});

static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{10})_(\d{2})_(\d{6})").expect("valid accession regex"));

/// The reporting period a filing (and every table extracted from it) belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FilingPeriod {
    #[schemars(description = "Caller-facing label, e.g. 'FY2024' or the source file name")]
    pub label: String,

    pub fiscal_year: i32,

    #[serde(default)]
    #[schemars(description = "Balance sheet date / period end when known")]
    pub period_end: Option<NaiveDate>,
}

impl FilingPeriod {
    pub fn new(label: impl Into<String>, fiscal_year: i32) -> Self {
        Self {
            label: label.into(),
            fiscal_year,
            period_end: None,
        }
    }

    #[must_use]
    pub fn with_period_end(mut self, period_end: NaiveDate) -> Self {
        self.period_end = Some(period_end);
        self
    }

    /// Derives the period from a file or sheet name such as `AAPL_10-K_2024.xlsx`.
    ///
    /// SEC accession-style names (`0000320193_24_000123`) carry the filing year, which
    /// is one year after the fiscal year they report.
    pub fn from_source_name(name: &str) -> Option<Self> {
        if let Some(caps) = ACCESSION_RE.captures(name) {
            let short: i32 = caps[2].parse().ok()?;
            if short >= 20 {
                return Some(Self::new(name, 2000 + short - 1));
            }
        }

        if let Some(caps) = NAME_YEAR_RE.captures(name) {
            return Some(Self::new(name, caps[1].parse().ok()?));
        }

        let caps = NAME_SHORT_YEAR_RE.captures(name)?;
        let short: i32 = caps[1].parse().ok()?;
        (short >= 20).then(|| Self::new(name, 2000 + short))
    }

    /// Derives the period from a column header like `12 Months Ended Dec. 31, 2024`.
    pub fn from_header(label: impl Into<String>, header: &str) -> Option<Self> {
        if let Some(end) = parse_period_end(header) {
            return Some(Self::new(label, end.year()).with_period_end(end));
        }
        detect_year(header).map(|year| Self::new(label, year))
    }

    /// Chronological sort key: the period end, else the last day of the fiscal year.
    pub fn sort_key(&self) -> NaiveDate {
        self.period_end.unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(self.fiscal_year, 12, 31).unwrap_or(NaiveDate::MIN)
        })
    }
}

/// First four-digit year (1900-2099) in header-like text.
pub fn detect_year(text: &str) -> Option<i32> {
    YEAR_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parses dates written the way filings head their columns: `Dec. 31, 2024`,
/// `December 31, 2024`, `Sep 28 2024`.
pub fn parse_period_end(text: &str) -> Option<NaiveDate> {
    let caps = PERIOD_END_RE.captures(text)?;
    let month = match caps[1].to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn numeric_year(value: f64) -> Option<i32> {
    (value.fract() == 0.0 && (1900.0..=2100.0).contains(&value)).then_some(value as i32)
}

/// Years found in one row, by column. Numeric cells only count when every numeric cell
/// in the row looks like a year, so data rows never masquerade as headers.
pub fn row_years(row: &[Cell]) -> Vec<(usize, i32)> {
    let numeric: Vec<(usize, f64)> = row
        .iter()
        .enumerate()
        .filter_map(|(col, cell)| normalize_cell(cell).map(|t| (col, t.effective())))
        .collect();
    let numeric_are_years = numeric.iter().all(|(_, v)| numeric_year(*v).is_some());

    row.iter()
        .enumerate()
        .filter_map(|(col, cell)| match cell {
            Cell::Text(text) if normalize_cell(cell).is_none() => {
                detect_year(text).map(|y| (col, y))
            }
            _ if numeric_are_years => numeric
                .iter()
                .find(|(c, _)| *c == col)
                .and_then(|(_, v)| numeric_year(*v))
                .map(|y| (col, y)),
            _ => None,
        })
        .collect()
}

/// A column-header row such as `["", 2024, 2023]`: it has numeric cells and every one
/// of them is a year.
pub fn is_year_header_row(row: &[Cell]) -> bool {
    let mut numeric = row
        .iter()
        .filter_map(|cell| normalize_cell(cell).map(|t| t.effective()))
        .peekable();
    numeric.peek().is_some() && numeric.all(|v| numeric_year(v).is_some())
}

/// First year detected in each column within the first `scan_rows` rows.
pub fn column_years(rows: &[Vec<Cell>], scan_rows: usize) -> BTreeMap<usize, i32> {
    let mut years = BTreeMap::new();
    for row in rows.iter().take(scan_rows) {
        for (col, year) in row_years(row) {
            years.entry(col).or_insert(year);
        }
    }
    years
}

/// Distinct years mentioned in a statement's header area, newest first.
pub fn statement_years(rows: &[Vec<Cell>], scan_rows: usize) -> Vec<i32> {
    let years: BTreeSet<i32> = rows
        .iter()
        .take(scan_rows)
        .flat_map(|row| row_years(row).into_iter().map(|(_, y)| y))
        .collect();
    years.into_iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_year() {
        assert_eq!(detect_year("Dec. 31, 2024"), Some(2024));
        assert_eq!(detect_year("Fiscal Year 2023"), Some(2023));
        assert_eq!(detect_year("12 Months Ended Sep. 28, 2019"), Some(2019));
        assert_eq!(detect_year("Total 12024"), None);
        assert_eq!(detect_year("Revenue"), None);
    }

    #[test]
    fn test_parse_period_end() {
        assert_eq!(
            parse_period_end("Dec. 31, 2024"),
            NaiveDate::from_ymd_opt(2024, 12, 31)
        );
        assert_eq!(
            parse_period_end("12 Months Ended September 28, 2024"),
            NaiveDate::from_ymd_opt(2024, 9, 28)
        );
        assert_eq!(parse_period_end("Feb. 30, 2024"), None);
        assert_eq!(parse_period_end("2024"), None);
    }

    #[test]
    fn test_from_source_name() {
        assert_eq!(
            FilingPeriod::from_source_name("AAPL_10-K_2024.xlsx").map(|p| p.fiscal_year),
            Some(2024)
        );
        assert_eq!(
            FilingPeriod::from_source_name("0000320193_24_000123.xlsx").map(|p| p.fiscal_year),
            Some(2023)
        );
        assert_eq!(
            FilingPeriod::from_source_name("report_fy23.xlsx").map(|p| p.fiscal_year),
            Some(2023)
        );
        assert_eq!(FilingPeriod::from_source_name("report.xlsx"), None);
    }

    #[test]
    fn test_sort_key_prefers_period_end() {
        let plain = FilingPeriod::new("FY2023", 2023);
        assert_eq!(plain.sort_key(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        let dated = FilingPeriod::from_header("FY2024", "Sep. 28, 2024").unwrap();
        assert_eq!(dated.fiscal_year, 2024);
        assert!(dated.sort_key() > plain.sort_key());
    }

    #[test]
    fn test_row_years_ignores_data_rows() {
        let header = vec![Cell::Empty, Cell::Numeric(2024.0), Cell::Numeric(2023.0)];
        assert_eq!(row_years(&header), vec![(1, 2024), (2, 2023)]);

        let data = vec![
            Cell::text("Revenue"),
            Cell::Numeric(2000.0),
            Cell::Numeric(1234.5),
        ];
        assert!(row_years(&data).is_empty());

        let dated = vec![Cell::text("USD ($)"), Cell::text("Dec. 31, 2024")];
        assert_eq!(row_years(&dated), vec![(1, 2024)]);
    }

    #[test]
    fn test_year_header_rows() {
        assert!(is_year_header_row(&[Cell::Empty, Cell::text("2024"), Cell::Numeric(2023.0)]));
        assert!(!is_year_header_row(&[Cell::text("Revenue"), Cell::Numeric(2024.0), Cell::Numeric(120.0)]));
        assert!(!is_year_header_row(&[Cell::text("Dec. 31, 2024")]));
    }

    #[test]
    fn test_column_and_statement_years() {
        let rows = vec![
            vec![Cell::text("Balance Sheets"), Cell::text("Dec. 31, 2024"), Cell::text("Dec. 31, 2023")],
            vec![Cell::text("Cash"), Cell::Numeric(10.0), Cell::Numeric(9.0)],
        ];
        let by_col = column_years(&rows, 15);
        assert_eq!(by_col.get(&1), Some(&2024));
        assert_eq!(by_col.get(&2), Some(&2023));
        assert_eq!(statement_years(&rows, 15), vec![2024, 2023]);
    }
}
