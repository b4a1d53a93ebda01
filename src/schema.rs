use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Absolute tolerance used whenever two reported figures are compared.
pub const VALUE_TOLERANCE: f64 = 1e-9;

pub fn values_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= VALUE_TOLERANCE
}

/// A single cell of a raw grid, as handed over by the workbook reader.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Cell {
    #[default]
    #[schemars(description = "A blank cell (also used for whitespace-only text after reading)")]
    Empty,

    #[schemars(description = "A cell the reader already typed as a number")]
    Numeric(f64),

    #[schemars(
        description = "Any textual cell: labels, headers, or numbers still carrying formatting such as '$(1,234)' or '100{105}'"
    )]
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// True for `Empty` and for text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Numeric(_) => false,
            Cell::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn has_alphabetic(&self) -> bool {
        self.as_text()
            .map(|s| s.chars().any(char::is_alphabetic))
            .unwrap_or(false)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Numeric(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Numeric(v) => write!(f, "{}", format_number(*v)),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Formats a figure without a trailing `.0` for whole numbers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub type Row = Vec<Cell>;
pub type Grid = Vec<Row>;

/// Lowercased, space-joined text of every non-blank cell in a row.
pub fn row_text(row: &[Cell]) -> String {
    row.iter()
        .filter(|c| !c.is_blank())
        .map(|c| c.to_string().trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One worksheet of a filing export.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Sheet {
    #[schemars(description = "Worksheet name as it appears in the workbook (e.g. 'R4', 'Balance Sheet')")]
    pub name: String,

    #[serde(default)]
    #[schemars(
        description = "Descriptive sheet title when the export provides one separately from the name (e.g. 'Consolidated Balance Sheets - USD ($) $ in Millions')"
    )]
    pub title: Option<String>,

    #[schemars(description = "Rows of cells, top to bottom; rows may have different lengths")]
    pub rows: Grid,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Grid) -> Self {
        Self {
            name: name.into(),
            title: None,
            rows,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The text matched against title lexicons: the explicit title when present, else the name.
    pub fn title_text(&self) -> String {
        self.title
            .as_deref()
            .unwrap_or(self.name.as_str())
            .to_lowercase()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum StatementType {
    #[serde(rename = "income_statement")]
    #[schemars(description = "Statement of operations / income / earnings")]
    Income,

    #[serde(rename = "balance_sheet")]
    #[schemars(description = "Balance sheet / statement of financial position")]
    Balance,

    #[serde(rename = "cash_flow")]
    #[schemars(description = "Statement of cash flows")]
    CashFlow,
}

impl StatementType {
    pub const ALL: [StatementType; 3] = [
        StatementType::Income,
        StatementType::Balance,
        StatementType::CashFlow,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            StatementType::Income => "income_statement",
            StatementType::Balance => "balance_sheet",
            StatementType::CashFlow => "cash_flow",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StatementType::Income => "Income Statement",
            StatementType::Balance => "Balance Sheet",
            StatementType::CashFlow => "Cash Flow Statement",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A normalized figure. `base` is the value as first reported; `restatements` holds
/// every later revision for the same period, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValueToken {
    #[schemars(description = "The value as originally reported")]
    pub base: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(description = "Superseding values for the same period, earliest first")]
    pub restatements: Vec<f64>,
}

impl ValueToken {
    pub fn new(value: f64) -> Self {
        Self {
            base: value,
            restatements: Vec::new(),
        }
    }

    /// Builds a token from a full chain; `None` for an empty chain.
    pub fn from_chain(chain: Vec<f64>) -> Option<Self> {
        let mut values = chain.into_iter();
        let base = values.next()?;
        Some(Self {
            base,
            restatements: values.collect(),
        })
    }

    /// The value used for every comparison: the last element of the chain.
    pub fn effective(&self) -> f64 {
        self.restatements.last().copied().unwrap_or(self.base)
    }

    pub fn chain(&self) -> Vec<f64> {
        std::iter::once(self.base)
            .chain(self.restatements.iter().copied())
            .collect()
    }

    pub fn is_restated(&self) -> bool {
        !self.restatements.is_empty()
    }

    pub fn same_effective(&self, other: &ValueToken) -> bool {
        values_equal(self.effective(), other.effective())
    }

    /// Records `newer` as a revision of this figure. Values of `newer`'s chain already in
    /// this chain are skipped, and the result always ends on `newer`'s effective value.
    pub fn restate_with(&mut self, newer: &ValueToken) {
        if self.same_effective(newer) {
            return;
        }
        for value in newer.chain() {
            if !self.chain().into_iter().any(|known| values_equal(known, value)) {
                self.restatements.push(value);
            }
        }
        if !self.same_effective(newer) {
            self.restatements.push(newer.effective());
        }
    }
}

/// A (label, values) pair found in one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricBlock {
    pub label: String,
    pub values: Vec<ValueToken>,
    pub source_row: usize,
    #[schemars(description = "Inclusive [start, end] columns: label column to last value column")]
    pub source_col_range: (usize, usize),
    #[schemars(description = "Column index of each value, parallel to `values`")]
    pub value_cols: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatementRange {
    pub statement_type: StatementType,
    pub start_row: usize,
    #[schemars(description = "Inclusive last row of the statement")]
    pub end_row: usize,
    pub confidence_score: f64,
}

impl StatementRange {
    pub fn row_count(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.start_row..=self.end_row).contains(&row)
    }
}

/// One metric after duplicate occurrences have been folded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MergedMetric {
    #[schemars(description = "First-seen wording of the line item")]
    pub canonical_label: String,
    pub values: Vec<ValueToken>,
    #[schemars(description = "Every other wording that was merged into this metric")]
    pub contributing_labels: BTreeSet<String>,
}

impl MergedMetric {
    pub fn new(label: impl Into<String>, values: Vec<ValueToken>) -> Self {
        Self {
            canonical_label: label.into(),
            values,
            contributing_labels: BTreeSet::new(),
        }
    }

    pub fn from_block(block: &MetricBlock) -> Self {
        Self::new(block.label.clone(), block.values.clone())
    }

    /// Canonical label followed by the contributing labels.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_label.as_str())
            .chain(self.contributing_labels.iter().map(String::as_str))
    }

    pub fn record_label(&mut self, label: &str) {
        if label != self.canonical_label {
            self.contributing_labels.insert(label.to_string());
        }
    }

    pub fn effective_values(&self) -> Vec<f64> {
        self.values.iter().map(ValueToken::effective).collect()
    }
}
