//! Sheet-level statement classification.
//!
//! A sheet is scored against three lexicons (one per statement type) plus its title,
//! with small structural bonuses for the shape a primary statement usually has. The
//! title is trusted first; body scores decide only when the title is inconclusive.

use crate::config::ClassifierConfig;
use crate::normalizer::is_numeric;
use crate::periods::{column_years, is_year_header_row};
use crate::schema::{row_text, Cell, Sheet, StatementType};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const INCOME_TERMS: &[&str] = &[
    "revenue",
    "net sales",
    "total revenue",
    "gross revenue",
    "sales revenue",
    "service revenue",
    "product revenue",
    "net revenue",
    "total net sales",
    "gross profit",
    "gross income",
    "operating income",
    "operating profit",
    "net income",
    "net earnings",
    "earnings",
    "profit",
    "loss",
    "net loss",
    "income from operations",
    "operating earnings",
    "cost of revenue",
    "cost of sales",
    "cost of goods sold",
    "cogs",
    "gross margin",
    "operating expenses",
    "operating costs",
    "selling general administrative",
    "selling, general and administrative",
    "sg&a",
    "research and development",
    "interest expense",
    "interest income",
    "income before taxes",
    "income before provision for income taxes",
    "pretax income",
    "provision for income taxes",
    "income tax expense",
    "income tax benefit",
    "earnings per share",
    "basic earnings per share",
    "diluted earnings per share",
    "other income",
    "other expense",
    "non-operating income",
    "impairment",
    "restructuring",
];

const BALANCE_TERMS: &[&str] = &[
    "total assets",
    "current assets",
    "non-current assets",
    "long-term assets",
    "intangible assets",
    "goodwill",
    "other assets",
    "other current assets",
    "cash and cash equivalents",
    "marketable securities",
    "accounts receivable",
    "receivables",
    "inventory",
    "inventories",
    "prepaid expenses",
    "deferred tax assets",
    "short-term investments",
    "long-term investments",
    "property and equipment",
    "property, plant and equipment",
    "accumulated depreciation",
    "total liabilities",
    "current liabilities",
    "non-current liabilities",
    "long-term liabilities",
    "accounts payable",
    "accrued expenses",
    "accrued liabilities",
    "deferred revenue",
    "unearned revenue",
    "deferred tax liabilities",
    "notes payable",
    "lease liabilities",
    "short-term debt",
    "long-term debt",
    "current portion of long-term debt",
    "income taxes payable",
    "other current liabilities",
    "other long-term liabilities",
    "commercial paper",
    "stockholders' equity",
    "shareholders' equity",
    "stockholders equity",
    "shareholders equity",
    "total equity",
    "retained earnings",
    "accumulated deficit",
    "common stock",
    "preferred stock",
    "treasury stock",
    "additional paid-in capital",
    "accumulated other comprehensive",
    "total liabilities and",
    "statement of financial position",
];

const CASH_FLOW_TERMS: &[&str] = &[
    "cash flows from operating activities",
    "operating activities",
    "net cash provided by operating activities",
    "net cash used in operating activities",
    "cash generated by operating activities",
    "cash from operations",
    "operating cash flow",
    "cash flows from investing activities",
    "investing activities",
    "net cash provided by investing activities",
    "net cash used in investing activities",
    "cash flows from financing activities",
    "financing activities",
    "net cash provided by financing activities",
    "net cash used in financing activities",
    "net increase in cash",
    "net decrease in cash",
    "net change in cash",
    "cash and cash equivalents at beginning",
    "cash and cash equivalents at end",
    "beginning balances",
    "ending balances",
    "depreciation and amortization",
    "stock-based compensation",
    "share-based compensation",
    "deferred income taxes",
    "changes in operating assets and liabilities",
    "changes in working capital",
    "purchases of property",
    "payments for acquisition of property",
    "capital expenditures",
    "proceeds from issuance",
    "repayments of",
    "dividends paid",
    "payments for dividends",
    "repurchases of common stock",
    "purchases of marketable securities",
    "proceeds from sales of marketable securities",
    "proceeds from maturities",
    "acquisitions",
    "supplemental cash flow",
    "cash paid for income taxes",
    "cash paid for interest",
];

const INCOME_TITLE_TERMS: &[&str] = &[
    "income",
    "operations",
    "earnings",
    "profit",
    "inco",
    "p&l",
    "pnl",
    "statement of operations",
    "statements of operations",
    "statement of earnings",
    "statements of earnings",
    "statement of income",
    "statements of income",
];

const BALANCE_TITLE_TERMS: &[&str] = &[
    "balance",
    "financial position",
    "financial condition",
    "assets",
    "liabilities",
    "equity",
    "statement of financial position",
    "statement of financial condition",
    "balance sheet",
];

const CASH_FLOW_TITLE_TERMS: &[&str] = &[
    "cash",
    "flow",
    "flows",
    "statement of cash flows",
    "statements of cash flows",
    "cash flow statement",
    "cash flows statement",
];

const CASH_FLOW_EXACT_TITLES: &[&str] =
    &["consolidated statements of cash", "consolidated statement of cash"];

const BALANCE_EXACT_TITLES: &[&str] = &[
    "consolidated balance sheet",
    "consolidated statement of financial position",
    "consolidated statements of financial position",
];

const INCOME_EXACT_TITLES: &[&str] = &[
    "consolidated statements of operations",
    "consolidated statement of operations",
    "consolidated statements of income",
    "consolidated statement of income",
    "consolidated statements of earnings",
    "consolidated statement of earnings",
];

/// Titles that open a statement inside a sheet, in detection order. They are matched at
/// the start of the row's title cell once qualifiers such as "consolidated" are removed,
/// so sub-headings like "Supplemental balance sheet information" do not qualify.
const HEADER_PHRASES: &[(StatementType, &[&str])] = &[
    (
        StatementType::CashFlow,
        &[
            "statements of cash",
            "statement of cash",
            "cash flow statement",
            "cash flows statement",
        ],
    ),
    (
        StatementType::Balance,
        &[
            "balance sheet",
            "statement of financial position",
            "statements of financial position",
            "statement of financial condition",
            "statements of financial condition",
        ],
    ),
    (
        StatementType::Income,
        &[
            "statements of operations",
            "statement of operations",
            "statements of inco",
            "statement of inco",
            "statements of earnings",
            "statement of earnings",
            "income statement",
            "profit and loss",
            "statement of profit and loss",
        ],
    ),
];

static TITLE_QUALIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:condensed|consolidated|combined|interim|unaudited)\s+)+")
        .expect("valid title qualifier regex")
});

fn body_terms(statement_type: StatementType) -> &'static [&'static str] {
    match statement_type {
        StatementType::Income => INCOME_TERMS,
        StatementType::Balance => BALANCE_TERMS,
        StatementType::CashFlow => CASH_FLOW_TERMS,
    }
}

fn title_terms(statement_type: StatementType) -> &'static [&'static str] {
    match statement_type {
        StatementType::Income => INCOME_TITLE_TERMS,
        StatementType::Balance => BALANCE_TITLE_TERMS,
        StatementType::CashFlow => CASH_FLOW_TITLE_TERMS,
    }
}

/// The row's first cell with letters, lowercased, without leading qualifiers.
fn title_cell_text(row: &[Cell]) -> Option<String> {
    let cell = row.iter().find(|cell| cell.has_alphabetic())?;
    let text = cell
        .to_string()
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    Some(TITLE_QUALIFIER_RE.replace(&text, "").into_owned())
}

/// Which statement a row announces, if it is a header row: its title cell opens with a
/// statement title, and any numeric cells are column years (`2024`, `2023`).
pub fn detect_header_type(row: &[Cell]) -> Option<StatementType> {
    if row.iter().any(is_numeric) && !is_year_header_row(row) {
        return None;
    }
    let title = title_cell_text(row)?;
    HEADER_PHRASES
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| title.starts_with(p)))
        .map(|(statement_type, _)| *statement_type)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementScores {
    pub income: f64,
    pub balance: f64,
    pub cash_flow: f64,
}

impl StatementScores {
    pub fn get(&self, statement_type: StatementType) -> f64 {
        match statement_type {
            StatementType::Income => self.income,
            StatementType::Balance => self.balance,
            StatementType::CashFlow => self.cash_flow,
        }
    }

    fn add(&mut self, statement_type: StatementType, points: f64) {
        match statement_type {
            StatementType::Income => self.income += points,
            StatementType::Balance => self.balance += points,
            StatementType::CashFlow => self.cash_flow += points,
        }
    }

    pub fn max(&self) -> f64 {
        self.income.max(self.balance).max(self.cash_flow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationBasis {
    /// A canonical statement title appeared in the sheet title.
    ExactTitle,
    /// A title keyword combined with a strong enough score.
    PartialTitle,
    /// Highest score above the type's threshold.
    Score,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub statement_type: Option<StatementType>,
    pub scores: StatementScores,
    pub basis: ClassificationBasis,
}

pub struct StatementClassifier {
    config: ClassifierConfig,
}

impl Default for StatementClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl StatementClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn threshold(&self, statement_type: StatementType) -> f64 {
        match statement_type {
            StatementType::Income => self.config.income_threshold,
            StatementType::Balance => self.config.balance_threshold,
            StatementType::CashFlow => self.config.cash_flow_threshold,
        }
    }

    /// Number of distinct lexicon phrases contained in `text`.
    pub fn body_score(&self, statement_type: StatementType, text: &str) -> f64 {
        body_terms(statement_type)
            .iter()
            .filter(|term| text.contains(*term))
            .count() as f64
    }

    pub fn title_score(&self, statement_type: StatementType, title: &str) -> f64 {
        title_terms(statement_type)
            .iter()
            .filter(|term| title.contains(*term))
            .map(|term| {
                if term.len() > self.config.specific_title_min_len {
                    self.config.specific_title_weight
                } else {
                    self.config.title_weight
                }
            })
            .sum()
    }

    /// Bonus shared by all three scores: year-headed columns, numeric-dominant columns,
    /// and a row count typical of a primary statement.
    pub fn structural_bonus(&self, rows: &[Vec<Cell>]) -> f64 {
        let mut bonus = 0.0;

        if column_years(rows, self.config.header_scan_rows).len() >= self.config.min_year_columns {
            bonus += self.config.structural_bonus;
        }

        if self.numeric_columns(rows) >= self.config.min_numeric_columns {
            bonus += self.config.structural_bonus;
        }

        if (self.config.min_rows..=self.config.max_rows).contains(&rows.len()) {
            bonus += self.config.structural_bonus;
        }

        bonus
    }

    fn numeric_columns(&self, rows: &[Vec<Cell>]) -> usize {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..width)
            .filter(|&col| {
                let (filled, numeric) = rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .filter(|cell| !cell.is_blank())
                    .fold((0usize, 0usize), |(filled, numeric), cell| {
                        (filled + 1, numeric + usize::from(is_numeric(cell)))
                    });
                filled > 0 && numeric as f64 / filled as f64 > self.config.numeric_dominance
            })
            .count()
    }

    /// Body and structural score of a row range for one type, without any title.
    pub fn score_rows(&self, statement_type: StatementType, rows: &[Vec<Cell>]) -> f64 {
        let text = sheet_text(rows);
        self.body_score(statement_type, &text) + self.structural_bonus(rows)
    }

    pub fn scores(&self, sheet: &Sheet) -> StatementScores {
        let text = sheet_text(&sheet.rows);
        let title = sheet.title_text();
        let bonus = self.structural_bonus(&sheet.rows);

        let mut scores = StatementScores::default();
        for statement_type in StatementType::ALL {
            scores.add(
                statement_type,
                self.body_score(statement_type, &text)
                    + self.title_score(statement_type, &title)
                    + bonus,
            );
        }
        scores
    }

    pub fn classify_sheet(&self, sheet: &Sheet) -> Classification {
        let scores = self.scores(sheet);
        let title = sheet.title_text();
        debug!(
            "Sheet '{}': income={} balance={} cash_flow={}",
            sheet.name, scores.income, scores.balance, scores.cash_flow
        );

        let decided = |statement_type, basis| Classification {
            statement_type: Some(statement_type),
            scores,
            basis,
        };

        let exact = [
            (StatementType::CashFlow, CASH_FLOW_EXACT_TITLES),
            (StatementType::Balance, BALANCE_EXACT_TITLES),
            (StatementType::Income, INCOME_EXACT_TITLES),
        ];
        for (statement_type, phrases) in exact {
            if phrases.iter().any(|p| title.contains(p)) {
                return decided(statement_type, ClassificationBasis::ExactTitle);
            }
        }

        if title.contains("cash")
            && title.contains("flow")
            && scores.cash_flow >= self.config.partial_title_cash_flow
        {
            return decided(StatementType::CashFlow, ClassificationBasis::PartialTitle);
        }
        if title.contains("balance") && scores.balance >= self.config.partial_title_balance {
            return decided(StatementType::Balance, ClassificationBasis::PartialTitle);
        }
        if ["income", "operations", "earnings"]
            .iter()
            .any(|k| title.contains(k))
            && scores.income >= self.config.partial_title_income
        {
            return decided(StatementType::Income, ClassificationBasis::PartialTitle);
        }

        let best = scores.max();
        let by_score = StatementType::ALL.into_iter().find(|t| {
            let score = scores.get(*t);
            score == best && score >= self.threshold(*t)
        });

        match by_score {
            Some(statement_type) => decided(statement_type, ClassificationBasis::Score),
            None => Classification {
                statement_type: None,
                scores,
                basis: ClassificationBasis::Unrecognized,
            },
        }
    }
}

fn sheet_text(rows: &[Vec<Cell>]) -> String {
    rows.iter()
        .map(|row| row_text(row))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classifies a sheet with the default weights and thresholds.
pub fn classify(sheet: &Sheet) -> Option<StatementType> {
    StatementClassifier::default()
        .classify_sheet(sheet)
        .statement_type
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::from(*c)).collect()
    }

    fn cash_flow_body() -> Vec<Vec<Cell>> {
        vec![
            row(&["", "2024", "2023"]),
            row(&["Operating activities:", "", ""]),
            row(&["Net income", "93,736", "96,995"]),
            row(&["Net cash provided by operating activities", "118,254", "110,543"]),
            row(&["Investing activities:", "", ""]),
            row(&["Financing activities:", "", ""]),
        ]
    }

    #[test]
    fn test_exact_title_wins_regardless_of_structure() {
        let sheet = Sheet::new("R7", vec![row(&["Operating activities"]), row(&["Financing activities"])])
            .with_title("Consolidated Statements of Cash Flows");
        let classification = StatementClassifier::default().classify_sheet(&sheet);
        assert_eq!(classification.statement_type, Some(StatementType::CashFlow));
        assert_eq!(classification.basis, ClassificationBasis::ExactTitle);
    }

    #[test]
    fn test_cash_flow_exact_title_precedes_balance() {
        let sheet = Sheet::new("Consolidated Statements of Cash Flows (Balance)", vec![]);
        assert_eq!(classify(&sheet), Some(StatementType::CashFlow));
    }

    #[test]
    fn test_partial_title_rule() {
        let sheet = Sheet::new("Cash Flow", cash_flow_body());
        let classification = StatementClassifier::default().classify_sheet(&sheet);
        assert_eq!(classification.statement_type, Some(StatementType::CashFlow));
        assert_eq!(classification.basis, ClassificationBasis::PartialTitle);
    }

    #[test]
    fn test_body_score_without_title() {
        let sheet = Sheet::new("R9", cash_flow_body());
        let classification = StatementClassifier::default().classify_sheet(&sheet);
        assert_eq!(classification.statement_type, Some(StatementType::CashFlow));
        assert_eq!(classification.basis, ClassificationBasis::Score);
        assert!(classification.scores.cash_flow > classification.scores.balance);
    }

    #[test]
    fn test_unrecognized_sheet() {
        let sheet = Sheet::new(
            "Cover",
            vec![row(&["Document type", "10-K"]), row(&["Entity name", "Example Corp"])],
        );
        let classification = StatementClassifier::default().classify_sheet(&sheet);
        assert_eq!(classification.statement_type, None);
        assert_eq!(classification.basis, ClassificationBasis::Unrecognized);
    }

    #[test]
    fn test_structural_bonus() {
        let classifier = StatementClassifier::default();
        let mut rows = cash_flow_body();
        assert_eq!(classifier.structural_bonus(&rows), 3.0);

        rows.truncate(2);
        // Too few rows, and only the year header row is numeric.
        assert_eq!(classifier.structural_bonus(&rows), 2.0);
    }

    #[test]
    fn test_title_weights() {
        let classifier = StatementClassifier::default();
        // "cash", "flow", "flows" at 8 each plus "statement of cash flows" at 10.
        assert_eq!(
            classifier.title_score(StatementType::CashFlow, "statement of cash flows"),
            34.0
        );
        assert_eq!(classifier.title_score(StatementType::Balance, "r2"), 0.0);
    }

    #[test]
    fn test_detect_header_type() {
        assert_eq!(
            detect_header_type(&row(&["CONSOLIDATED BALANCE SHEETS - USD ($)", "Sep. 28, 2024"])),
            Some(StatementType::Balance)
        );
        assert_eq!(
            detect_header_type(&row(&["Consolidated Statements of Cash Flows"])),
            Some(StatementType::CashFlow)
        );
        assert_eq!(
            detect_header_type(&row(&["CONSOLIDATED STATEMENTS OF INCO"])),
            Some(StatementType::Income)
        );
        assert_eq!(
            detect_header_type(&row(&["Balance sheet total", "1,000"])),
            None
        );
        assert_eq!(detect_header_type(&row(&["Net sales"])), None);
    }

    #[test]
    fn test_header_rows_may_carry_column_years() {
        let numeric_years = vec![
            Cell::text("Consolidated Statements of Cash Flows"),
            Cell::Numeric(2024.0),
            Cell::Numeric(2023.0),
        ];
        assert_eq!(detect_header_type(&numeric_years), Some(StatementType::CashFlow));
        assert_eq!(
            detect_header_type(&row(&["Consolidated Balance Sheets", "2024", "2023"])),
            Some(StatementType::Balance)
        );
        assert_eq!(
            detect_header_type(&row(&["Consolidated Balance Sheets", "2024", "512"])),
            None
        );
    }

    #[test]
    fn test_header_phrase_must_open_the_title() {
        assert_eq!(
            detect_header_type(&row(&["Condensed Consolidated Statements of Income (Unaudited)"])),
            Some(StatementType::Income)
        );
        assert_eq!(
            detect_header_type(&row(&["", "Statement of Financial Position"])),
            Some(StatementType::Balance)
        );
        assert_eq!(
            detect_header_type(&row(&["Supplemental balance sheet information"])),
            None
        );
        assert_eq!(
            detect_header_type(&row(&["Reconciliation to the income statement"])),
            None
        );
    }
}
