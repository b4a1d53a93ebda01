//! Per-filing extraction and cross-filing consolidation.
//!
//! [`FilingProcessor::process_filing`] turns the sheets of one filing into at most one
//! table per statement type and records what happened to every sheet.
//! [`FilingProcessor::consolidate`] then merges those tables across filings.

use crate::boundaries::extract_boundaries;
use crate::classifier::StatementClassifier;
use crate::cleanup::apply_cleanup;
use crate::config::EngineConfig;
use crate::consolidator::{ConsolidatedStatement, MetricConsolidator, PeriodTable};
use crate::dedup::RowDeduplicator;
use crate::detector::detect_blocks;
use crate::error::Result;
use crate::matching::{SimilarityContext, SimilarityOracle};
use crate::periods::{column_years, is_year_header_row, statement_years, FilingPeriod};
use crate::schema::{MergedMetric, MetricBlock, Row, Sheet, StatementRange, StatementType};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// All sheets exported for one filing, e.g. one 10-K workbook.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Filing {
    pub period: FilingPeriod,
    pub sheets: Vec<Sheet>,
}

impl Filing {
    pub fn new(period: FilingPeriod, sheets: Vec<Sheet>) -> Self {
        Self { period, sheets }
    }

    /// Builds a filing whose period is inferred from the workbook name.
    pub fn from_source_name(name: &str, sheets: Vec<Sheet>) -> Option<Self> {
        FilingPeriod::from_source_name(name).map(|period| Self::new(period, sheets))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementRow {
    /// A metric extracted from the row; rows with repeated blocks yield several.
    Metric {
        source_row: usize,
        metric: MergedMetric,
    },
    /// A row with no (label, values) block, kept as is: section headings, notes.
    Context { source_row: usize, cells: Row },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatementTable {
    pub statement_type: StatementType,
    pub source_sheet: String,
    pub range: StatementRange,

    #[schemars(description = "Years found in the statement's header rows, newest first")]
    pub years: Vec<i32>,

    pub rows: Vec<StatementRow>,
}

impl StatementTable {
    pub fn metrics(&self) -> impl Iterator<Item = &MergedMetric> {
        self.rows.iter().filter_map(|row| match row {
            StatementRow::Metric { metric, .. } => Some(metric),
            StatementRow::Context { .. } => None,
        })
    }

    pub fn to_period_table(&self, period: &FilingPeriod) -> PeriodTable {
        PeriodTable::new(period.clone(), self.metrics().cloned().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SheetOutcome {
    Extracted(StatementType),
    /// The type was already taken by an earlier sheet of the same filing.
    DuplicateStatement(StatementType),
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportEntry {
    pub sheet: String,
    pub outcome: SheetOutcome,
    pub message: String,
}

/// A statement type no processed sheet provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatementGap {
    pub statement_type: StatementType,
}

impl fmt::Display for StatementGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: not found", self.statement_type)
    }
}

fn gaps_for(present: impl Fn(StatementType) -> bool) -> Vec<StatementGap> {
    StatementType::ALL
        .into_iter()
        .filter(|t| !present(*t))
        .map(|statement_type| StatementGap { statement_type })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilingReport {
    pub period: FilingPeriod,
    pub statements: BTreeMap<StatementType, StatementTable>,
    pub entries: Vec<ReportEntry>,
}

impl FilingReport {
    pub fn statement(&self, statement_type: StatementType) -> Option<&StatementTable> {
        self.statements.get(&statement_type)
    }

    pub fn gaps(&self) -> Vec<StatementGap> {
        gaps_for(|t| self.statements.contains_key(&t))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedFiling {
    pub statements: BTreeMap<StatementType, ConsolidatedStatement>,
    pub gaps: Vec<StatementGap>,
}

impl ConsolidatedFiling {
    pub fn statement(&self, statement_type: StatementType) -> Option<&ConsolidatedStatement> {
        self.statements.get(&statement_type)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ConsolidatedFiling)
    }

    pub fn schema_as_json() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::generate_json_schema())?)
    }
}

/// Reverses a block whose value columns are headed by strictly descending years.
fn orient_oldest_first(block: &mut MetricBlock, years: &BTreeMap<usize, i32>) {
    let block_years: Option<Vec<i32>> = block
        .value_cols
        .iter()
        .map(|col| years.get(col).copied())
        .collect();
    let Some(block_years) = block_years else {
        return;
    };
    if block_years.len() >= 2 && block_years.windows(2).all(|w| w[0] > w[1]) {
        block.values.reverse();
        block.value_cols.reverse();
    }
}

pub struct FilingProcessor {
    config: EngineConfig,
    classifier: StatementClassifier,
    oracle: Option<Box<dyn SimilarityOracle>>,
}

impl FilingProcessor {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: StatementClassifier::new(&config.classifier),
            config,
            oracle: None,
        })
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: Box<dyn SimilarityOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Statement sections of one sheet. A sheet with headers of two or more types is
    /// split at its headers; otherwise the classifier decides for the whole sheet, and a
    /// lone header range is used when the classifier cannot.
    pub fn locate_statements(&self, sheet: &Sheet) -> Vec<StatementRange> {
        if sheet.rows.is_empty() {
            return Vec::new();
        }

        let ranges = extract_boundaries(&sheet.rows, &self.classifier);
        if ranges.len() >= 2 {
            debug!("Sheet '{}' holds {} statements", sheet.name, ranges.len());
            return ranges;
        }

        let classification = self.classifier.classify_sheet(sheet);
        if let Some(statement_type) = classification.statement_type {
            return vec![StatementRange {
                statement_type,
                start_row: 0,
                end_row: sheet.rows.len() - 1,
                confidence_score: classification.scores.get(statement_type),
            }];
        }

        ranges
    }

    /// Cleans one statement range and turns each row into metrics or a context row.
    pub fn extract_table(&self, sheet: &Sheet, range: &StatementRange) -> StatementTable {
        let slice = sheet
            .rows
            .get(range.start_row..=range.end_row)
            .unwrap_or_default();
        let cleaned = apply_cleanup(slice, &self.config.cleanup);
        let scan_rows = self.config.classifier.header_scan_rows;
        let years_by_column = column_years(&cleaned.rows, scan_rows);

        let deduplicator = RowDeduplicator::new(&self.config.matching, &self.config.alignment)
            .with_oracle(self.oracle.as_deref())
            .with_context(SimilarityContext::for_statement(range.statement_type));

        let mut rows = Vec::new();
        for (position, (offset, row)) in cleaned.iter().enumerate() {
            let source_row = range.start_row + offset;
            let mut blocks = if position < scan_rows && is_year_header_row(row) {
                Vec::new()
            } else {
                detect_blocks(row, source_row)
            };

            if blocks.is_empty() {
                rows.push(StatementRow::Context {
                    source_row,
                    cells: row.clone(),
                });
                continue;
            }

            if self.config.alignment.orient_oldest_first {
                for block in &mut blocks {
                    orient_oldest_first(block, &years_by_column);
                }
            }

            rows.extend(
                deduplicator
                    .deduplicate(&blocks)
                    .into_iter()
                    .map(|metric| StatementRow::Metric { source_row, metric }),
            );
        }

        StatementTable {
            statement_type: range.statement_type,
            source_sheet: sheet.name.clone(),
            range: range.clone(),
            years: statement_years(&cleaned.rows, scan_rows),
            rows,
        }
    }

    pub fn process_filing(&self, filing: &Filing) -> FilingReport {
        info!(
            "Processing filing '{}' ({} sheets)",
            filing.period.label,
            filing.sheets.len()
        );

        let mut statements: BTreeMap<StatementType, StatementTable> = BTreeMap::new();
        let mut entries = Vec::new();

        for sheet in &filing.sheets {
            let ranges = self.locate_statements(sheet);
            if ranges.is_empty() {
                debug!("Sheet '{}': no statement recognized", sheet.name);
                entries.push(ReportEntry {
                    sheet: sheet.name.clone(),
                    outcome: SheetOutcome::Unrecognized,
                    message: "no statement recognized".to_string(),
                });
                continue;
            }

            for range in ranges {
                let statement_type = range.statement_type;
                if let Some(existing) = statements.get(&statement_type) {
                    let message = format!(
                        "{} already extracted from sheet '{}'",
                        statement_type, existing.source_sheet
                    );
                    debug!("Sheet '{}': {}", sheet.name, message);
                    entries.push(ReportEntry {
                        sheet: sheet.name.clone(),
                        outcome: SheetOutcome::DuplicateStatement(statement_type),
                        message,
                    });
                    continue;
                }

                let table = self.extract_table(sheet, &range);
                let message = format!(
                    "{} rows {}..={} ({} metrics)",
                    statement_type,
                    range.start_row,
                    range.end_row,
                    table.metrics().count()
                );
                info!("Sheet '{}': {}", sheet.name, message);
                entries.push(ReportEntry {
                    sheet: sheet.name.clone(),
                    outcome: SheetOutcome::Extracted(statement_type),
                    message,
                });
                statements.insert(statement_type, table);
            }
        }

        let report = FilingReport {
            period: filing.period.clone(),
            statements,
            entries,
        };
        for gap in report.gaps() {
            warn!("Filing '{}': {}", report.period.label, gap);
        }
        report
    }

    /// Consolidates each statement type across `reports`, given in caller order
    /// (usually newest filing first).
    pub fn consolidate(&self, reports: &[FilingReport]) -> ConsolidatedFiling {
        let consolidator = MetricConsolidator::from_config(&self.config)
            .with_oracle(self.oracle.as_deref());

        let mut statements = BTreeMap::new();
        for statement_type in StatementType::ALL {
            let tables: Vec<PeriodTable> = reports
                .iter()
                .filter_map(|report| {
                    report
                        .statement(statement_type)
                        .map(|table| table.to_period_table(&report.period))
                })
                .collect();

            if !tables.is_empty() {
                statements.insert(
                    statement_type,
                    consolidator.consolidate(statement_type, &tables),
                );
            }
        }

        let gaps = gaps_for(|t| statements.contains_key(&t));
        for gap in &gaps {
            warn!("Consolidation: {}", gap);
        }

        ConsolidatedFiling { statements, gaps }
    }

    pub fn process_filings(&self, filings: &[Filing]) -> ConsolidatedFiling {
        let reports: Vec<FilingReport> = filings.iter().map(|f| self.process_filing(f)).collect();
        self.consolidate(&reports)
    }
}

/// Processes and consolidates `filings` (newest first) with lexical matching only.
pub fn process_filings(filings: &[Filing], config: EngineConfig) -> Result<ConsolidatedFiling> {
    Ok(FilingProcessor::new(config)?.process_filings(filings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cell;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| Cell::from(*c)).collect()
    }

    fn income_sheet(name: &str, newer: &str, older: &str, revenue: [&str; 2]) -> Sheet {
        Sheet::new(
            name,
            vec![
                row(&["Consolidated Statements of Operations - USD ($)", newer, older]),
                row(&["Net sales", revenue[0], revenue[1]]),
                row(&["Cost of sales", "(60)", "(55)"]),
                row(&["Operating expenses:", "", ""]),
                row(&["Net income", "25", "20"]),
            ],
        )
    }

    fn processor() -> FilingProcessor {
        FilingProcessor::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_extracts_metrics_and_context_rows() {
        let filing = Filing::new(
            FilingPeriod::new("FY2024", 2024),
            vec![income_sheet("R4", "Dec. 31, 2024", "Dec. 31, 2023", ["120", "110"])],
        );
        let report = processor().process_filing(&filing);

        let table = report.statement(StatementType::Income).unwrap();
        assert_eq!(table.source_sheet, "R4");
        assert_eq!(table.years, vec![2024, 2023]);

        let metrics: Vec<&MergedMetric> = table.metrics().collect();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].canonical_label, "Net sales");
        // Columns run newest to oldest, values come out oldest first.
        assert_eq!(metrics[0].effective_values(), vec![110.0, 120.0]);
        assert_eq!(metrics[1].effective_values(), vec![-55.0, -60.0]);

        assert!(table.rows.iter().any(|r| matches!(
            r,
            StatementRow::Context { source_row: 3, .. }
        )));
        assert!(table.rows.iter().any(|r| matches!(
            r,
            StatementRow::Context { source_row: 0, .. }
        )));
    }

    #[test]
    fn test_gaps_and_unrecognized_sheets() {
        let cover = Sheet::new("Cover", vec![row(&["Document type", "10-K"])]);
        let filing = Filing::new(
            FilingPeriod::new("FY2024", 2024),
            vec![
                cover,
                income_sheet("R4", "Dec. 31, 2024", "Dec. 31, 2023", ["120", "110"]),
                income_sheet("R5", "Dec. 31, 2024", "Dec. 31, 2023", ["120", "110"]),
            ],
        );
        let report = processor().process_filing(&filing);

        assert_eq!(report.entries[0].outcome, SheetOutcome::Unrecognized);
        assert_eq!(report.entries[0].message, "no statement recognized");
        assert_eq!(
            report.entries[2].outcome,
            SheetOutcome::DuplicateStatement(StatementType::Income)
        );

        let gaps: Vec<String> = report.gaps().iter().map(ToString::to_string).collect();
        assert_eq!(gaps, vec!["balance_sheet: not found", "cash_flow: not found"]);
    }

    #[test]
    fn test_consolidates_across_filings() {
        let newer = Filing::new(
            FilingPeriod::new("FY2024", 2024),
            vec![income_sheet("R4", "Dec. 31, 2024", "Dec. 31, 2023", ["120", "110"])],
        );
        let older = Filing::new(
            FilingPeriod::new("FY2023", 2023),
            vec![income_sheet("R4", "Dec. 31, 2023", "Dec. 31, 2022", ["110", "100"])],
        );

        let consolidated = process_filings(&[newer, older], EngineConfig::default()).unwrap();
        let income = consolidated.statement(StatementType::Income).unwrap();
        let sales = income.metric("Net sales").unwrap();
        assert_eq!(sales.metric.effective_values(), vec![100.0, 110.0, 120.0]);
        assert_eq!(sales.periods, vec!["FY2023", "FY2024"]);
        assert_eq!(consolidated.gaps.len(), 2);
    }

    #[test]
    fn test_orientation_requires_descending_years() {
        let mut years = BTreeMap::new();
        years.insert(1, 2023);
        years.insert(2, 2024);
        let mut block = MetricBlock {
            label: "Revenue".to_string(),
            values: vec![
                crate::schema::ValueToken::new(1.0),
                crate::schema::ValueToken::new(2.0),
            ],
            source_row: 0,
            source_col_range: (0, 2),
            value_cols: vec![1, 2],
        };
        orient_oldest_first(&mut block, &years);
        assert_eq!(block.values[0].effective(), 1.0);

        years.insert(1, 2025);
        orient_oldest_first(&mut block, &years);
        assert_eq!(block.values[0].effective(), 2.0);
        assert_eq!(block.value_cols, vec![2, 1]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.matching.jaccard_threshold = 2.0;
        assert!(FilingProcessor::new(config).is_err());
    }
}
