//! # Statement Consolidator
//!
//! A library for turning machine-generated spreadsheet exports of financial filings into
//! clean, chronologically consistent statement tables.
//!
//! ## Core Concepts
//!
//! - **Classification**: Decides whether a sheet is an income statement, balance sheet or
//!   cash flow statement from its title, its vocabulary and its shape
//! - **Boundaries**: Splits sheets that stack several statements at their header rows
//! - **Metric Blocks**: A row is read left to right as `(label, values)` blocks; exports
//!   often repeat the same line item once per comparative block
//! - **Restatements**: A figure revised by a later filing keeps its full history
//!   (`100{105}` is 100 restated to 105); comparisons use the latest value
//! - **Consolidation**: The same line item across filings is matched by label (exact,
//!   alias, token overlap, or an optional [`SimilarityOracle`]) and its value sequences
//!   are aligned so overlapping periods collapse
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_consolidator::*;
//!
//! let rows = |revenue: [&str; 2], newer: &str, older: &str| {
//!     vec![
//!         vec![Cell::from("Consolidated Statements of Operations"), Cell::from(newer), Cell::from(older)],
//!         vec![Cell::from("Revenue"), Cell::from(revenue[0]), Cell::from(revenue[1])],
//!     ]
//! };
//!
//! let filings = vec![
//!     Filing::new(
//!         FilingPeriod::new("FY2024", 2024),
//!         vec![Sheet::new("R4", rows(["130", "120"], "2024", "2023"))],
//!     ),
//!     Filing::new(
//!         FilingPeriod::new("FY2023", 2023),
//!         vec![Sheet::new("R4", rows(["120", "110"], "2023", "2022"))],
//!     ),
//! ];
//!
//! let consolidated = process_filings(&filings, EngineConfig::default()).unwrap();
//! let income = consolidated.statement(StatementType::Income).unwrap();
//! println!("{}", income.to_markdown());
//! ```

pub mod alignment;
pub mod boundaries;
pub mod classifier;
pub mod cleanup;
pub mod config;
pub mod consolidator;
pub mod dedup;
pub mod detector;
pub mod error;
pub mod matching;
pub mod normalizer;
pub mod periods;
pub mod processor;
pub mod render;
pub mod schema;

pub use alignment::{align, merge, merge_at, Alignment, AlignmentKind};
pub use boundaries::extract_boundaries;
pub use classifier::{
    classify, detect_header_type, Classification, ClassificationBasis, StatementClassifier,
    StatementScores,
};
pub use cleanup::{apply_cleanup, CleanedGrid};
pub use config::{AlignmentConfig, ClassifierConfig, CleanupConfig, EngineConfig, MatchingConfig};
pub use consolidator::{
    consolidate_periods, ConsolidatedMetric, ConsolidatedStatement, MetricConsolidator,
    PeriodTable,
};
pub use dedup::{deduplicate_row, RowDeduplicator};
pub use detector::{clean_label, detect_blocks};
pub use error::{ConsolidationError, Result};
pub use matching::{
    jaccard, normalize_label, LabelMatcher, MatchKind, SimilarityContext, SimilarityOracle,
};
pub use normalizer::{normalize_cell, render_token};
pub use periods::FilingPeriod;
pub use processor::{
    process_filings, ConsolidatedFiling, Filing, FilingProcessor, FilingReport, ReportEntry,
    SheetOutcome, StatementGap, StatementRow, StatementTable,
};
pub use schema::*;
