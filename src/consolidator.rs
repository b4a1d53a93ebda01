//! Consolidation of one statement type across reporting periods.
//!
//! Every filing repeats a few comparative periods of the previous one. Matching metrics
//! are grouped by label, then each group's value sequences are folded oldest filing
//! first so overlapping periods collapse and later filings extend the series.

use crate::alignment::{align, merge_at};
use crate::config::{AlignmentConfig, EngineConfig, MatchingConfig};
use crate::matching::{LabelMatcher, SimilarityContext, SimilarityOracle};
use crate::periods::FilingPeriod;
use crate::schema::{MergedMetric, StatementType};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The deduplicated metrics one filing reported for one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodTable {
    pub period: FilingPeriod,
    pub metrics: Vec<MergedMetric>,
}

impl PeriodTable {
    pub fn new(period: FilingPeriod, metrics: Vec<MergedMetric>) -> Self {
        Self { period, metrics }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedMetric {
    #[serde(flatten)]
    pub metric: MergedMetric,

    #[schemars(description = "Labels of the periods that reported this metric, oldest first")]
    pub periods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedStatement {
    pub statement_type: StatementType,

    #[schemars(description = "Every period that contributed, oldest first")]
    pub periods: Vec<FilingPeriod>,

    #[schemars(description = "Metrics in first-seen order")]
    pub metrics: Vec<ConsolidatedMetric>,
}

impl ConsolidatedStatement {
    pub fn metric(&self, label: &str) -> Option<&ConsolidatedMetric> {
        self.metrics
            .iter()
            .find(|m| m.metric.labels().any(|l| l == label))
    }

    /// Longest value sequence among the metrics.
    pub fn width(&self) -> usize {
        self.metrics
            .iter()
            .map(|m| m.metric.values.len())
            .max()
            .unwrap_or(0)
    }
}

struct MetricGroup<'t> {
    canonical_label: String,
    labels: BTreeSet<String>,
    contributions: Vec<(usize, &'t MergedMetric)>,
}

impl MetricGroup<'_> {
    fn has_period(&self, table_idx: usize) -> bool {
        self.contributions.iter().any(|(t, _)| *t == table_idx)
    }
}

pub struct MetricConsolidator<'a> {
    matcher: LabelMatcher<'a>,
    alignment: AlignmentConfig,
}

impl<'a> MetricConsolidator<'a> {
    pub fn new(matching: &MatchingConfig, alignment: &AlignmentConfig) -> Self {
        Self {
            matcher: LabelMatcher::new(matching),
            alignment: alignment.clone(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.matching, &config.alignment)
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: Option<&'a dyn SimilarityOracle>) -> Self {
        self.matcher = self.matcher.with_oracle(oracle);
        self
    }

    /// Consolidates `tables`, given in caller order (usually newest filing first). The
    /// first wording seen for a metric becomes its canonical label.
    pub fn consolidate(
        &self,
        statement_type: StatementType,
        tables: &[PeriodTable],
    ) -> ConsolidatedStatement {
        let context = SimilarityContext::for_statement(statement_type);
        let groups = self.group(tables, &context);

        let mut chronological: Vec<usize> = (0..tables.len()).collect();
        chronological.sort_by_key(|&t| tables[t].period.sort_key());

        let metrics: Vec<ConsolidatedMetric> = groups
            .into_iter()
            .map(|group| self.fold_group(group, tables))
            .collect();

        let mut periods: Vec<FilingPeriod> = Vec::new();
        for t in chronological {
            if !periods.iter().any(|p| p.label == tables[t].period.label) {
                periods.push(tables[t].period.clone());
            }
        }

        info!(
            "Consolidated {} metrics for {} across {} periods",
            metrics.len(),
            statement_type,
            periods.len()
        );

        ConsolidatedStatement {
            statement_type,
            periods,
            metrics,
        }
    }

    fn group<'t>(
        &self,
        tables: &'t [PeriodTable],
        context: &SimilarityContext,
    ) -> Vec<MetricGroup<'t>> {
        let mut groups: Vec<MetricGroup<'t>> = Vec::new();
        let matcher = self.matcher.clone().with_context(context.clone());

        for (table_idx, table) in tables.iter().enumerate() {
            for metric in &table.metrics {
                let found = {
                    let candidates: Vec<(usize, Vec<&str>)> = groups
                        .iter()
                        .enumerate()
                        .filter(|(_, g)| !g.has_period(table_idx))
                        .map(|(idx, g)| {
                            let labels = std::iter::once(g.canonical_label.as_str())
                                .chain(g.labels.iter().map(String::as_str))
                                .collect();
                            (idx, labels)
                        })
                        .collect();
                    metric
                        .labels()
                        .find_map(|label| matcher.find_match(label, &candidates))
                };

                match found {
                    Some(idx) => {
                        let group = &mut groups[idx];
                        debug!(
                            "{}: '{}' joins '{}'",
                            table.period.label, metric.canonical_label, group.canonical_label
                        );
                        group.contributions.push((table_idx, metric));
                        for label in metric.labels() {
                            if label != group.canonical_label {
                                group.labels.insert(label.to_string());
                            }
                        }
                    }
                    None => groups.push(MetricGroup {
                        canonical_label: metric.canonical_label.clone(),
                        labels: metric.contributing_labels.clone(),
                        contributions: vec![(table_idx, metric)],
                    }),
                }
            }
        }

        groups
    }

    fn fold_group(&self, mut group: MetricGroup<'_>, tables: &[PeriodTable]) -> ConsolidatedMetric {
        group
            .contributions
            .sort_by_key(|(t, _)| tables[*t].period.sort_key());

        let mut values = Vec::new();
        let mut periods = Vec::new();
        for (table_idx, metric) in &group.contributions {
            let alignment = align(&values, &metric.values, &self.alignment);
            values = merge_at(&values, &metric.values, alignment.offset);
            periods.push(tables[*table_idx].period.label.clone());
        }

        let mut metric = MergedMetric::new(group.canonical_label, values);
        metric.contributing_labels = group.labels;
        ConsolidatedMetric { metric, periods }
    }
}

/// Consolidates with lexical matching only and the default alignment policy.
pub fn consolidate_periods(
    statement_type: StatementType,
    tables: &[PeriodTable],
    config: &EngineConfig,
) -> ConsolidatedStatement {
    MetricConsolidator::from_config(config).consolidate(statement_type, tables)
}
