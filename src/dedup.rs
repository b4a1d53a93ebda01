use crate::alignment::{align, merge_at};
use crate::config::{AlignmentConfig, EngineConfig, MatchingConfig};
use crate::matching::{LabelMatcher, SimilarityContext, SimilarityOracle};
use crate::schema::{MergedMetric, MetricBlock};
use log::debug;

/// Folds the metric blocks of one row into distinct metrics.
///
/// Filings often print the same line item several times on one row, once per
/// comparative block. Each block joins the first metric it matches by label, with its
/// values aligned onto that metric's sequence; unmatched blocks open a new metric.
pub struct RowDeduplicator<'a> {
    matcher: LabelMatcher<'a>,
    alignment: AlignmentConfig,
}

impl<'a> RowDeduplicator<'a> {
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

    #[must_use]
    pub fn with_context(mut self, context: SimilarityContext) -> Self {
        self.matcher = self.matcher.with_context(context);
        self
    }

    pub fn deduplicate(&self, blocks: &[MetricBlock]) -> Vec<MergedMetric> {
        let mut merged: Vec<MergedMetric> = Vec::new();

        for block in blocks {
            let found = {
                let candidates: Vec<(usize, Vec<&str>)> = merged
                    .iter()
                    .enumerate()
                    .map(|(idx, metric)| (idx, metric.labels().collect()))
                    .collect();
                self.matcher.find_match(&block.label, &candidates)
            };

            match found {
                Some(idx) => {
                    let metric = &mut merged[idx];
                    let alignment = align(&metric.values, &block.values, &self.alignment);
                    debug!(
                        "Row {}: merging '{}' into '{}' at offset {} ({:?})",
                        block.source_row,
                        block.label,
                        metric.canonical_label,
                        alignment.offset,
                        alignment.kind
                    );
                    metric.values = merge_at(&metric.values, &block.values, alignment.offset);
                    metric.record_label(&block.label);
                }
                None => merged.push(MergedMetric::from_block(block)),
            }
        }

        merged
    }
}

/// Deduplicates one row's blocks with lexical matching only.
pub fn deduplicate_row(blocks: &[MetricBlock], config: &EngineConfig) -> Vec<MergedMetric> {
    RowDeduplicator::from_config(config).deduplicate(blocks)
}
