//! Decides whether two line-item labels name the same metric.
//!
//! Lexical rules always apply: normalized equality, the alias table, and token-set
//! Jaccard similarity. An optional [`SimilarityOracle`] (typically backed by an
//! embedding model) adds a semantic rule and breaks ties between equally good lexical
//! candidates. When the oracle is missing or fails, matching is lexical only.

use crate::config::MatchingConfig;
use crate::error::{ConsolidationError, Result};
use crate::schema::StatementType;
use log::warn;
use std::collections::{BTreeSet, HashMap};

const SCORE_EPSILON: f64 = 1e-9;
const MAX_CONTEXT_TERMS: usize = 5;

/// Lowercases, drops apostrophes, turns other punctuation into spaces and collapses
/// whitespace: `"Stockholders' equity, total"` becomes `"stockholders equity total"`.
pub fn normalize_label(label: &str) -> String {
    let mapped: String = label
        .chars()
        .filter(|c| !matches!(c, '\'' | '’' | '‘'))
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn token_set(label: &str) -> BTreeSet<String> {
    normalize_label(label)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn jaccard(a: &str, b: &str) -> f64 {
    let left = token_set(a);
    let right = token_set(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Extra information handed to the oracle alongside the two labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimilarityContext {
    pub statement_type: Option<StatementType>,
}

impl SimilarityContext {
    pub fn for_statement(statement_type: StatementType) -> Self {
        Self {
            statement_type: Some(statement_type),
        }
    }

    /// Context-rich text for embedding a label: the normalized label followed by up to
    /// five domain terms (synonyms of words it contains, then statement vocabulary).
    pub fn enrich(&self, label: &str) -> String {
        let clean = normalize_label(label);
        let mut terms: Vec<&str> = Vec::new();

        for (term, synonyms) in FINANCIAL_SYNONYMS {
            if clean.contains(term) {
                terms.extend(synonyms.iter().copied());
            }
        }

        if let Some(statement_type) = self.statement_type {
            terms.extend(statement_vocabulary(statement_type).iter().copied());
        }

        terms.truncate(MAX_CONTEXT_TERMS);
        if terms.is_empty() {
            clean
        } else {
            format!("{} {}", clean, terms.join(" "))
        }
    }
}

const FINANCIAL_SYNONYMS: &[(&str, &[&str])] = &[
    ("revenue", &["sales", "income", "turnover", "receipts"]),
    ("profit", &["earnings", "income", "gain", "surplus"]),
    ("expense", &["cost", "expenditure", "outlay", "charge"]),
    ("asset", &["property", "holding", "investment", "resource"]),
    ("liabilit", &["debt", "obligation", "payable", "burden"]),
    ("equity", &["capital", "ownership", "shares", "stock"]),
    ("cash", &["liquidity", "funds", "money", "currency"]),
    ("operating", &["operational", "business", "core", "primary"]),
];

fn statement_vocabulary(statement_type: StatementType) -> &'static [&'static str] {
    match statement_type {
        StatementType::Income => &[
            "revenue", "sales", "income", "profit", "loss", "earnings", "expense", "cost",
            "operating", "gross", "net", "ebitda",
        ],
        StatementType::Balance => &[
            "asset", "liability", "equity", "debt", "cash", "inventory", "receivable",
            "payable", "capital", "retained", "stock",
        ],
        StatementType::CashFlow => &[
            "cash", "flow", "operating", "investing", "financing", "activities",
            "depreciation", "amortization", "working",
        ],
    }
}

/// Pluggable semantic similarity, e.g. cosine similarity of sentence embeddings.
///
/// Scores must lie in `[0, 1]`. Errors and out-of-range scores are treated as
/// "no match" by the matcher.
pub trait SimilarityOracle: Send + Sync {
    fn similarity(&self, a: &str, b: &str, context: &SimilarityContext) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Alias,
    Lexical,
    Semantic,
}

#[derive(Clone)]
pub struct LabelMatcher<'a> {
    aliases: HashMap<String, usize>,
    jaccard_threshold: f64,
    semantic_threshold: f64,
    oracle: Option<&'a dyn SimilarityOracle>,
    context: SimilarityContext,
}

impl<'a> LabelMatcher<'a> {
    pub fn new(config: &MatchingConfig) -> Self {
        let mut aliases = HashMap::new();
        for (group, entries) in config.alias_groups.iter().enumerate() {
            for entry in entries {
                let key = normalize_label(entry);
                if !key.is_empty() {
                    aliases.entry(key).or_insert(group);
                }
            }
        }

        Self {
            aliases,
            jaccard_threshold: config.jaccard_threshold,
            semantic_threshold: config.semantic_threshold,
            oracle: None,
            context: SimilarityContext::default(),
        }
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: Option<&'a dyn SimilarityOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: SimilarityContext) -> Self {
        self.context = context;
        self
    }

    fn alias_group(&self, normalized: &str) -> Option<usize> {
        self.aliases.get(normalized).copied()
    }

    fn lexical_match(&self, a: &str, b: &str) -> Option<MatchKind> {
        let left = normalize_label(a);
        let right = normalize_label(b);
        if left.is_empty() || right.is_empty() {
            return None;
        }
        if left == right {
            return Some(MatchKind::Exact);
        }
        match (self.alias_group(&left), self.alias_group(&right)) {
            (Some(x), Some(y)) if x == y => Some(MatchKind::Alias),
            _ => None,
        }
    }

    fn oracle_score(&self, a: &str, b: &str) -> Option<f64> {
        let oracle = self.oracle?;
        let scored = oracle.similarity(a, b, &self.context).and_then(|score| {
            if (0.0..=1.0).contains(&score) {
                Ok(score)
            } else {
                Err(ConsolidationError::OracleScoreOutOfRange(score))
            }
        });
        match scored {
            Ok(score) => Some(score),
            Err(e) => {
                warn!(
                    "Similarity oracle failed for '{}' vs '{}': {}; using lexical matching",
                    a, b, e
                );
                None
            }
        }
    }

    /// Applies the identity rules in order: normalized equality, alias table, Jaccard,
    /// then the oracle.
    pub fn same_metric(&self, a: &str, b: &str) -> Option<MatchKind> {
        if let Some(kind) = self.lexical_match(a, b) {
            return Some(kind);
        }
        if jaccard(a, b) >= self.jaccard_threshold {
            return Some(MatchKind::Lexical);
        }
        match self.oracle_score(a, b) {
            Some(score) if score >= self.semantic_threshold => Some(MatchKind::Semantic),
            _ => None,
        }
    }

    /// Picks the candidate `label` belongs to. Each candidate is an id plus every label
    /// it is known by (canonical first). Exact and alias matches win outright, in
    /// candidate order; otherwise the best Jaccard score at or above the threshold wins,
    /// with the oracle breaking ties; otherwise the best oracle score at or above the
    /// semantic threshold.
    pub fn find_match(&self, label: &str, candidates: &[(usize, Vec<&str>)]) -> Option<usize> {
        for (id, labels) in candidates {
            if labels.iter().any(|l| self.lexical_match(label, l).is_some()) {
                return Some(*id);
            }
        }

        let mut best_score = self.jaccard_threshold;
        let mut tied: Vec<(usize, &str)> = Vec::new();
        for (id, labels) in candidates {
            let score = labels
                .iter()
                .map(|l| jaccard(label, l))
                .fold(0.0_f64, f64::max);
            if score + SCORE_EPSILON < best_score {
                continue;
            }
            if score > best_score + SCORE_EPSILON {
                tied.clear();
            }
            best_score = best_score.max(score);
            tied.push((*id, labels.first().copied().unwrap_or_default()));
        }

        match tied.len() {
            0 => {}
            1 => return Some(tied[0].0),
            _ => {
                let best = tied
                    .iter()
                    .filter_map(|(id, canonical)| {
                        self.oracle_score(label, canonical).map(|s| (*id, s))
                    })
                    .fold(None, |acc: Option<(usize, f64)>, (id, s)| match acc {
                        Some((_, best)) if best >= s => acc,
                        _ => Some((id, s)),
                    });
                return Some(best.map(|(id, _)| id).unwrap_or(tied[0].0));
            }
        }

        self.oracle?;
        let mut best: Option<(usize, f64)> = None;
        for (id, labels) in candidates {
            for candidate_label in labels {
                if let Some(score) = self.oracle_score(label, candidate_label) {
                    let better = best.map(|(_, b)| score > b).unwrap_or(true);
                    if score >= self.semantic_threshold && better {
                        best = Some((*id, score));
                    }
                }
            }
        }
        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOracle(f64);

    impl SimilarityOracle for FixedOracle {
        fn similarity(&self, _a: &str, _b: &str, _context: &SimilarityContext) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct FailingOracle;

    impl SimilarityOracle for FailingOracle {
        fn similarity(&self, _a: &str, _b: &str, _context: &SimilarityContext) -> Result<f64> {
            Err(ConsolidationError::OracleFailure("model not loaded".to_string()))
        }
    }

    /// Scores by shared first letter, to make tie-breaking observable.
    struct FirstLetterOracle;

    impl SimilarityOracle for FirstLetterOracle {
        fn similarity(&self, a: &str, b: &str, _context: &SimilarityContext) -> Result<f64> {
            let first = |s: &str| s.trim().chars().next().map(|c| c.to_ascii_lowercase());
            Ok(if first(a) == first(b) { 0.9 } else { 0.1 })
        }
    }

    fn matcher() -> LabelMatcher<'static> {
        LabelMatcher::new(&MatchingConfig::default())
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(
            normalize_label("  Stockholders' Equity,   Total "),
            "stockholders equity total"
        );
        assert_eq!(normalize_label("SG&A"), "sg a");
        assert_eq!(normalize_label("Net income (loss)"), "net income loss");
    }

    #[test]
    fn test_lexical_rules() {
        let m = matcher();
        assert_eq!(m.same_metric("Revenue", "revenue."), Some(MatchKind::Exact));
        assert_eq!(m.same_metric("Net sales", "Total revenue"), Some(MatchKind::Alias));
        assert_eq!(
            m.same_metric("Total operating expenses", "Operating expenses, total"),
            Some(MatchKind::Lexical)
        );
        assert_eq!(m.same_metric("Inventories", "Goodwill"), None);
    }

    #[test]
    fn test_jaccard_threshold() {
        assert!((jaccard("Accounts receivable net", "Accounts receivable") - 2.0 / 3.0).abs() < 1e-9);
        let m = matcher();
        assert_eq!(
            m.same_metric("Accounts receivable, net", "Accounts receivable"),
            Some(MatchKind::Lexical)
        );
        assert_eq!(m.same_metric("Total assets", "Total liabilities"), None);
    }

    #[test]
    fn test_semantic_rule_and_degradation() {
        let high = FixedOracle(0.9);
        let m = matcher().with_oracle(Some(&high));
        assert_eq!(
            m.same_metric("Turnover", "Revenue from contracts"),
            Some(MatchKind::Semantic)
        );

        let low = FixedOracle(0.5);
        let m = matcher().with_oracle(Some(&low));
        assert_eq!(m.same_metric("Turnover", "Revenue from contracts"), None);

        let failing = FailingOracle;
        let m = matcher().with_oracle(Some(&failing));
        assert_eq!(m.same_metric("Turnover", "Revenue from contracts"), None);
        assert_eq!(m.same_metric("Revenue", "Net sales"), Some(MatchKind::Alias));

        let broken = FixedOracle(1.7);
        let m = matcher().with_oracle(Some(&broken));
        assert_eq!(m.same_metric("Turnover", "Revenue from contracts"), None);
    }

    #[test]
    fn test_find_match_prefers_exact_over_earlier_fuzzy() {
        let m = matcher();
        let candidates = vec![
            (0, vec!["Accounts receivable"]),
            (1, vec!["Accounts receivable, net"]),
        ];
        assert_eq!(m.find_match("accounts receivable net", &candidates), Some(1));
        assert_eq!(m.find_match("Deferred revenue", &candidates), None);
    }

    #[test]
    fn test_find_match_uses_contributing_labels() {
        let m = matcher();
        let candidates = vec![(7, vec!["Total revenue", "Net sales"])];
        assert_eq!(m.find_match("net sales", &candidates), Some(7));
    }

    #[test]
    fn test_oracle_breaks_lexical_ties() {
        // The incoming label scores 4/6 against both candidates.
        let label = "Other non operating income net";
        let candidates = vec![
            (0, vec!["Interest non operating income net"]),
            (1, vec!["Other non operating expense net"]),
        ];
        let m = matcher();
        assert_eq!(m.find_match(label, &candidates), Some(0));

        let oracle = FirstLetterOracle;
        let m = matcher().with_oracle(Some(&oracle));
        assert_eq!(m.find_match(label, &candidates), Some(1));
    }

    #[test]
    fn test_enrich_context() {
        let ctx = SimilarityContext::for_statement(StatementType::CashFlow);
        assert_eq!(
            ctx.enrich("Net cash from operating activities"),
            "net cash from operating activities liquidity funds money currency operational"
        );
        assert_eq!(SimilarityContext::default().enrich("Goodwill"), "goodwill");
    }
}
