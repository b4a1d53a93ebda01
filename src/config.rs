use crate::error::{ConsolidationError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Every tunable heuristic of the engine. All sections fall back to their defaults when
/// omitted from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    #[schemars(description = "Statement classification weights and thresholds")]
    pub classifier: ClassifierConfig,

    #[schemars(description = "Rules deciding when two labels name the same metric")]
    pub matching: MatchingConfig,

    #[schemars(description = "Value-sequence alignment policy")]
    pub alignment: AlignmentConfig,

    #[schemars(description = "Grid cleanup steps applied to each extracted statement")]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClassifierConfig {
    #[schemars(description = "Points per title lexicon hit")]
    pub title_weight: f64,

    #[schemars(description = "Points per title hit for phrases longer than specific_title_min_len")]
    pub specific_title_weight: f64,

    pub specific_title_min_len: usize,

    #[schemars(description = "Points added to every score per satisfied structural check")]
    pub structural_bonus: f64,

    #[schemars(description = "Year-like columns needed for the year-column bonus")]
    pub min_year_columns: usize,

    #[schemars(description = "Numeric-dominant columns needed for the numeric-column bonus")]
    pub min_numeric_columns: usize,

    #[schemars(description = "Share of non-blank cells that must be numeric for a column to count as numeric-dominant")]
    pub numeric_dominance: f64,

    #[schemars(description = "Rows scanned from the top when looking for year headers")]
    pub header_scan_rows: usize,

    pub min_rows: usize,
    pub max_rows: usize,

    pub income_threshold: f64,
    pub balance_threshold: f64,
    pub cash_flow_threshold: f64,

    #[schemars(description = "Cash flow score needed when the title mentions both 'cash' and 'flow'")]
    pub partial_title_cash_flow: f64,

    #[schemars(description = "Balance score needed when the title mentions 'balance'")]
    pub partial_title_balance: f64,

    #[schemars(description = "Income score needed when the title mentions income, operations or earnings")]
    pub partial_title_income: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            title_weight: 8.0,
            specific_title_weight: 10.0,
            specific_title_min_len: 15,
            structural_bonus: 1.0,
            min_year_columns: 2,
            min_numeric_columns: 2,
            numeric_dominance: 0.5,
            header_scan_rows: 15,
            min_rows: 5,
            max_rows: 50,
            income_threshold: 6.0,
            balance_threshold: 5.0,
            cash_flow_threshold: 6.0,
            partial_title_cash_flow: 8.0,
            partial_title_balance: 6.0,
            partial_title_income: 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MatchingConfig {
    #[schemars(description = "Minimum token-set Jaccard similarity for two labels to match")]
    pub jaccard_threshold: f64,

    #[schemars(description = "Minimum similarity-oracle score for two labels to match")]
    pub semantic_threshold: f64,

    #[schemars(
        description = "Groups of labels that always name the same metric. Entries are compared after normalization."
    )]
    pub alias_groups: Vec<Vec<String>>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let groups: &[&[&str]] = &[
            &[
                "revenue",
                "revenues",
                "net sales",
                "total net sales",
                "total revenue",
                "total revenues",
                "net revenue",
                "net revenues",
                "sales",
            ],
            &[
                "cost of sales",
                "cost of revenue",
                "cost of revenues",
                "cost of goods sold",
                "total cost of sales",
            ],
            &[
                "selling general and administrative",
                "selling general and administrative expenses",
                "sg a",
                "sga",
            ],
            &["research and development", "research and development expenses"],
            &["net income", "net earnings", "net income loss", "net profit"],
            &[
                "total stockholders equity",
                "total shareholders equity",
                "stockholders equity",
                "shareholders equity",
            ],
            &["cash and cash equivalents", "cash and equivalents"],
            &["capital expenditures", "purchases of property and equipment"],
        ];

        Self {
            jaccard_threshold: 0.6,
            semantic_threshold: 0.78,
            alias_groups: groups
                .iter()
                .map(|g| g.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AlignmentConfig {
    #[schemars(
        description = "Share of the incoming sequence the best consecutive run must cover before a non-suffix alignment is accepted. 1.0 accepts only full containment; anything shorter is appended as a new entry."
    )]
    pub min_fallback_coverage: f64,

    #[schemars(
        description = "Reverse a metric's values when its column headers run newest to oldest, so every sequence reads oldest first"
    )]
    pub orient_oldest_first: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            min_fallback_coverage: 1.0,
            orient_oldest_first: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CleanupConfig {
    pub drop_empty_rows: bool,
    pub drop_empty_columns: bool,

    #[schemars(description = "Remove rows whose normalized content repeats an earlier row")]
    pub drop_duplicate_rows: bool,

    #[schemars(description = "Remove columns whose normalized content repeats an earlier column")]
    pub drop_duplicate_columns: bool,

    #[schemars(description = "Keep only the leftmost column for each year detected in the header rows")]
    pub drop_repeated_year_columns: bool,

    #[schemars(description = "Rows scanned for year headers by drop_repeated_year_columns")]
    pub year_scan_rows: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            drop_empty_rows: true,
            drop_empty_columns: false,
            drop_duplicate_rows: true,
            drop_duplicate_columns: false,
            drop_repeated_year_columns: false,
            year_scan_rows: 80,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineConfig)
    }

    pub fn schema_as_json() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::generate_json_schema())?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_unit("matching.jaccard_threshold", self.matching.jaccard_threshold)?;
        validate_unit("matching.semantic_threshold", self.matching.semantic_threshold)?;
        validate_unit(
            "alignment.min_fallback_coverage",
            self.alignment.min_fallback_coverage,
        )?;
        validate_unit(
            "classifier.numeric_dominance",
            self.classifier.numeric_dominance,
        )?;

        let c = &self.classifier;
        if c.min_rows > c.max_rows {
            return Err(ConsolidationError::InvalidConfig {
                field: "classifier.min_rows".to_string(),
                details: format!("min_rows {} exceeds max_rows {}", c.min_rows, c.max_rows),
            });
        }

        let weights = [
            ("classifier.title_weight", c.title_weight),
            ("classifier.specific_title_weight", c.specific_title_weight),
            ("classifier.structural_bonus", c.structural_bonus),
            ("classifier.income_threshold", c.income_threshold),
            ("classifier.balance_threshold", c.balance_threshold),
            ("classifier.cash_flow_threshold", c.cash_flow_threshold),
        ];
        for (field, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConsolidationError::InvalidConfig {
                    field: field.to_string(),
                    details: format!("{} must be a non-negative number", value),
                });
            }
        }

        for (idx, group) in self.matching.alias_groups.iter().enumerate() {
            if group.iter().all(|alias| alias.trim().is_empty()) {
                return Err(ConsolidationError::InvalidConfig {
                    field: "matching.alias_groups".to_string(),
                    details: format!("Alias group #{} has no non-empty entries", idx),
                });
            }
        }

        Ok(())
    }
}

fn validate_unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConsolidationError::InvalidThreshold {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.jaccard_threshold, 0.6);
        assert_eq!(config.matching.semantic_threshold, 0.78);
        assert_eq!(config.classifier.balance_threshold, 5.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "matching": { "jaccard_threshold": 0.75 }, "cleanup": { "drop_duplicate_rows": false } }"#,
        )
        .unwrap();
        assert_eq!(config.matching.jaccard_threshold, 0.75);
        assert_eq!(config.matching.semantic_threshold, 0.78);
        assert!(!config.matching.alias_groups.is_empty());
        assert!(!config.cleanup.drop_duplicate_rows);
        assert!(config.cleanup.drop_empty_rows);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "alignment": { "min_fallback_coverage": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConsolidationError::InvalidThreshold { .. }));
    }

    #[test]
    fn test_row_range_rejected() {
        let mut config = EngineConfig::default();
        config.classifier.min_rows = 60;
        assert!(matches!(
            config.validate(),
            Err(ConsolidationError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_schema_generation() {
        let schema = EngineConfig::schema_as_json().unwrap();
        assert!(schema.contains("jaccard_threshold"));
        assert!(schema.contains("min_fallback_coverage"));
    }
}
