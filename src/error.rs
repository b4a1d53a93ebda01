use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsolidationError {
    #[error("Invalid configuration for {field}: {details}")]
    InvalidConfig { field: String, details: String },

    #[error("Invalid threshold {value} for {name}: must be between 0.0 and 1.0")]
    InvalidThreshold { name: String, value: f64 },

    #[error("Similarity oracle failed: {0}")]
    OracleFailure(String),

    #[error("Similarity oracle returned out-of-range score {0}")]
    OracleScoreOutOfRange(f64),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConsolidationError>;
