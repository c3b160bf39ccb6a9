//! Error types for AdOptima

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Data generation error: {0}")]
    DataGeneration(String),

    #[error("Insufficient data: {rows} rows, need at least {required}")]
    InsufficientData { rows: usize, required: usize },

    #[error("Infeasible constraints: {0}")]
    InfeasibleConstraint(String),

    #[error("Feature mismatch: {0}")]
    FeatureMismatch(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
