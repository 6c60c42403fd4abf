use crate::types::PatientIndex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration parameter '{parameter}': {context}")]
    Config { parameter: String, context: String },

    #[error("Distribution '{distribution}' sums to {sum} ({context})")]
    DistributionSum {
        distribution: String,
        sum: f64,
        context: String,
    },

    #[error("Numeric domain error in {operation}: input {value}")]
    NumericDomain { operation: &'static str, value: f64 },

    #[error("Invariant violated for patient {patient}: {detail}")]
    InvariantViolation { patient: PatientIndex, detail: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn config(parameter: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            parameter: parameter.into(),
            context: context.into(),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
