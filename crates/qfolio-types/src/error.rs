use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QfolioError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Asset mismatch: {0}")]
    AssetMismatch(String),

    #[error("Invalid constraint `{field}`: {reason}")]
    InvalidConstraint { field: String, reason: String },

    #[error("Solver diverged: {0}")]
    SolverDivergence(String),

    #[error("Solver infeasible: {0}")]
    SolverInfeasible(String),

    #[error("Solver timed out: {0}")]
    SolverTimeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QfolioError {
    pub fn invalid_constraint(field: impl Into<String>, reason: impl Into<String>) -> Self {
        QfolioError::InvalidConstraint {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Coarse classification that survives serialization into a report
    pub fn kind(&self) -> ErrorKind {
        match self {
            QfolioError::InsufficientData(_) => ErrorKind::InsufficientData,
            QfolioError::AssetMismatch(_) => ErrorKind::AssetMismatch,
            QfolioError::InvalidConstraint { .. } => ErrorKind::InvalidConstraint,
            QfolioError::SolverDivergence(_) => ErrorKind::SolverDivergence,
            QfolioError::SolverInfeasible(_) => ErrorKind::SolverInfeasible,
            QfolioError::SolverTimeout(_) => ErrorKind::SolverTimeout,
            QfolioError::InvalidInput(_) => ErrorKind::InvalidInput,
            QfolioError::Cancelled(_) => ErrorKind::Cancelled,
            QfolioError::Serialization(_) => ErrorKind::Serialization,
            QfolioError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Input validation failures abort a whole request before any solver runs
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            QfolioError::InsufficientData(_)
                | QfolioError::AssetMismatch(_)
                | QfolioError::InvalidConstraint { .. }
                | QfolioError::InvalidInput(_)
        )
    }
}

impl From<serde_json::Error> for QfolioError {
    fn from(err: serde_json::Error) -> Self {
        QfolioError::Serialization(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientData,
    AssetMismatch,
    InvalidConstraint,
    SolverDivergence,
    SolverInfeasible,
    SolverTimeout,
    InvalidInput,
    Cancelled,
    Serialization,
    Internal,
}

pub type Result<T> = std::result::Result<T, QfolioError>;
