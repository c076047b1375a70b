//! Error types for adaforest operations.
//!
//! Most degraded situations in a streaming forest (empty votes, unknown
//! feature-subsample policies) are not errors at all; see the crate docs.
//! What remains are malformed batches and invalid hyperparameters.

use thiserror::Error;

/// Main error type for adaforest operations.
///
/// # Examples
///
/// ```
/// use adaforest::error::ForestError;
///
/// let err = ForestError::dimension_mismatch("weights", 4, 3);
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Debug, Error)]
pub enum ForestError {
    /// Batch dimensions don't line up (rows vs labels, rows vs weights,
    /// or an instance with a different feature count).
    #[error("Batch dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    #[error("Invalid hyperparameter: {param} = {value}, expected {constraint}")]
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Empty batch where at least one row is required.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Configuration (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ForestError {
    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create an invalid hyperparameter error
    #[must_use]
    pub fn invalid_hyperparameter(param: &str, value: impl ToString, constraint: &str) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create an empty input error
    #[must_use]
    pub fn empty_input(context: &str) -> Self {
        Self::EmptyInput(context.to_string())
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, ForestError>;
