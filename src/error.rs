//! Error types for skill learning operations.
//!
//! Only fatal conditions live here. Non-fatal conditions (unconverged EM,
//! low retained variance, floored time variances) are reported as values on
//! the fitted model and the generated trajectory.

use thiserror::Error;

/// Main error type for skill learning operations.
#[derive(Error, Debug)]
pub enum SkillError {
    /// Demonstrations cannot be aligned onto a common time base.
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// A fitted model was required but the learner has not been fit.
    #[error("Model has not been fit; call fit() before generate()")]
    NotFitted,

    /// Input validation errors.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Linear algebra computation failed.
    #[error("Linear algebra error: {0}")]
    LinalgError(String),

    /// Numerical computation resulted in NaN or Inf.
    #[error("Numerical instability: {context}")]
    NumericalInstability { context: String },
}

/// Result type alias for skill learning operations.
pub type Result<T> = std::result::Result<T, SkillError>;

impl SkillError {
    /// Create an alignment error.
    #[must_use]
    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::Alignment(msg.into())
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a linear algebra error.
    #[must_use]
    pub fn linalg(msg: impl Into<String>) -> Self {
        Self::LinalgError(msg.into())
    }

    /// Create a numerical instability error.
    #[must_use]
    pub fn numerical_instability(context: impl Into<String>) -> Self {
        Self::NumericalInstability {
            context: context.into(),
        }
    }
}
