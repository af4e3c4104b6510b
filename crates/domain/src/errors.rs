//! Domain error types.

use thiserror::Error;

/// Errors raised by persistence backends.
///
/// Backends classify their native failures into these three buckets so the
/// service layer never has to inspect driver-specific error codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("Duplicate key: {0}")]
    Conflict(String),

    /// A referenced entity does not exist.
    #[error("Referenced entity missing: {0}")]
    NotFound(String),

    /// Any other storage failure.
    #[error("Storage failure: {0}")]
    Backend(String),
}

/// Errors surfaced by the onboarding operations.
///
/// The variants line up with how clients must react: fix the input
/// (`Validation`), stop trying this invitation or request (`NotFound`,
/// `Conflict`, `InvalidState`), or retry later (`Internal`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OnboardingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OnboardingError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OnboardingError::Internal(_))
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            OnboardingError::Validation(_) => "validation",
            OnboardingError::NotFound(_) => "not_found",
            OnboardingError::Conflict(_) => "conflict",
            OnboardingError::InvalidState(_) => "invalid_state",
            OnboardingError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for OnboardingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => OnboardingError::Conflict(msg),
            StoreError::NotFound(msg) => OnboardingError::NotFound(msg),
            StoreError::Backend(msg) => OnboardingError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for OnboardingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        OnboardingError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification() {
        assert_eq!(
            OnboardingError::from(StoreError::Conflict("email".into())),
            OnboardingError::Conflict("email".into())
        );
        assert_eq!(
            OnboardingError::from(StoreError::NotFound("course".into())),
            OnboardingError::NotFound("course".into())
        );
        assert_eq!(
            OnboardingError::from(StoreError::Backend("io".into())),
            OnboardingError::Internal("io".into())
        );
    }

    #[test]
    fn test_only_internal_is_retryable() {
        assert!(OnboardingError::Internal("x".into()).is_retryable());
        assert!(!OnboardingError::Conflict("x".into()).is_retryable());
        assert!(!OnboardingError::InvalidState("expired".into()).is_retryable());
        assert!(!OnboardingError::Validation("x".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            OnboardingError::InvalidState("expired".into()).to_string(),
            "Invalid state: expired"
        );
        assert_eq!(
            StoreError::Conflict("code".into()).to_string(),
            "Duplicate key: code"
        );
    }
}
