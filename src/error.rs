//! Error types for the onboarding wizard.

use crate::wizard::{FieldErrors, Step};

/// Failure reported by an external collaborator.
///
/// The wizard never interprets these beyond their message: a failed call
/// becomes the top-level error and leaves the drafted data untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Verification(String),

    #[error("{0}")]
    Lookup(String),

    #[error("{0}")]
    Generation(String),

    #[error("{0}")]
    Submission(String),

    #[error("{0}")]
    Registry(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Why a wizard operation was refused or failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("Validation failed: {}", .0.summary())]
    Validation(FieldErrors),

    #[error("Another operation is still in progress")]
    Busy,

    #[error("Cannot {operation} during step {step}")]
    WrongStep { operation: &'static str, step: Step },

    #[error("Onboarding is already complete")]
    Terminal,

    #[error("Already at the first step")]
    AtFirstStep,

    #[error("Enter a valid business email before using autofill.")]
    MissingDomain,

    #[error("{0}")]
    Service(#[from] ServiceError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for wizard operations.
pub type Result<T> = std::result::Result<T, WizardError>;
