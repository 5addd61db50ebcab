//! Core error kinds (spec §7).
//!
//! Mirrors the teacher's `AppError` shape: a flat `thiserror` enum with an
//! `Internal(#[from] anyhow::Error)` catch-all for backend failures that
//! don't map onto one of the named kinds.

use thiserror::Error;

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("secret not found")]
    NotFound,

    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("missing role: {0}")]
    MissingRole(&'static str),

    #[error("policy violation: {0}")]
    PolicyViolation(PolicyViolation),

    #[error("secret expired")]
    Expired,

    #[error("no rotation handler registered for this secret")]
    NoHandler,

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("encryption key not found: {0}")]
    KeyNotFound(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    TooShort { min_length: usize },
    ForbiddenSubstring,
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyViolation::TooShort { min_length } => {
                write!(f, "value shorter than minimum length {min_length}")
            }
            PolicyViolation::ForbiddenSubstring => write!(f, "value contains a forbidden substring"),
        }
    }
}
