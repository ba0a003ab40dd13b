use thiserror::Error;

use super::pricing::PriceOverflow;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("domain invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}

/// Stored amounts that no longer multiply out are an invariant breach, not caller input.
impl From<PriceOverflow> for DomainError {
    fn from(error: PriceOverflow) -> Self {
        Self::invariant(error.to_string())
    }
}
