use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    application::repos::RepoError,
    domain::{error::DomainError, pricing::PriceOverflow},
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failures surfaced by catalog and build services.
///
/// The four caller-facing kinds map to distinct, stable HTTP statuses at the API
/// boundary. `Repo` carries everything else the gateway reports.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("validation failed: {}", .messages.join("; "))]
    Validation { messages: Vec<String> },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            messages: vec![message.into()],
        }
    }

    pub fn validation_many(messages: Vec<String>) -> Self {
        Self::Validation { messages }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn messages(&self) -> Vec<String> {
        match self {
            ServiceError::Validation { messages } => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::Duplicate { constraint } => {
                ServiceError::Conflict(format!("duplicate value violates `{constraint}`"))
            }
            RepoError::InvalidInput { message } => ServiceError::validation(message),
            // Version conflicts stay wrapped so `OptimisticRetry` can recognise them.
            other => ServiceError::Repo(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation { message } => ServiceError::validation(message),
            DomainError::Invariant { message } => {
                ServiceError::Repo(RepoError::Integrity { message })
            }
        }
    }
}

impl From<PriceOverflow> for ServiceError {
    fn from(error: PriceOverflow) -> Self {
        DomainError::from(error).into()
    }
}

/// Process-level failures raised while bootstrapping or running the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_rows_surface_as_conflict() {
        let error = ServiceError::from(RepoError::Duplicate {
            constraint: "component_categories_name_key".to_string(),
        });
        assert!(matches!(error, ServiceError::Conflict(_)));
    }

    #[test]
    fn validation_messages_are_kept_individually() {
        let error = ServiceError::validation_many(vec!["a".into(), "b".into()]);
        assert_eq!(error.messages(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(error.to_string(), "validation failed: a; b");
    }

    #[test]
    fn price_overflow_on_read_is_an_integrity_failure() {
        let error = ServiceError::from(PriceOverflow);
        assert!(matches!(
            error,
            ServiceError::Repo(RepoError::Integrity { .. })
        ));
    }

    #[test]
    fn report_collects_error_chain() {
        let error = ServiceError::Repo(RepoError::Timeout);
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &error);
        assert_eq!(report.messages, vec!["database timeout".to_string()]);
    }
}
