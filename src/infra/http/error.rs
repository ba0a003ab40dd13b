use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ErrorReport, ServiceError};
use crate::application::repos::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const CONFLICT: &str = "conflict";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
    details: Vec<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn bad_request(message: impl Into<String>, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized(hint: Option<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "actor identity required",
            hint,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self
            .hint
            .clone()
            .unwrap_or_else(|| self.message.clone());
        let mut chain = vec![format!("{}: {}", self.code, detail)];
        chain.extend(self.details.iter().cloned());

        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
                details: self.details,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport {
            source: "infra::http",
            status: self.status,
            messages: chain,
        }
        .attach(&mut response);
        response
    }
}

/// Stable status and code for each service failure kind.
pub fn service_to_api(err: ServiceError) -> ApiError {
    match err {
        ServiceError::NotFound { entity, id } => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            format!("{entity} not found"),
            Some(id.to_string()),
        ),
        ServiceError::Validation { messages } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION_FAILED,
            "validation failed",
            None,
        )
        .with_details(messages),
        ServiceError::Conflict(message) => {
            ApiError::new(StatusCode::CONFLICT, codes::CONFLICT, message, None)
        }
        ServiceError::Forbidden(message) => {
            ApiError::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message, None)
        }
        ServiceError::Repo(repo) => repo_to_api(repo),
    }
}

fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::VersionConflict { expected } => ApiError::new(
            StatusCode::CONFLICT,
            codes::CONFLICT,
            "record was modified concurrently",
            Some(format!("expected version {expected}")),
        ),
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::CONFLICT,
            "duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "resource not found",
            None,
        ),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION_FAILED,
            "invalid input",
            None,
        )
        .with_details(vec![message]),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "persistence error",
            Some(message),
        ),
    }
}
