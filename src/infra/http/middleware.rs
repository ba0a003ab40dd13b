use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::application::identity::Actor;
use crate::domain::types::Role;

use super::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// The caller as asserted by the trusted upstream, if any.
#[derive(Clone, Debug, Default)]
pub struct CurrentActor(pub Option<Actor>);

impl CurrentActor {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }

    pub fn require(&self) -> Result<&Actor, ApiError> {
        self.0.as_ref().ok_or_else(|| {
            ApiError::unauthorized(Some(format!("missing `{ACTOR_ID_HEADER}` header")))
        })
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Read `x-actor-id` / `x-actor-roles` into a [`CurrentActor`] extension.
///
/// Absent headers yield an anonymous caller; malformed ones are rejected.
pub async fn resolve_actor(mut request: Request<Body>, next: Next) -> Response {
    let actor = match parse_actor(request.headers()) {
        Ok(actor) => actor,
        Err(err) => return err.into_response(),
    };
    let current = CurrentActor(actor);
    request.extensions_mut().insert(current.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(current);
    response
}

fn parse_actor(headers: &HeaderMap) -> Result<Option<Actor>, ApiError> {
    let Some(raw_id) = headers.get(ACTOR_ID_HEADER) else {
        return Ok(None);
    };
    let id = raw_id
        .to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| {
            ApiError::bad_request(
                "invalid actor id",
                Some(format!("`{ACTOR_ID_HEADER}` must be a UUID")),
            )
        })?;

    let roles = match headers.get(ACTOR_ROLES_HEADER) {
        None => vec![Role::Customer],
        Some(raw) => {
            let raw = raw.to_str().map_err(|_| {
                ApiError::bad_request("invalid actor roles", Some("roles must be ASCII".into()))
            })?;
            raw.split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .map(|role| {
                    role.parse::<Role>().map_err(|err| {
                        ApiError::bad_request("invalid actor roles", Some(err.to_string()))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(Some(Actor::new(id, roles)))
}

/// Outermost layer: request id and actor are read back from the response, where
/// the inner layers leave them.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();

    let actor_id = response
        .extensions()
        .get::<CurrentActor>()
        .and_then(|current| current.actor().map(|actor| actor.id.to_string()));

    let request_id = response
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "pcshop::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                actor_id = actor_id.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "pcshop::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                actor_id = actor_id.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}
