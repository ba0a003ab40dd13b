pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::{ApiState, HealthProbe};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;

use middleware::{log_responses, resolve_actor, set_request_context};

/// JSON surface over the catalog services.
///
/// `log_responses` is the outermost layer so it sees rejections produced by
/// `resolve_actor` along with handler errors.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/v1/components",
            get(handlers::list_components).post(handlers::create_component),
        )
        .route(
            "/api/v1/components/{id}",
            get(handlers::get_component)
                .patch(handlers::update_component)
                .delete(handlers::delete_component),
        )
        .route("/api/v1/components/{id}/specs", post(handlers::add_spec))
        .route("/api/v1/specs", get(handlers::list_specs))
        .route(
            "/api/v1/specs/{id}",
            get(handlers::get_spec)
                .put(handlers::update_spec)
                .delete(handlers::delete_spec),
        )
        .route(
            "/api/v1/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/api/v1/categories/{id}",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/api/v1/builds",
            get(handlers::list_builds).post(handlers::create_build),
        )
        .route(
            "/api/v1/builds/{id}",
            get(handlers::get_build)
                .put(handlers::update_build)
                .delete(handlers::delete_build),
        )
        .route("/api/v1/receipts", get(handlers::list_receipts))
        .route("/api/v1/receipts/{id}", get(handlers::get_receipt))
        .route(
            "/api/v1/receipts/{id}/status",
            post(handlers::update_receipt_status),
        )
        .route(
            "/api/v1/cart",
            get(handlers::list_cart)
                .post(handlers::add_to_cart)
                .delete(handlers::clear_cart),
        )
        .route(
            "/api/v1/cart/{id}",
            put(handlers::update_cart_item).delete(handlers::remove_cart_item),
        )
        .route("/_health/db", get(db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(resolve_actor))
        .layer(axum_middleware::from_fn(set_request_context))
        .layer(axum_middleware::from_fn(log_responses))
}

async fn db_health(State(state): State<ApiState>) -> Response {
    db_health_response(state.health.check().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_health_check_reports_unavailable() {
        let response = db_health_response(Err(RepoError::Timeout));

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
