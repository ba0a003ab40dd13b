//! Cart handlers. Every route acts on the caller's own cart.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::cart::AddToCartCommand;
use crate::infra::http::error::{ApiError, service_to_api};
use crate::infra::http::middleware::CurrentActor;
use crate::infra::http::models::*;
use crate::infra::http::state::ApiState;

pub async fn list_cart(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;
    let page = state.page(query.page, query.page_size);

    let items = state
        .catalog
        .cart
        .list(actor, page)
        .await
        .map_err(service_to_api)?;

    Ok(Json(items))
}

pub async fn add_to_cart(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Json(payload): Json<CartAddRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let item = state
        .catalog
        .cart
        .add(
            actor,
            AddToCartCommand {
                component_id: payload.component_id,
                quantity: payload.quantity,
            },
        )
        .await
        .map_err(service_to_api)?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_cart_item(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CartQuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let item = state
        .catalog
        .cart
        .update_quantity(actor, id, payload.quantity)
        .await
        .map_err(service_to_api)?;

    Ok(Json(item))
}

pub async fn remove_cart_item(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    state
        .catalog
        .cart
        .remove(actor, id)
        .await
        .map_err(service_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_cart(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let removed = state
        .catalog
        .cart
        .clear(actor)
        .await
        .map_err(service_to_api)?;

    Ok(Json(CartClearedResponse { removed }))
}
