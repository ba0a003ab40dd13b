//! Receipt handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::repos::ReceiptQueryFilter;
use crate::infra::http::error::{ApiError, service_to_api};
use crate::infra::http::middleware::CurrentActor;
use crate::infra::http::models::{ReceiptListQuery, ReceiptStatusRequest};
use crate::infra::http::state::ApiState;

pub async fn list_receipts(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Query(query): Query<ReceiptListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;
    let page = state.page(query.page, query.page_size);
    let filter = ReceiptQueryFilter {
        owner_id: query.owner_id,
        status: query.status,
    };

    let receipts = state
        .catalog
        .receipts
        .list(actor, &filter, page)
        .await
        .map_err(service_to_api)?;

    Ok(Json(receipts))
}

pub async fn get_receipt(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let receipt = state
        .catalog
        .receipts
        .get(actor, id)
        .await
        .map_err(service_to_api)?;

    Ok(Json(receipt))
}

pub async fn update_receipt_status(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceiptStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let receipt = state
        .catalog
        .receipts
        .update_status(actor, id, payload.status)
        .await
        .map_err(service_to_api)?;

    Ok(Json(receipt))
}
