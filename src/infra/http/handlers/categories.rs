//! Category handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::categories::CategoryCommand;
use crate::application::repos::CategoryQueryFilter;
use crate::infra::http::error::{ApiError, service_to_api};
use crate::infra::http::middleware::CurrentActor;
use crate::infra::http::models::*;
use crate::infra::http::state::ApiState;

pub async fn list_categories(
    State(state): State<ApiState>,
    Query(query): Query<CategoryListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.page(query.page, query.page_size);
    let filter = CategoryQueryFilter {
        search: query.search,
    };

    let categories = state
        .catalog
        .categories
        .list(&filter, page)
        .await
        .map_err(service_to_api)?;

    Ok(Json(categories))
}

pub async fn get_category(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .catalog
        .categories
        .get(id)
        .await
        .map_err(service_to_api)?;

    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let category = state
        .catalog
        .categories
        .create(
            actor,
            CategoryCommand {
                name: payload.name,
                description: payload.description,
            },
        )
        .await
        .map_err(service_to_api)?;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let category = state
        .catalog
        .categories
        .update(
            actor,
            id,
            CategoryCommand {
                name: payload.name,
                description: payload.description,
            },
        )
        .await
        .map_err(service_to_api)?;

    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    state
        .catalog
        .categories
        .delete(actor, id)
        .await
        .map_err(service_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}
