//! Component and spec handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::components::{
    CreateComponentCommand, SpecCommand, UpdateComponentCommand,
};
use crate::application::repos::{ComponentQueryFilter, SpecQueryFilter};
use crate::infra::http::error::{ApiError, service_to_api};
use crate::infra::http::middleware::CurrentActor;
use crate::infra::http::models::*;
use crate::infra::http::state::ApiState;

pub async fn list_components(
    State(state): State<ApiState>,
    Query(query): Query<ComponentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.page(query.page, query.page_size);
    let filter = ComponentQueryFilter {
        search: query.search,
        category_id: query.category_id,
        brand: query.brand,
        min_price: query.min_price,
        max_price: query.max_price,
        include_inactive: query.include_inactive,
    };

    let components = state
        .catalog
        .components
        .list(&filter, query.sort, page)
        .await
        .map_err(service_to_api)?;

    Ok(Json(components))
}

pub async fn get_component(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let component = state
        .catalog
        .components
        .get(id)
        .await
        .map_err(service_to_api)?;

    Ok(Json(component))
}

pub async fn create_component(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Json(payload): Json<ComponentCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let command = CreateComponentCommand {
        name: payload.name,
        category_id: payload.category_id,
        brand: payload.brand,
        price: payload.price,
        stock_quantity: payload.stock_quantity,
        description: payload.description,
        image_url: payload.image_url,
        is_active: payload.is_active,
    };

    let component = state
        .catalog
        .components
        .create(actor, command)
        .await
        .map_err(service_to_api)?;

    Ok((StatusCode::CREATED, Json(component)))
}

pub async fn update_component(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ComponentUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let command = UpdateComponentCommand {
        name: payload.name,
        category_id: payload.category_id,
        brand: payload.brand,
        price: payload.price,
        stock_quantity: payload.stock_quantity,
        description: payload.description,
        image_url: payload.image_url,
        is_active: payload.is_active,
    };

    let component = state
        .catalog
        .components
        .update(actor, id, command)
        .await
        .map_err(service_to_api)?;

    Ok(Json(component))
}

pub async fn delete_component(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    state
        .catalog
        .components
        .delete(actor, id)
        .await
        .map_err(service_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_specs(
    State(state): State<ApiState>,
    Query(query): Query<SpecListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.page(query.page, query.page_size);
    let filter = SpecQueryFilter {
        component_id: query.component_id,
        search: query.search,
    };

    let specs = state
        .catalog
        .components
        .list_specs(&filter, page)
        .await
        .map_err(service_to_api)?;

    Ok(Json(specs))
}

pub async fn get_spec(
    State(state): State<ApiState>,
    Path(spec_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let spec = state
        .catalog
        .components
        .get_spec(spec_id)
        .await
        .map_err(service_to_api)?;

    Ok(Json(spec))
}

pub async fn add_spec(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(component_id): Path<Uuid>,
    Json(payload): Json<SpecRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let spec = state
        .catalog
        .components
        .add_spec(actor, component_id, spec_command(payload))
        .await
        .map_err(service_to_api)?;

    Ok((StatusCode::CREATED, Json(spec)))
}

pub async fn update_spec(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(spec_id): Path<Uuid>,
    Json(payload): Json<SpecRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let spec = state
        .catalog
        .components
        .update_spec(actor, spec_id, spec_command(payload))
        .await
        .map_err(service_to_api)?;

    Ok(Json(spec))
}

pub async fn delete_spec(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(spec_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    state
        .catalog
        .components
        .remove_spec(actor, spec_id)
        .await
        .map_err(service_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}

fn spec_command(payload: SpecRequest) -> SpecCommand {
    SpecCommand {
        spec_key: payload.spec_key,
        spec_value: payload.spec_value,
        display_order: payload.display_order,
    }
}
