//! Build handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::builds::{CreateBuildCommand, UpdateBuildCommand};
use crate::application::repos::BuildQueryFilter;
use crate::domain::builds::BuildLine;
use crate::infra::http::error::{ApiError, service_to_api};
use crate::infra::http::middleware::CurrentActor;
use crate::infra::http::models::*;
use crate::infra::http::state::ApiState;

/// `mine=true` lists the caller's builds, private ones included. Otherwise
/// administrators see every build and everyone else sees public builds.
pub async fn list_builds(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Query(query): Query<BuildListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.page(query.page, query.page_size);
    let filter = if query.mine {
        let actor = current.require()?;
        BuildQueryFilter {
            search: query.search,
            created_by: Some(actor.id),
            public_only: false,
        }
    } else {
        BuildQueryFilter {
            search: query.search,
            created_by: None,
            public_only: !current.actor().is_some_and(|actor| actor.is_admin()),
        }
    };

    let builds = state
        .catalog
        .builds
        .list(&filter, query.sort, page)
        .await
        .map_err(service_to_api)?;

    Ok(Json(builds))
}

pub async fn get_build(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let build = state
        .catalog
        .builds
        .get(current.actor(), id)
        .await
        .map_err(service_to_api)?;

    Ok(Json(build))
}

pub async fn create_build(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Json(payload): Json<BuildCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let command = CreateBuildCommand {
        name: payload.name,
        description: payload.description,
        is_public: payload.is_public,
        components: payload.components.into_iter().map(BuildLine::from).collect(),
    };

    let build = state
        .catalog
        .builds
        .create(actor, command)
        .await
        .map_err(service_to_api)?;

    Ok((StatusCode::CREATED, Json(build)))
}

pub async fn update_build(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BuildUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    let command = UpdateBuildCommand {
        name: payload.name,
        description: payload.description,
        is_public: payload.is_public,
        components: payload
            .components
            .map(|lines| lines.into_iter().map(BuildLine::from).collect()),
    };

    let build = state
        .catalog
        .builds
        .update(actor, id, command)
        .await
        .map_err(service_to_api)?;

    Ok(Json(build))
}

pub async fn delete_build(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current.require()?;

    state
        .catalog
        .builds
        .delete(actor, id)
        .await
        .map_err(service_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}
