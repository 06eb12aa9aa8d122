//! Demo CRUD and query handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use scaffold_api_types::{CreateDemoRequest, NowDto, PageQuery, UpdateDemoRequest};
use uuid::Uuid;

use crate::application::demo::{CreateDemoCommand, UpdateDemoCommand};
use crate::application::repos::DemoQueryFilter;

use super::DEFAULT_PAGE_SIZE;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{demo_dto, demo_list, demo_page};
use crate::infra::http::api::state::ApiState;

pub async fn now(State(state): State<ApiState>) -> impl IntoResponse {
    Json(NowDto {
        now: state.demo.now(),
    })
}

pub async fn list_demos(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let records = state.demo.list_all().await?;
    Ok(Json(demo_list(records)))
}

pub async fn page_demos(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page_index = query.page_index.unwrap_or(1);
    let page_size = query
        .page_size
        .unwrap_or_else(|| DEFAULT_PAGE_SIZE.min(state.demo.max_page_size()));
    let filter = DemoQueryFilter {
        name: query.name,
        age: query.age,
        min_age: query.min_age,
    };

    let page = state.demo.page(page_index, page_size, filter).await?;
    Ok(Json(demo_page(page)))
}

pub async fn top_demos(
    State(state): State<ApiState>,
    Path(count): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.demo.top(count).await?;
    Ok(Json(demo_list(records)))
}

pub async fn get_demo(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.demo.find(id).await?;
    Ok(Json(demo_dto(record)))
}

pub async fn get_demo_cached(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.demo.find_cached(id).await?;
    Ok(Json(demo_dto(record)))
}

pub async fn create_demo(
    State(state): State<ApiState>,
    Json(payload): Json<CreateDemoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateDemoCommand {
        name: payload.name,
        age: payload.age,
    };

    let record = state.demo.create(command).await?;
    Ok((StatusCode::CREATED, Json(demo_dto(record))))
}

pub async fn update_demo(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDemoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateDemoCommand {
        id,
        name: payload.name,
        age: payload.age,
    };

    let record = state.demo.update(command).await?;
    Ok(Json(demo_dto(record)))
}

pub async fn delete_demo(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.demo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
