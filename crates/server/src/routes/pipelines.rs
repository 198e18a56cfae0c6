use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    models::pipeline::{CreatePipeline, Pipeline, PipelineWithStages, UpdatePipeline},
    ordering::{OrderedRow, Scope},
};
use serde::Deserialize;
use services::services::{pipeline::PipelineService, reorder::ReorderService};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Drop a pipeline at `new_index` in the pipeline list
#[derive(Debug, Deserialize, TS)]
pub struct ReorderPipeline {
    pub pipeline_id: Uuid,
    pub new_index: i64,
}

/// List live pipelines in display order
pub async fn get_pipelines(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<PipelineWithStages>>>, ApiError> {
    let pipelines = PipelineService::list(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(pipelines)))
}

/// Fetch one pipeline
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<PipelineWithStages>>, ApiError> {
    let pipeline = PipelineService::get(&state.db().pool, pipeline_id).await?;
    Ok(ResponseJson(ApiResponse::success(pipeline)))
}

/// Create a pipeline at the end of the list, with its initial stages
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(payload): Json<CreatePipeline>,
) -> Result<ResponseJson<ApiResponse<PipelineWithStages>>, ApiError> {
    let pipeline = PipelineService::create(&state.db().pool, payload).await?;
    Ok(ResponseJson(ApiResponse::success(pipeline)))
}

/// Rename or restyle a pipeline; order is untouched
pub async fn update_pipeline(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
    Json(payload): Json<UpdatePipeline>,
) -> Result<ResponseJson<ApiResponse<Pipeline>>, ApiError> {
    let pipeline = PipelineService::update(&state.db().pool, pipeline_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(pipeline)))
}

/// Soft delete a pipeline and close the gap it leaves
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    PipelineService::delete(&state.db().pool, pipeline_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Move one pipeline to a new index
pub async fn reorder_pipelines(
    State(state): State<AppState>,
    Json(payload): Json<ReorderPipeline>,
) -> Result<ResponseJson<ApiResponse<Vec<OrderedRow>>>, ApiError> {
    let order = ReorderService::move_item(
        &state.db().pool,
        Scope::Pipelines,
        payload.pipeline_id,
        payload.new_index,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/pipelines", get(get_pipelines).post(create_pipeline))
        .route("/pipelines/reorder", post(reorder_pipelines))
        .route(
            "/pipelines/{pipeline_id}",
            get(get_pipeline)
                .patch(update_pipeline)
                .delete(delete_pipeline),
        )
}
