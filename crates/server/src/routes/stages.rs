use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    models::stage::{CreateStage, Stage, UpdateStage},
    ordering::{OrderedRow, Scope},
};
use serde::Deserialize;
use services::services::{pipeline::PipelineService, reorder::ReorderService};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Drop a stage at `new_index` within its pipeline
#[derive(Debug, Deserialize, TS)]
pub struct ReorderStage {
    pub stage_id: Uuid,
    pub new_index: i64,
}

/// List the live stages of a pipeline in order
pub async fn get_stages(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Stage>>>, ApiError> {
    let stages = PipelineService::list_stages(&state.db().pool, pipeline_id).await?;
    Ok(ResponseJson(ApiResponse::success(stages)))
}

/// Append a stage to a pipeline
pub async fn create_stage(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
    Json(payload): Json<CreateStage>,
) -> Result<ResponseJson<ApiResponse<Stage>>, ApiError> {
    let stage = PipelineService::create_stage(&state.db().pool, pipeline_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(stage)))
}

/// Move one stage within its pipeline
pub async fn reorder_stages(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
    Json(payload): Json<ReorderStage>,
) -> Result<ResponseJson<ApiResponse<Vec<OrderedRow>>>, ApiError> {
    let order = ReorderService::move_item(
        &state.db().pool,
        Scope::Stages { pipeline_id },
        payload.stage_id,
        payload.new_index,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

/// Fetch one stage
pub async fn get_stage(
    State(state): State<AppState>,
    Path(stage_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Stage>>, ApiError> {
    let stage = PipelineService::get_stage(&state.db().pool, stage_id).await?;
    Ok(ResponseJson(ApiResponse::success(stage)))
}

/// Update stage fields other than order
pub async fn update_stage(
    State(state): State<AppState>,
    Path(stage_id): Path<Uuid>,
    Json(payload): Json<UpdateStage>,
) -> Result<ResponseJson<ApiResponse<Stage>>, ApiError> {
    let stage = PipelineService::update_stage(&state.db().pool, stage_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(stage)))
}

/// Soft delete a stage and compact its pipeline
pub async fn delete_stage(
    State(state): State<AppState>,
    Path(stage_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    PipelineService::delete_stage(&state.db().pool, stage_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/pipelines/{pipeline_id}/stages",
            get(get_stages).post(create_stage),
        )
        .route("/pipelines/{pipeline_id}/stages/reorder", post(reorder_stages))
        .route(
            "/stages/{stage_id}",
            get(get_stage).patch(update_stage).delete(delete_stage),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use db::DBService;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::{AppState, config::Config, routes};

    async fn call(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_stage_reorder_within_pipeline() {
        let db = DBService::new_in_memory().await.unwrap();
        let app = routes::router(AppState::new(db, Config::from_lookup(|_| None).unwrap()));

        let (_, body) = call(
            &app,
            "POST",
            "/api/pipelines",
            json!({ "name": "Sales", "stages": [{ "name": "Lead" }, { "name": "Qualified" }, { "name": "Won" }] }),
        )
        .await;
        let pipeline_id = body["data"]["id"].as_str().unwrap().to_string();
        let stage_ids: Vec<String> = body["data"]["stages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap().to_string())
            .collect();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/pipelines/{pipeline_id}/stages/reorder"),
            json!({ "stage_id": stage_ids[0], "new_index": 2 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![stage_ids[1].as_str(), stage_ids[2].as_str(), stage_ids[0].as_str()]);

        // A stage from another pipeline is not part of this scope
        let (_, other) = call(
            &app,
            "POST",
            "/api/pipelines",
            json!({ "name": "Renewals", "stages": [{ "name": "Open" }] }),
        )
        .await;
        let foreign = other["data"]["stages"][0]["id"].as_str().unwrap().to_string();
        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/pipelines/{pipeline_id}/stages/reorder"),
            json!({ "stage_id": foreign, "new_index": 0 }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
