use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    models::{
        lost_reason::{CreateLostReason, LostReason, UpdateLostReason},
        pipeline_lost_reason::{PipelineLostReason, SetPipelineLostReasons},
    },
    ordering::{OrderedRow, Scope},
};
use serde::Deserialize;
use services::services::{lost_reason::LostReasonService, reorder::ReorderService};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Drop a lost reason at `new_index` in the catalogue
#[derive(Debug, Deserialize, TS)]
pub struct ReorderLostReason {
    pub reason_id: Uuid,
    pub new_index: i64,
}

/// Full new order of a pipeline's selected lost reasons
#[derive(Debug, Deserialize, TS)]
pub struct ReorderPipelineLostReasons {
    pub reason_ids: Vec<Uuid>,
}

/// List the lost reason catalogue in order
pub async fn get_lost_reasons(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<LostReason>>>, ApiError> {
    let reasons = LostReasonService::list(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(reasons)))
}

/// Fetch one lost reason
pub async fn get_lost_reason(
    State(state): State<AppState>,
    Path(reason_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<LostReason>>, ApiError> {
    let reason = LostReasonService::get(&state.db().pool, reason_id).await?;
    Ok(ResponseJson(ApiResponse::success(reason)))
}

/// Append a lost reason to the catalogue
pub async fn create_lost_reason(
    State(state): State<AppState>,
    Json(payload): Json<CreateLostReason>,
) -> Result<ResponseJson<ApiResponse<LostReason>>, ApiError> {
    let reason = LostReasonService::create(&state.db().pool, payload).await?;
    Ok(ResponseJson(ApiResponse::success(reason)))
}

/// Update a lost reason without touching its order
pub async fn update_lost_reason(
    State(state): State<AppState>,
    Path(reason_id): Path<Uuid>,
    Json(payload): Json<UpdateLostReason>,
) -> Result<ResponseJson<ApiResponse<LostReason>>, ApiError> {
    let reason = LostReasonService::update(&state.db().pool, reason_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(reason)))
}

/// Soft delete a lost reason and drop it from every pipeline selection
pub async fn delete_lost_reason(
    State(state): State<AppState>,
    Path(reason_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    LostReasonService::delete(&state.db().pool, reason_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Move one lost reason within the catalogue
pub async fn reorder_lost_reasons(
    State(state): State<AppState>,
    Json(payload): Json<ReorderLostReason>,
) -> Result<ResponseJson<ApiResponse<Vec<OrderedRow>>>, ApiError> {
    let order = ReorderService::move_item(
        &state.db().pool,
        Scope::LostReasons,
        payload.reason_id,
        payload.new_index,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

/// List a pipeline's selected lost reasons in order
pub async fn get_pipeline_lost_reasons(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<PipelineLostReason>>>, ApiError> {
    let selection = LostReasonService::list_for_pipeline(&state.db().pool, pipeline_id).await?;
    Ok(ResponseJson(ApiResponse::success(selection)))
}

/// Replace a pipeline's selection; list position becomes order
pub async fn set_pipeline_lost_reasons(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
    Json(payload): Json<SetPipelineLostReasons>,
) -> Result<ResponseJson<ApiResponse<Vec<PipelineLostReason>>>, ApiError> {
    let selection =
        LostReasonService::set_for_pipeline(&state.db().pool, pipeline_id, &payload.lost_reason_ids)
            .await?;
    Ok(ResponseJson(ApiResponse::success(selection)))
}

/// Reorder a pipeline's selection from the full id list
pub async fn reorder_pipeline_lost_reasons(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
    Json(payload): Json<ReorderPipelineLostReasons>,
) -> Result<ResponseJson<ApiResponse<Vec<OrderedRow>>>, ApiError> {
    let order = ReorderService::reorder_by_ids(
        &state.db().pool,
        Scope::PipelineLostReasons { pipeline_id },
        &payload.reason_ids,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/lost-reasons", get(get_lost_reasons).post(create_lost_reason))
        .route("/lost-reasons/reorder", post(reorder_lost_reasons))
        .route(
            "/lost-reasons/{reason_id}",
            get(get_lost_reason)
                .patch(update_lost_reason)
                .delete(delete_lost_reason),
        )
        .route(
            "/pipelines/{pipeline_id}/lost-reasons",
            get(get_pipeline_lost_reasons).put(set_pipeline_lost_reasons),
        )
        .route(
            "/pipelines/{pipeline_id}/lost-reasons/reorder",
            post(reorder_pipeline_lost_reasons),
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

    async fn create_reason(app: &axum::Router, name: &str) -> String {
        let (status, body) = call(app, "POST", "/api/lost-reasons", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_pipeline_lost_reasons_full_list_reorder() {
        let db = DBService::new_in_memory().await.unwrap();
        let app = routes::router(AppState::new(db, Config::from_lookup(|_| None).unwrap()));

        let (_, body) = call(&app, "POST", "/api/pipelines", json!({ "name": "Sales" })).await;
        let pipeline_id = body["data"]["id"].as_str().unwrap().to_string();
        let price = create_reason(&app, "Price").await;
        let timing = create_reason(&app, "Timing").await;
        let budget = create_reason(&app, "No budget").await;

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/pipelines/{pipeline_id}/lost-reasons"),
            json!({ "lost_reason_ids": [price, timing, budget] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][2]["name"], "No budget");

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/pipelines/{pipeline_id}/lost-reasons/reorder"),
            json!({ "reason_ids": [budget, price, timing] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([
                { "id": budget, "order": 0 },
                { "id": price, "order": 1 },
                { "id": timing, "order": 2 }
            ])
        );

        // Partial lists are rejected and nothing changes
        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/pipelines/{pipeline_id}/lost-reasons/reorder"),
            json!({ "reason_ids": [price] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
