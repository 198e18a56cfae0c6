//! Maintenance endpoint for renumbering a drifted scope.

use axum::{
    Json, Router, extract::State, response::Json as ResponseJson, routing::post,
};
use db::ordering::{OrderedRow, Scope};
use services::services::reorder::ReorderService;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Renumber the live members of `scope` to `0..count`, keeping their current sequence
pub async fn compact_scope(
    State(state): State<AppState>,
    Json(scope): Json<Scope>,
) -> Result<ResponseJson<ApiResponse<Vec<OrderedRow>>>, ApiError> {
    let order = ReorderService::compact(&state.db().pool, scope).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/scopes/compact", post(compact_scope))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use db::{
        DBService,
        models::lost_reason::{CreateLostReason, LostReason},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{AppState, config::Config, routes};

    #[tokio::test]
    async fn test_compact_closes_gaps() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut ids = Vec::new();
        // Orders 0, 3, 7: a scope that drifted before deletes compacted
        for (order, name) in [(0, "Price"), (3, "Timing"), (7, "Competitor")] {
            let reason = LostReason::create(
                &db.pool,
                Uuid::new_v4(),
                &CreateLostReason {
                    name: name.to_string(),
                    description: None,
                },
                order,
            )
            .await
            .unwrap();
            ids.push(reason.id);
        }
        let app = routes::router(AppState::new(db, Config::from_lookup(|_| None).unwrap()));

        let request = Request::builder()
            .method("POST")
            .uri("/api/scopes/compact")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "kind": "lost_reasons" }).to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body["data"],
            json!([
                { "id": ids[0], "order": 0 },
                { "id": ids[1], "order": 1 },
                { "id": ids[2], "order": 2 }
            ])
        );
    }
}
