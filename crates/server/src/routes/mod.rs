use axum::{Router, response::Json as ResponseJson, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utils::response::ApiResponse;

use crate::AppState;

pub mod form_sections;
pub mod lost_reasons;
pub mod pipelines;
pub mod scopes;
pub mod stages;

async fn health() -> ResponseJson<ApiResponse<&'static str>> {
    ResponseJson(ApiResponse::success("OK"))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .merge(pipelines::router(&state))
        .merge(stages::router(&state))
        .merge(lost_reasons::router(&state))
        .merge(form_sections::router(&state))
        .merge(scopes::router(&state));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
