use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::{
    models::{
        custom_field::{CreateCustomField, CustomField, MoveCustomField, UpdateCustomField},
        form_section::{
            CreateFormSection, EntityType, FormSection, FormSectionWithFields, UpdateFormSection,
        },
    },
    ordering::{OrderedRow, Scope},
};
use serde::Deserialize;
use services::services::{form_section::FormSectionService, reorder::ReorderService};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct FormSectionQuery {
    pub entity_type: Option<EntityType>,
}

/// Drop a section at `new_index` among the sections of its entity type
#[derive(Debug, Deserialize, TS)]
pub struct ReorderFormSection {
    pub section_id: Uuid,
    pub new_index: i64,
}

/// Drop a field at `new_index` inside `section_id`
#[derive(Debug, Deserialize, TS)]
pub struct ReorderCustomField {
    pub field_id: Uuid,
    pub section_id: Uuid,
    pub new_index: i64,
}

/// List the sections of an entity type with their fields
pub async fn get_form_sections(
    State(state): State<AppState>,
    Query(query): Query<FormSectionQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<FormSectionWithFields>>>, ApiError> {
    let sections = FormSectionService::list(&state.db().pool, query.entity_type).await?;
    Ok(ResponseJson(ApiResponse::success(sections)))
}

/// Fetch one section with its fields
pub async fn get_form_section(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<FormSectionWithFields>>, ApiError> {
    let section = FormSectionService::get(&state.db().pool, section_id).await?;
    Ok(ResponseJson(ApiResponse::success(section)))
}

/// Append a section to its entity type
pub async fn create_form_section(
    State(state): State<AppState>,
    Json(payload): Json<CreateFormSection>,
) -> Result<ResponseJson<ApiResponse<FormSection>>, ApiError> {
    let section = FormSectionService::create(&state.db().pool, payload).await?;
    Ok(ResponseJson(ApiResponse::success(section)))
}

/// Update section fields other than order
pub async fn update_form_section(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
    Json(payload): Json<UpdateFormSection>,
) -> Result<ResponseJson<ApiResponse<FormSection>>, ApiError> {
    let section = FormSectionService::update(&state.db().pool, section_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(section)))
}

/// Soft delete a section with its fields and compact the entity type
pub async fn delete_form_section(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    FormSectionService::delete(&state.db().pool, section_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Move one section within its entity type
pub async fn reorder_form_sections(
    State(state): State<AppState>,
    Json(payload): Json<ReorderFormSection>,
) -> Result<ResponseJson<ApiResponse<Vec<OrderedRow>>>, ApiError> {
    let pool = &state.db().pool;
    let scope = FormSectionService::section_scope(pool, payload.section_id).await?;
    let order =
        ReorderService::move_item(pool, scope, payload.section_id, payload.new_index).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

/// Append a custom field to a section
pub async fn create_custom_field(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
    Json(payload): Json<CreateCustomField>,
) -> Result<ResponseJson<ApiResponse<CustomField>>, ApiError> {
    let field = FormSectionService::create_field(&state.db().pool, section_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(field)))
}

/// Move one field within its section
pub async fn reorder_custom_fields(
    State(state): State<AppState>,
    Json(payload): Json<ReorderCustomField>,
) -> Result<ResponseJson<ApiResponse<Vec<OrderedRow>>>, ApiError> {
    let order = ReorderService::move_item(
        &state.db().pool,
        Scope::CustomFields {
            section_id: payload.section_id,
        },
        payload.field_id,
        payload.new_index,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

/// Update a custom field; select fields keep at least one option
pub async fn update_custom_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Json(payload): Json<UpdateCustomField>,
) -> Result<ResponseJson<ApiResponse<CustomField>>, ApiError> {
    let field = FormSectionService::update_field(&state.db().pool, field_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(field)))
}

/// Soft delete a custom field and compact its section
pub async fn delete_custom_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    FormSectionService::delete_field(&state.db().pool, field_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Move a field to the end of another section of the same entity type
pub async fn move_custom_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Json(payload): Json<MoveCustomField>,
) -> Result<ResponseJson<ApiResponse<CustomField>>, ApiError> {
    let field =
        FormSectionService::move_field(&state.db().pool, field_id, payload.target_section_id)
            .await?;
    Ok(ResponseJson(ApiResponse::success(field)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/form-sections", get(get_form_sections).post(create_form_section))
        .route("/form-sections/reorder", post(reorder_form_sections))
        .route(
            "/form-sections/{section_id}",
            get(get_form_section)
                .patch(update_form_section)
                .delete(delete_form_section),
        )
        .route("/form-sections/{section_id}/fields", post(create_custom_field))
        .route("/form-sections/fields/reorder", post(reorder_custom_fields))
        .route(
            "/form-sections/fields/{field_id}",
            patch(update_custom_field).delete(delete_custom_field),
        )
        .route("/form-sections/fields/{field_id}/move", patch(move_custom_field))
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

    async fn create_section(app: &axum::Router, name: &str, entity_type: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/form-sections",
            json!({ "name": name, "entity_type": entity_type }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_field(app: &axum::Router, section_id: &str, name: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            &format!("/api/form-sections/{section_id}/fields"),
            json!({ "name": name, "field_type": "text" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_section_reorder_is_scoped_by_entity_type() {
        let db = DBService::new_in_memory().await.unwrap();
        let app = routes::router(AppState::new(db, Config::from_lookup(|_| None).unwrap()));

        let basics = create_section(&app, "Basics", "company").await;
        let billing = create_section(&app, "Billing", "company").await;
        let contact = create_section(&app, "Personal", "contact").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/form-sections/reorder",
            json!({ "section_id": billing, "new_index": 0 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([{ "id": billing, "order": 0 }, { "id": basics, "order": 1 }])
        );

        let (_, body) = call(&app, "GET", "/api/form-sections?entity_type=contact", json!(null)).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["id"], contact.as_str());
        assert_eq!(body["data"][0]["order"], 0);
    }

    #[tokio::test]
    async fn test_field_reorder_and_move() {
        let db = DBService::new_in_memory().await.unwrap();
        let app = routes::router(AppState::new(db, Config::from_lookup(|_| None).unwrap()));

        let source = create_section(&app, "Basics", "contact").await;
        let target = create_section(&app, "Extra", "contact").await;
        let a = create_field(&app, &source, "A").await;
        let b = create_field(&app, &source, "B").await;
        let c = create_field(&app, &source, "C").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/form-sections/fields/reorder",
            json!({ "field_id": c, "section_id": source, "new_index": 0 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([{ "id": c, "order": 0 }, { "id": a, "order": 1 }, { "id": b, "order": 2 }])
        );

        let (status, body) = call(
            &app,
            "PATCH",
            &format!("/api/form-sections/fields/{c}/move"),
            json!({ "target_section_id": target }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["section_id"], target.as_str());
        assert_eq!(body["data"]["order"], 0);

        let (_, body) = call(&app, "GET", &format!("/api/form-sections/{source}"), json!(null)).await;
        let fields: Vec<(String, i64)> = body["data"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| (f["id"].as_str().unwrap().to_string(), f["order"].as_i64().unwrap()))
            .collect();
        assert_eq!(fields, vec![(a, 0), (b, 1)]);
    }
}
