use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::ordering::{ReorderError, ReorderStoreError};
use services::services::{
    form_section::FormSectionServiceError, lost_reason::LostReasonServiceError,
    pipeline::PipelineServiceError, reorder::ReorderServiceError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Reorder(#[from] ReorderServiceError),
    #[error(transparent)]
    Pipeline(#[from] PipelineServiceError),
    #[error(transparent)]
    LostReason(#[from] LostReasonServiceError),
    #[error(transparent)]
    FormSection(#[from] FormSectionServiceError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn reorder_status(err: &ReorderError) -> StatusCode {
    match err {
        ReorderError::NotFound(_) => StatusCode::NOT_FOUND,
        ReorderError::InvalidIndex { .. }
        | ReorderError::IdSetMismatch { .. }
        | ReorderError::UnknownId(_)
        | ReorderError::DuplicateId(_) => StatusCode::BAD_REQUEST,
    }
}

fn store_status(err: &ReorderStoreError) -> StatusCode {
    match err {
        ReorderStoreError::ScopeMismatch { .. } => StatusCode::CONFLICT,
        ReorderStoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Reorder(e) => match e {
                ReorderServiceError::Reorder(e) => reorder_status(e),
                ReorderServiceError::Store(e) => store_status(e),
                ReorderServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Pipeline(e) => match e {
                PipelineServiceError::PipelineNotFound | PipelineServiceError::StageNotFound => {
                    StatusCode::NOT_FOUND
                }
                PipelineServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                PipelineServiceError::Store(e) => store_status(e),
                PipelineServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::LostReason(e) => match e {
                LostReasonServiceError::LostReasonNotFound
                | LostReasonServiceError::PipelineNotFound => StatusCode::NOT_FOUND,
                LostReasonServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                LostReasonServiceError::Store(e) => store_status(e),
                LostReasonServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::FormSection(e) => match e {
                FormSectionServiceError::SectionNotFound
                | FormSectionServiceError::FieldNotFound => StatusCode::NOT_FOUND,
                FormSectionServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                FormSectionServiceError::Store(e) => store_status(e),
                FormSectionServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
