//! Lost reason catalogue and per-pipeline selections.

use std::collections::HashSet;

use db::{
    models::{
        lost_reason::{CreateLostReason, LostReason, UpdateLostReason},
        pipeline::Pipeline,
        pipeline_lost_reason::PipelineLostReason,
    },
    ordering::{ReorderStoreError, Scope},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::{normalize_name, reorder::ReorderService};

#[derive(Debug, Error)]
pub enum LostReasonServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] ReorderStoreError),
    #[error("lost reason not found")]
    LostReasonNotFound,
    #[error("pipeline not found")]
    PipelineNotFound,
    #[error("validation error: {0}")]
    Validation(String),
}

pub struct LostReasonService;

impl LostReasonService {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<LostReason>, LostReasonServiceError> {
        Ok(LostReason::find_all(pool).await?)
    }

    pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<LostReason, LostReasonServiceError> {
        LostReason::find_by_id(pool, id)
            .await?
            .ok_or(LostReasonServiceError::LostReasonNotFound)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: CreateLostReason,
    ) -> Result<LostReason, LostReasonServiceError> {
        let name = normalize_name(&data.name).ok_or_else(|| {
            LostReasonServiceError::Validation("lost reason name is required".into())
        })?;

        let mut tx = db::begin_write(pool).await?;
        let order = Scope::LostReasons.count(&mut *tx).await?;
        let reason = LostReason::create(
            &mut *tx,
            Uuid::new_v4(),
            &CreateLostReason { name, ..data },
            order,
        )
        .await?;
        tx.commit().await?;

        info!(lost_reason_id = %reason.id, order, "Created lost reason");
        Ok(reason)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: UpdateLostReason,
    ) -> Result<LostReason, LostReasonServiceError> {
        let name = match data.name.as_deref() {
            Some(name) => Some(normalize_name(name).ok_or_else(|| {
                LostReasonServiceError::Validation("lost reason name cannot be empty".into())
            })?),
            None => None,
        };
        LostReason::update(pool, id, &UpdateLostReason { name, ..data })
            .await?
            .ok_or(LostReasonServiceError::LostReasonNotFound)
    }

    /// Soft delete a reason, drop it from every pipeline selection and compact all touched scopes
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), LostReasonServiceError> {
        let mut tx = db::begin_write(pool).await?;
        if LostReason::soft_delete(&mut *tx, id).await? == 0 {
            return Err(LostReasonServiceError::LostReasonNotFound);
        }
        ReorderService::compact_in(&mut tx, Scope::LostReasons).await?;

        let pipeline_ids = PipelineLostReason::find_pipeline_ids_by_lost_reason(&mut *tx, id).await?;
        PipelineLostReason::soft_delete_by_lost_reason_id(&mut *tx, id).await?;
        for pipeline_id in &pipeline_ids {
            ReorderService::compact_in(
                &mut tx,
                Scope::PipelineLostReasons {
                    pipeline_id: *pipeline_id,
                },
            )
            .await?;
        }
        tx.commit().await?;

        info!(
            lost_reason_id = %id,
            pipelines_touched = pipeline_ids.len(),
            "Deleted lost reason"
        );
        Ok(())
    }

    pub async fn list_for_pipeline(
        pool: &SqlitePool,
        pipeline_id: Uuid,
    ) -> Result<Vec<PipelineLostReason>, LostReasonServiceError> {
        Pipeline::find_by_id(pool, pipeline_id)
            .await?
            .ok_or(LostReasonServiceError::PipelineNotFound)?;
        Ok(PipelineLostReason::find_by_pipeline_id(pool, pipeline_id).await?)
    }

    /// Replace the pipeline's selection; position in `lost_reason_ids` becomes the order
    pub async fn set_for_pipeline(
        pool: &SqlitePool,
        pipeline_id: Uuid,
        lost_reason_ids: &[Uuid],
    ) -> Result<Vec<PipelineLostReason>, LostReasonServiceError> {
        let mut seen = HashSet::with_capacity(lost_reason_ids.len());
        if let Some(duplicate) = lost_reason_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(LostReasonServiceError::Validation(format!(
                "lost reason {duplicate} listed more than once"
            )));
        }

        let mut tx = db::begin_write(pool).await?;
        Pipeline::find_by_id(&mut *tx, pipeline_id)
            .await?
            .ok_or(LostReasonServiceError::PipelineNotFound)?;
        for id in lost_reason_ids {
            if LostReason::find_by_id(&mut *tx, *id).await?.is_none() {
                return Err(LostReasonServiceError::Validation(format!(
                    "unknown lost reason {id}"
                )));
            }
        }

        PipelineLostReason::soft_delete_by_pipeline_id(&mut *tx, pipeline_id).await?;
        for (index, id) in lost_reason_ids.iter().enumerate() {
            PipelineLostReason::create(&mut *tx, pipeline_id, *id, index as i64).await?;
        }
        let selection = PipelineLostReason::find_by_pipeline_id(&mut *tx, pipeline_id).await?;
        tx.commit().await?;

        info!(
            pipeline_id = %pipeline_id,
            selected = selection.len(),
            "Replaced pipeline lost reasons"
        );
        Ok(selection)
    }
}
