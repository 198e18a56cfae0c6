//! Pipelines and their stages.

use db::{
    models::{
        pipeline::{CreatePipeline, Pipeline, PipelineWithStages, UpdatePipeline},
        pipeline_lost_reason::PipelineLostReason,
        stage::{CreateStage, Stage, UpdateStage},
    },
    ordering::{ReorderStoreError, Scope},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::{normalize_name, reorder::ReorderService};

#[derive(Debug, Error)]
pub enum PipelineServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] ReorderStoreError),
    #[error("pipeline not found")]
    PipelineNotFound,
    #[error("stage not found")]
    StageNotFound,
    #[error("validation error: {0}")]
    Validation(String),
}

pub struct PipelineService;

impl PipelineService {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<PipelineWithStages>, PipelineServiceError> {
        let pipelines = Pipeline::find_all(pool).await?;
        let mut result = Vec::with_capacity(pipelines.len());
        for pipeline in pipelines {
            let stages = Stage::find_by_pipeline_id(pool, pipeline.id).await?;
            result.push(PipelineWithStages { pipeline, stages });
        }
        Ok(result)
    }

    pub async fn get(
        pool: &SqlitePool,
        pipeline_id: Uuid,
    ) -> Result<PipelineWithStages, PipelineServiceError> {
        let pipeline = Pipeline::find_by_id(pool, pipeline_id)
            .await?
            .ok_or(PipelineServiceError::PipelineNotFound)?;
        let stages = Stage::find_by_pipeline_id(pool, pipeline.id).await?;
        Ok(PipelineWithStages { pipeline, stages })
    }

    /// Create a pipeline at the end of the list, with optional initial stages in the given order
    pub async fn create(
        pool: &SqlitePool,
        data: CreatePipeline,
    ) -> Result<PipelineWithStages, PipelineServiceError> {
        let name = normalize_name(&data.name)
            .ok_or_else(|| PipelineServiceError::Validation("pipeline name is required".into()))?;
        let stage_names = data
            .stages
            .iter()
            .flatten()
            .map(|stage| {
                normalize_name(&stage.name).ok_or_else(|| {
                    PipelineServiceError::Validation("stage name is required".into())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = db::begin_write(pool).await?;
        let order = Scope::Pipelines.count(&mut *tx).await?;
        let pipeline = Pipeline::create(
            &mut *tx,
            Uuid::new_v4(),
            &CreatePipeline { name, ..data },
            order,
        )
        .await?;

        let mut stages = Vec::with_capacity(stage_names.len());
        for (index, name) in stage_names.into_iter().enumerate() {
            let stage =
                Stage::create(&mut *tx, Uuid::new_v4(), pipeline.id, &CreateStage { name }, index as i64)
                    .await?;
            stages.push(stage);
        }
        tx.commit().await?;

        info!(
            pipeline_id = %pipeline.id,
            order = pipeline.order,
            stages = stages.len(),
            "Created pipeline"
        );
        Ok(PipelineWithStages { pipeline, stages })
    }

    pub async fn update(
        pool: &SqlitePool,
        pipeline_id: Uuid,
        data: UpdatePipeline,
    ) -> Result<Pipeline, PipelineServiceError> {
        let name = match data.name.as_deref() {
            Some(name) => Some(normalize_name(name).ok_or_else(|| {
                PipelineServiceError::Validation("pipeline name cannot be empty".into())
            })?),
            None => None,
        };
        Pipeline::update(pool, pipeline_id, &UpdatePipeline { name, ..data })
            .await?
            .ok_or(PipelineServiceError::PipelineNotFound)
    }

    /// Soft delete a pipeline with its stages and lost reason selection, then close the gap
    pub async fn delete(pool: &SqlitePool, pipeline_id: Uuid) -> Result<(), PipelineServiceError> {
        let mut tx = db::begin_write(pool).await?;
        if Pipeline::soft_delete(&mut *tx, pipeline_id).await? == 0 {
            return Err(PipelineServiceError::PipelineNotFound);
        }
        let stages_deleted = Stage::soft_delete_by_pipeline_id(&mut *tx, pipeline_id).await?;
        PipelineLostReason::soft_delete_by_pipeline_id(&mut *tx, pipeline_id).await?;
        ReorderService::compact_in(&mut tx, Scope::Pipelines).await?;
        tx.commit().await?;

        info!(pipeline_id = %pipeline_id, stages_deleted, "Deleted pipeline");
        Ok(())
    }

    pub async fn list_stages(
        pool: &SqlitePool,
        pipeline_id: Uuid,
    ) -> Result<Vec<Stage>, PipelineServiceError> {
        Pipeline::find_by_id(pool, pipeline_id)
            .await?
            .ok_or(PipelineServiceError::PipelineNotFound)?;
        Ok(Stage::find_by_pipeline_id(pool, pipeline_id).await?)
    }

    pub async fn get_stage(pool: &SqlitePool, stage_id: Uuid) -> Result<Stage, PipelineServiceError> {
        Stage::find_by_id(pool, stage_id)
            .await?
            .ok_or(PipelineServiceError::StageNotFound)
    }

    /// Append a stage to the pipeline
    pub async fn create_stage(
        pool: &SqlitePool,
        pipeline_id: Uuid,
        data: CreateStage,
    ) -> Result<Stage, PipelineServiceError> {
        let name = normalize_name(&data.name)
            .ok_or_else(|| PipelineServiceError::Validation("stage name is required".into()))?;

        let mut tx = db::begin_write(pool).await?;
        Pipeline::find_by_id(&mut *tx, pipeline_id)
            .await?
            .ok_or(PipelineServiceError::PipelineNotFound)?;
        let order = Scope::Stages { pipeline_id }.count(&mut *tx).await?;
        let stage = Stage::create(&mut *tx, Uuid::new_v4(), pipeline_id, &CreateStage { name }, order)
            .await?;
        tx.commit().await?;

        info!(pipeline_id = %pipeline_id, stage_id = %stage.id, order, "Created stage");
        Ok(stage)
    }

    pub async fn update_stage(
        pool: &SqlitePool,
        stage_id: Uuid,
        data: UpdateStage,
    ) -> Result<Stage, PipelineServiceError> {
        let name = match data.name.as_deref() {
            Some(name) => Some(normalize_name(name).ok_or_else(|| {
                PipelineServiceError::Validation("stage name cannot be empty".into())
            })?),
            None => None,
        };
        Stage::update(pool, stage_id, &UpdateStage { name })
            .await?
            .ok_or(PipelineServiceError::StageNotFound)
    }

    /// Soft delete a stage and compact the remaining stages of its pipeline
    pub async fn delete_stage(pool: &SqlitePool, stage_id: Uuid) -> Result<(), PipelineServiceError> {
        let mut tx = db::begin_write(pool).await?;
        let stage = Stage::find_by_id(&mut *tx, stage_id)
            .await?
            .ok_or(PipelineServiceError::StageNotFound)?;
        Stage::soft_delete(&mut *tx, stage.id).await?;
        ReorderService::compact_in(
            &mut tx,
            Scope::Stages {
                pipeline_id: stage.pipeline_id,
            },
        )
        .await?;
        tx.commit().await?;

        info!(stage_id = %stage_id, pipeline_id = %stage.pipeline_id, "Deleted stage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::pipeline::InitialStage, ordering::is_dense};

    use super::*;

    fn new_pipeline(name: &str, stages: &[&str]) -> CreatePipeline {
        CreatePipeline {
            name: name.to_string(),
            description: None,
            icon: None,
            stages: Some(
                stages
                    .iter()
                    .map(|s| InitialStage {
                        name: s.to_string(),
                    })
                    .collect(),
            ),
        }
    }

    #[tokio::test]
    async fn test_create_appends_and_numbers_initial_stages() {
        let db = DBService::new_in_memory().await.unwrap();
        let first = PipelineService::create(&db.pool, new_pipeline("Sales", &["Lead", "Won"]))
            .await
            .unwrap();
        let second = PipelineService::create(&db.pool, new_pipeline(" Renewals ", &[]))
            .await
            .unwrap();

        assert_eq!(first.order, 0);
        assert_eq!(second.order, 1);
        assert_eq!(second.name, "Renewals");
        let stage_orders: Vec<i64> = first.stages.iter().map(|s| s.order).collect();
        assert_eq!(stage_orders, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_names() {
        let db = DBService::new_in_memory().await.unwrap();
        let err = PipelineService::create(&db.pool, new_pipeline("  ", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineServiceError::Validation(_)));

        let err = PipelineService::create(&db.pool, new_pipeline("Sales", &["Lead", ""]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineServiceError::Validation(_)));
        assert!(PipelineService::list(&db.pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_stage_compacts_siblings() {
        let db = DBService::new_in_memory().await.unwrap();
        let pipeline = PipelineService::create(&db.pool, new_pipeline("Sales", &["A", "B", "C"]))
            .await
            .unwrap();

        PipelineService::delete_stage(&db.pool, pipeline.stages[0].id)
            .await
            .unwrap();

        let stages = PipelineService::list_stages(&db.pool, pipeline.id).await.unwrap();
        assert!(is_dense(&stages));
        assert_eq!(
            stages.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![pipeline.stages[1].id, pipeline.stages[2].id]
        );

        // The freed slot is reused by the next append
        let stage = PipelineService::create_stage(&db.pool, pipeline.id, CreateStage { name: "D".into() })
            .await
            .unwrap();
        assert_eq!(stage.order, 2);
    }

    #[tokio::test]
    async fn test_delete_pipeline_compacts_pipelines() {
        let db = DBService::new_in_memory().await.unwrap();
        let a = PipelineService::create(&db.pool, new_pipeline("A", &["x"])).await.unwrap();
        let b = PipelineService::create(&db.pool, new_pipeline("B", &[])).await.unwrap();
        let c = PipelineService::create(&db.pool, new_pipeline("C", &[])).await.unwrap();

        PipelineService::delete(&db.pool, b.id).await.unwrap();

        let remaining = PipelineService::list(&db.pool).await.unwrap();
        let orders: Vec<(Uuid, i64)> = remaining.iter().map(|p| (p.id, p.order)).collect();
        assert_eq!(orders, vec![(a.id, 0), (c.id, 1)]);

        assert!(matches!(
            PipelineService::delete(&db.pool, b.id).await.unwrap_err(),
            PipelineServiceError::PipelineNotFound
        ));
    }

    #[tokio::test]
    async fn test_create_stage_on_missing_pipeline() {
        let db = DBService::new_in_memory().await.unwrap();
        let err = PipelineService::create_stage(&db.pool, Uuid::new_v4(), CreateStage { name: "A".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineServiceError::PipelineNotFound));
    }
}
