use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;

use crate::ordering::Ordered;

/// A lost reason selected for one pipeline, with its position in that pipeline's list.
/// The scope is keyed on `lost_reason_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PipelineLostReason {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub lost_reason_id: Uuid,
    pub name: String, // Joined from lost_reasons
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Replace a pipeline's lost reason selection; the list order becomes the display order
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SetPipelineLostReasons {
    pub lost_reason_ids: Vec<Uuid>,
}

impl Ordered for PipelineLostReason {
    fn ordering_id(&self) -> Uuid {
        self.lost_reason_id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
}

impl PipelineLostReason {
    pub async fn find_by_pipeline_id<'e, E>(
        executor: E,
        pipeline_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, PipelineLostReason>(
            r#"SELECT plr.id, plr.pipeline_id, plr.lost_reason_id, lr.name, plr.sort_order,
                      plr.created_at, plr.updated_at
               FROM pipeline_lost_reasons plr
               JOIN lost_reasons lr ON lr.id = plr.lost_reason_id
               WHERE plr.pipeline_id = $1
                 AND plr.deleted_at IS NULL
                 AND lr.deleted_at IS NULL
               ORDER BY plr.sort_order ASC, plr.created_at ASC"#,
        )
        .bind(pipeline_id)
        .fetch_all(executor)
        .await
    }

    /// Pipelines whose live selection includes the given lost reason
    pub async fn find_pipeline_ids_by_lost_reason<'e, E>(
        executor: E,
        lost_reason_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, Uuid>(
            r#"SELECT DISTINCT pipeline_id
               FROM pipeline_lost_reasons
               WHERE lost_reason_id = $1 AND deleted_at IS NULL"#,
        )
        .bind(lost_reason_id)
        .fetch_all(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        pipeline_id: Uuid,
        lost_reason_id: Uuid,
        order: i64,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO pipeline_lost_reasons (id, pipeline_id, lost_reason_id, sort_order, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)"#,
        )
        .bind(Uuid::new_v4())
        .bind(pipeline_id)
        .bind(lost_reason_id)
        .bind(order)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn soft_delete_by_pipeline_id<'e, E>(
        executor: E,
        pipeline_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE pipeline_lost_reasons SET deleted_at = $2, updated_at = $2 WHERE pipeline_id = $1 AND deleted_at IS NULL",
        )
        .bind(pipeline_id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn soft_delete_by_lost_reason_id<'e, E>(
        executor: E,
        lost_reason_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE pipeline_lost_reasons SET deleted_at = $2, updated_at = $2 WHERE lost_reason_id = $1 AND deleted_at IS NULL",
        )
        .bind(lost_reason_id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
