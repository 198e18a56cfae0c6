use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::ordering::Ordered;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Stage {
    pub id: Uuid,
    pub pipeline_id: Uuid, // Foreign key to Pipeline
    pub name: String,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateStage {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateStage {
    pub name: Option<String>,
}

impl Ordered for Stage {
    fn ordering_id(&self) -> Uuid {
        self.id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
}

impl Stage {
    pub async fn find_by_pipeline_id(
        pool: &SqlitePool,
        pipeline_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Stage>(
            r#"SELECT id, pipeline_id, name, sort_order, created_at, updated_at, deleted_at
               FROM stages
               WHERE pipeline_id = $1 AND deleted_at IS NULL
               ORDER BY sort_order ASC, created_at ASC"#,
        )
        .bind(pipeline_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Stage>(
            r#"SELECT id, pipeline_id, name, sort_order, created_at, updated_at, deleted_at
               FROM stages
               WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        pipeline_id: Uuid,
        data: &CreateStage,
        order: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Stage>(
            r#"INSERT INTO stages (id, pipeline_id, name, sort_order, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)
               RETURNING id, pipeline_id, name, sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(pipeline_id)
        .bind(&data.name)
        .bind(order)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateStage,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Stage>(
            r#"UPDATE stages
               SET name = COALESCE($2, name), updated_at = $3
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING id, pipeline_id, name, sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE stages SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Soft delete every live stage of a pipeline (used when the pipeline goes away)
    pub async fn soft_delete_by_pipeline_id<'e, E>(
        executor: E,
        pipeline_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE stages SET deleted_at = $2, updated_at = $2 WHERE pipeline_id = $1 AND deleted_at IS NULL",
        )
        .bind(pipeline_id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
