use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::stage::Stage;
use crate::ordering::Ordered;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Pipeline {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PipelineWithStages {
    #[serde(flatten)]
    #[ts(flatten)]
    pub pipeline: Pipeline,
    pub stages: Vec<Stage>,
}

impl std::ops::Deref for PipelineWithStages {
    type Target = Pipeline;
    fn deref(&self) -> &Self::Target {
        &self.pipeline
    }
}

/// Initial stage supplied with a new pipeline
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct InitialStage {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePipeline {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub stages: Option<Vec<InitialStage>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdatePipeline {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl Ordered for Pipeline {
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

impl Pipeline {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Pipeline>(
            r#"SELECT id, name, description, icon, sort_order, created_at, updated_at, deleted_at
               FROM pipelines
               WHERE deleted_at IS NULL
               ORDER BY sort_order ASC, created_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    /// Live pipeline by id; soft-deleted rows are treated as absent
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Pipeline>(
            r#"SELECT id, name, description, icon, sort_order, created_at, updated_at, deleted_at
               FROM pipelines
               WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreatePipeline,
        order: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Pipeline>(
            r#"INSERT INTO pipelines (id, name, description, icon, sort_order, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $6)
               RETURNING id, name, description, icon, sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.icon)
        .bind(order)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Patch the descriptive fields; `None` keeps the stored value
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdatePipeline,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Pipeline>(
            r#"UPDATE pipelines
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   icon = COALESCE($4, icon),
                   updated_at = $5
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING id, name, description, icon, sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.icon)
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
            "UPDATE pipelines SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
