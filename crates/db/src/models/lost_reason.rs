use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::ordering::Ordered;

/// Reason a deal was lost; a global catalogue shared by all pipelines
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LostReason {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateLostReason {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateLostReason {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Ordered for LostReason {
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

impl LostReason {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LostReason>(
            r#"SELECT id, name, description, sort_order, created_at, updated_at, deleted_at
               FROM lost_reasons
               WHERE deleted_at IS NULL
               ORDER BY sort_order ASC, created_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, LostReason>(
            r#"SELECT id, name, description, sort_order, created_at, updated_at, deleted_at
               FROM lost_reasons
               WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateLostReason,
        order: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, LostReason>(
            r#"INSERT INTO lost_reasons (id, name, description, sort_order, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)
               RETURNING id, name, description, sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(order)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateLostReason,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LostReason>(
            r#"UPDATE lost_reasons
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   updated_at = $4
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING id, name, description, sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
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
            "UPDATE lost_reasons SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
