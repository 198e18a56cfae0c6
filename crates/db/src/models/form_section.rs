use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::custom_field::CustomField;
use crate::ordering::Ordered;

/// Record type a form section (and its custom fields) extends
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "entity_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityType {
    Company,
    Contact,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct FormSection {
    pub id: Uuid,
    pub name: String,
    pub entity_type: EntityType,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct FormSectionWithFields {
    #[serde(flatten)]
    #[ts(flatten)]
    pub section: FormSection,
    pub fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateFormSection {
    pub name: String,
    pub entity_type: EntityType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateFormSection {
    pub name: Option<String>,
}

impl Ordered for FormSection {
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

impl FormSection {
    /// Live sections, optionally restricted to one entity type
    pub async fn find_all(
        pool: &SqlitePool,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FormSection>(
            r#"SELECT id, name, entity_type, sort_order, created_at, updated_at, deleted_at
               FROM form_sections
               WHERE deleted_at IS NULL
                 AND ($1 IS NULL OR entity_type = $1)
               ORDER BY entity_type ASC, sort_order ASC, created_at ASC"#,
        )
        .bind(entity_type)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, FormSection>(
            r#"SELECT id, name, entity_type, sort_order, created_at, updated_at, deleted_at
               FROM form_sections
               WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateFormSection,
        order: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, FormSection>(
            r#"INSERT INTO form_sections (id, name, entity_type, sort_order, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)
               RETURNING id, name, entity_type, sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.entity_type)
        .bind(order)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateFormSection,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FormSection>(
            r#"UPDATE form_sections
               SET name = COALESCE($2, name), updated_at = $3
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING id, name, entity_type, sort_order, created_at, updated_at, deleted_at"#,
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
            "UPDATE form_sections SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
