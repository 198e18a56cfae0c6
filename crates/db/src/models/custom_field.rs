use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Row, Sqlite, SqlitePool, Type, sqlite::SqliteRow};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use crate::ordering::Ordered;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "field_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Select,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CustomField {
    pub id: Uuid,
    pub section_id: Uuid, // Foreign key to FormSection
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub full_width: bool,
    pub multiple_select: bool,
    pub options: Option<Vec<String>>, // Choices for select fields, stored as JSON text
    #[serde(rename = "order")]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, SqliteRow> for CustomField {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let options: Option<String> = row.try_get("options")?;
        let options = options
            .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "options".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            section_id: row.try_get("section_id")?,
            name: row.try_get("name")?,
            field_type: row.try_get("field_type")?,
            required: row.try_get("required")?,
            full_width: row.try_get("full_width")?,
            multiple_select: row.try_get("multiple_select")?,
            options,
            order: row.try_get("sort_order")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCustomField {
    pub name: String,
    pub field_type: FieldType,
    pub required: Option<bool>,
    pub full_width: Option<bool>,
    pub multiple_select: Option<bool>,
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCustomField {
    pub name: Option<String>,
    pub field_type: Option<FieldType>,
    pub required: Option<bool>,
    pub full_width: Option<bool>,
    pub multiple_select: Option<bool>,
    pub options: Option<Vec<String>>,
}

/// Move a field into another section; it lands at the end of the target
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MoveCustomField {
    pub target_section_id: Uuid,
}

fn options_json(options: Option<&Vec<String>>) -> Result<Option<String>, sqlx::Error> {
    options
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

impl Ordered for CustomField {
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

impl CustomField {
    pub async fn find_by_section_id(
        pool: &SqlitePool,
        section_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CustomField>(
            r#"SELECT id, section_id, name, field_type, required, full_width, multiple_select, options,
                      sort_order, created_at, updated_at, deleted_at
               FROM custom_fields
               WHERE section_id = $1 AND deleted_at IS NULL
               ORDER BY sort_order ASC, created_at ASC"#,
        )
        .bind(section_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, CustomField>(
            r#"SELECT id, section_id, name, field_type, required, full_width, multiple_select, options,
                      sort_order, created_at, updated_at, deleted_at
               FROM custom_fields
               WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        section_id: Uuid,
        data: &CreateCustomField,
        order: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let options = options_json(data.options.as_ref())?;
        let now = Utc::now();
        sqlx::query_as::<_, CustomField>(
            r#"INSERT INTO custom_fields (id, section_id, name, field_type, required, full_width, multiple_select, options, sort_order, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
               RETURNING id, section_id, name, field_type, required, full_width, multiple_select, options,
                         sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(section_id)
        .bind(&data.name)
        .bind(data.field_type)
        .bind(data.required.unwrap_or(false))
        .bind(data.full_width.unwrap_or(false))
        .bind(data.multiple_select.unwrap_or(false))
        .bind(options)
        .bind(order)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateCustomField,
    ) -> Result<Option<Self>, sqlx::Error> {
        let options = options_json(data.options.as_ref())?;
        sqlx::query_as::<_, CustomField>(
            r#"UPDATE custom_fields
               SET name = COALESCE($2, name),
                   field_type = COALESCE($3, field_type),
                   required = COALESCE($4, required),
                   full_width = COALESCE($5, full_width),
                   multiple_select = COALESCE($6, multiple_select),
                   options = COALESCE($7, options),
                   updated_at = $8
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING id, section_id, name, field_type, required, full_width, multiple_select, options,
                         sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.field_type)
        .bind(data.required)
        .bind(data.full_width)
        .bind(data.multiple_select)
        .bind(options)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    /// Re-home a field; the caller supplies the append slot in the target section
    pub async fn move_to_section<'e, E>(
        executor: E,
        id: Uuid,
        section_id: Uuid,
        order: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, CustomField>(
            r#"UPDATE custom_fields
               SET section_id = $2, sort_order = $3, updated_at = $4
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING id, section_id, name, field_type, required, full_width, multiple_select, options,
                         sort_order, created_at, updated_at, deleted_at"#,
        )
        .bind(id)
        .bind(section_id)
        .bind(order)
        .bind(Utc::now())
        .fetch_optional(executor)
        .await
    }

    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE custom_fields SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn soft_delete_by_section_id<'e, E>(
        executor: E,
        section_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE custom_fields SET deleted_at = $2, updated_at = $2 WHERE section_id = $1 AND deleted_at IS NULL",
        )
        .bind(section_id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
