//! Scope-aware persistence for [`ReorderPlan`]s.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{Ordered, ReorderPlan};
use crate::models::form_section::EntityType;

#[derive(Debug, Error)]
pub enum ReorderStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{id} is no longer a live member of {scope}")]
    ScopeMismatch { scope: Scope, id: Uuid },
}

/// A sibling group whose members share one dense ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Pipelines,
    Stages { pipeline_id: Uuid },
    LostReasons,
    PipelineLostReasons { pipeline_id: Uuid },
    FormSections { entity_type: EntityType },
    CustomFields { section_id: Uuid },
}

enum Partition {
    Id(&'static str, Uuid),
    EntityType(&'static str, EntityType),
}

impl Partition {
    fn column(&self) -> &'static str {
        match self {
            Partition::Id(column, _) | Partition::EntityType(column, _) => *column,
        }
    }
}

impl Scope {
    pub fn table(&self) -> &'static str {
        match self {
            Scope::Pipelines => "pipelines",
            Scope::Stages { .. } => "stages",
            Scope::LostReasons => "lost_reasons",
            Scope::PipelineLostReasons { .. } => "pipeline_lost_reasons",
            Scope::FormSections { .. } => "form_sections",
            Scope::CustomFields { .. } => "custom_fields",
        }
    }

    /// Column the move request identifies items by.
    pub fn key_column(&self) -> &'static str {
        match self {
            Scope::PipelineLostReasons { .. } => "lost_reason_id",
            _ => "id",
        }
    }

    fn partition(&self) -> Option<Partition> {
        match *self {
            Scope::Pipelines | Scope::LostReasons => None,
            Scope::Stages { pipeline_id } | Scope::PipelineLostReasons { pipeline_id } => {
                Some(Partition::Id("pipeline_id", pipeline_id))
            }
            Scope::FormSections { entity_type } => {
                Some(Partition::EntityType("entity_type", entity_type))
            }
            Scope::CustomFields { section_id } => Some(Partition::Id("section_id", section_id)),
        }
    }

    fn partition_clause(&self) -> String {
        match self.partition() {
            Some(partition) => format!(" AND {} = ?", partition.column()),
            None => String::new(),
        }
    }

    /// Live members of the scope in display order.
    pub async fn load<'e, E>(&self, executor: E) -> Result<Vec<OrderedRow>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {key} AS id, sort_order FROM {table} WHERE deleted_at IS NULL{partition} ORDER BY sort_order ASC, created_at ASC",
            key = self.key_column(),
            table = self.table(),
            partition = self.partition_clause(),
        );
        let query = sqlx::query_as::<_, OrderedRow>(&sql);
        let query = match self.partition() {
            Some(Partition::Id(_, id)) => query.bind(id),
            Some(Partition::EntityType(_, entity_type)) => query.bind(entity_type),
            None => query,
        };
        query.fetch_all(executor).await
    }

    /// Number of live members; the append slot for a new item.
    pub async fn count<'e, E>(&self, executor: E) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE deleted_at IS NULL{partition}",
            table = self.table(),
            partition = self.partition_clause(),
        );
        let query = sqlx::query_scalar::<_, i64>(&sql);
        let query = match self.partition() {
            Some(Partition::Id(_, id)) => query.bind(id),
            Some(Partition::EntityType(_, entity_type)) => query.bind(entity_type),
            None => query,
        };
        query.fetch_one(executor).await
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Pipelines => write!(f, "pipelines"),
            Scope::Stages { pipeline_id } => write!(f, "stages(pipeline={pipeline_id})"),
            Scope::LostReasons => write!(f, "lost_reasons"),
            Scope::PipelineLostReasons { pipeline_id } => {
                write!(f, "pipeline_lost_reasons(pipeline={pipeline_id})")
            }
            Scope::FormSections { entity_type } => {
                write!(f, "form_sections(entity_type={entity_type})")
            }
            Scope::CustomFields { section_id } => write!(f, "custom_fields(section={section_id})"),
        }
    }
}

/// Minimal projection of a scope member: its key and current order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct OrderedRow {
    pub id: Uuid,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: i64,
}

impl Ordered for OrderedRow {
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

/// Write the changed assignments of `plan` on an open connection or transaction.
///
/// Every statement is fenced by the scope partition and `deleted_at IS NULL`; a
/// statement that matches nothing aborts with [`ReorderStoreError::ScopeMismatch`].
/// Callers own the transaction and must not commit after an error.
pub async fn apply_plan(
    conn: &mut SqliteConnection,
    scope: &Scope,
    plan: &ReorderPlan,
) -> Result<usize, ReorderStoreError> {
    let sql = format!(
        "UPDATE {table} SET sort_order = ?, updated_at = ? WHERE {key} = ? AND deleted_at IS NULL{partition}",
        table = scope.table(),
        key = scope.key_column(),
        partition = scope.partition_clause(),
    );
    let now = Utc::now();
    let partition = scope.partition();

    let mut applied = 0;
    for change in plan.changes() {
        let query = sqlx::query(&sql).bind(change.order).bind(now).bind(change.id);
        let query = match &partition {
            Some(Partition::Id(_, id)) => query.bind(*id),
            Some(Partition::EntityType(_, entity_type)) => query.bind(*entity_type),
            None => query,
        };
        let result = query.execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            warn!(scope = %scope, id = %change.id, "Reorder target vanished from scope");
            return Err(ReorderStoreError::ScopeMismatch {
                scope: *scope,
                id: change.id,
            });
        }
        applied += 1;
    }
    Ok(applied)
}

/// Persist a plan atomically. Nothing is written unless every change lands.
pub async fn apply_reorder(
    pool: &SqlitePool,
    scope: &Scope,
    plan: &ReorderPlan,
) -> Result<usize, ReorderStoreError> {
    if plan.is_noop() {
        debug!(scope = %scope, "Reorder plan is a no-op, skipping write");
        return Ok(0);
    }

    let mut tx = crate::begin_write(pool).await?;
    let applied = apply_plan(&mut tx, scope, plan).await?;
    tx.commit().await?;

    info!(scope = %scope, applied, "Applied reorder");
    Ok(applied)
}
