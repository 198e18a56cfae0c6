//! Service that moves items inside an ordered scope and persists the result.
//!
//! Every reorderable entity goes through here: the endpoint names the [`Scope`],
//! the service loads the scope's live rows, computes the plan and writes it in
//! one transaction. Concurrent reorders of the same scope are last-commit-wins.

use db::ordering::{
    self, OrderedRow, ReorderError, ReorderPlan, ReorderStoreError, Scope, apply_plan,
};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReorderServiceError {
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error(transparent)]
    Store(#[from] ReorderStoreError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct ReorderService;

impl ReorderService {
    /// Move one item of `scope` to `target_index` and return the scope's new order.
    pub async fn move_item(
        pool: &SqlitePool,
        scope: Scope,
        moving_id: Uuid,
        target_index: i64,
    ) -> Result<Vec<OrderedRow>, ReorderServiceError> {
        let mut tx = db::begin_write(pool).await?;
        let rows = scope.load(&mut *tx).await?;
        let plan = ordering::reorder(&rows, moving_id, target_index)?;

        Self::commit_plan(tx, scope, &plan).await?;
        info!(
            scope = %scope,
            item_id = %moving_id,
            target_index,
            changed = plan.change_count(),
            "Moved item"
        );
        Ok(Self::resulting_order(&plan))
    }

    /// Replace the whole order of `scope` with `ordered_ids`.
    pub async fn reorder_by_ids(
        pool: &SqlitePool,
        scope: Scope,
        ordered_ids: &[Uuid],
    ) -> Result<Vec<OrderedRow>, ReorderServiceError> {
        let mut tx = db::begin_write(pool).await?;
        let rows = scope.load(&mut *tx).await?;
        let plan = ordering::reorder_by_ids(&rows, ordered_ids)?;

        Self::commit_plan(tx, scope, &plan).await?;
        info!(scope = %scope, changed = plan.change_count(), "Reordered scope from id list");
        Ok(Self::resulting_order(&plan))
    }

    /// Renumber a drifted scope back to `0..count`.
    pub async fn compact(
        pool: &SqlitePool,
        scope: Scope,
    ) -> Result<Vec<OrderedRow>, ReorderServiceError> {
        let mut tx = db::begin_write(pool).await?;
        let rows = scope.load(&mut *tx).await?;
        let plan = ordering::compact(&rows);

        Self::commit_plan(tx, scope, &plan).await?;
        if !plan.is_noop() {
            info!(scope = %scope, changed = plan.change_count(), "Compacted scope");
        }
        Ok(Self::resulting_order(&plan))
    }

    /// Compact `scope` on a connection the caller already holds in a transaction,
    /// typically right after soft-deleting one of its members.
    pub async fn compact_in(
        conn: &mut SqliteConnection,
        scope: Scope,
    ) -> Result<usize, ReorderStoreError> {
        let rows = scope.load(&mut *conn).await?;
        let plan = ordering::compact(&rows);
        let applied = apply_plan(conn, &scope, &plan).await?;
        if applied > 0 {
            debug!(scope = %scope, applied, "Closed gap after delete");
        }
        Ok(applied)
    }

    async fn commit_plan(
        mut tx: sqlx::Transaction<'_, sqlx::Sqlite>,
        scope: Scope,
        plan: &ReorderPlan,
    ) -> Result<(), ReorderServiceError> {
        if plan.is_noop() {
            debug!(scope = %scope, "Reorder is a no-op");
            return Ok(());
        }

        if let Err(e) = apply_plan(&mut tx, &scope, plan).await {
            error!(scope = %scope, error = %e, "Reorder failed, rolling back");
            return Err(e.into());
        }
        tx.commit().await?;
        Ok(())
    }

    fn resulting_order(plan: &ReorderPlan) -> Vec<OrderedRow> {
        plan.assignments()
            .iter()
            .map(|a| OrderedRow {
                id: a.id,
                order: a.order,
            })
            .collect()
    }
}
