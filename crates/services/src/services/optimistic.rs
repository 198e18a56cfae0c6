//! Client-side ordered state with optimistic moves.
//!
//! A move is applied to the local list first and then sent to a
//! [`ReorderBackend`]. If the backend fails, the list goes back to exactly the
//! snapshot taken before the move. Nothing is retried.

use std::future::Future;

use async_trait::async_trait;
use db::ordering::{self, Ordered, ReorderError, Scope};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use super::reorder::{ReorderService, ReorderServiceError};

#[derive(Debug, Error)]
pub enum OptimisticError {
    /// Rejected locally; the list was never touched.
    #[error(transparent)]
    Rejected(#[from] ReorderError),
    /// The backend failed and the list was rolled back.
    #[error("persisting the move failed: {0}")]
    Backend(#[source] ReorderServiceError),
}

/// Where an optimistic move is persisted.
#[async_trait]
pub trait ReorderBackend: Send + Sync {
    async fn persist_move(
        &self,
        scope: Scope,
        moving_id: Uuid,
        target_index: i64,
    ) -> Result<(), ReorderServiceError>;
}

/// Persists moves straight into the database through [`ReorderService`].
#[derive(Clone)]
pub struct DatabaseBackend {
    pool: SqlitePool,
}

impl DatabaseBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReorderBackend for DatabaseBackend {
    async fn persist_move(
        &self,
        scope: Scope,
        moving_id: Uuid,
        target_index: i64,
    ) -> Result<(), ReorderServiceError> {
        ReorderService::move_item(&self.pool, scope, moving_id, target_index).await?;
        Ok(())
    }
}

/// Replace `slot` with `speculative`, run `op`, and put the previous value back if it fails.
pub async fn optimistic_update<T, R, E, F, Fut>(slot: &mut T, speculative: T, op: F) -> Result<R, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let snapshot = std::mem::replace(slot, speculative);
    match op().await {
        Ok(value) => Ok(value),
        Err(e) => {
            *slot = snapshot;
            Err(e)
        }
    }
}

/// Local copy of one scope, kept sorted by order.
#[derive(Debug, Clone)]
pub struct OptimisticList<T> {
    scope: Scope,
    items: Vec<T>,
}

impl<T: Ordered + Clone> OptimisticList<T> {
    pub fn new(scope: Scope, mut items: Vec<T>) -> Self {
        items.sort_by_key(|item| item.order());
        Self { scope, items }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|item| item.ordering_id()).collect()
    }

    /// Place a newly created item in the last slot and return the order it took.
    pub fn append(&mut self, mut item: T) -> i64 {
        let order = ordering::next_order(&self.items);
        item.set_order(order);
        self.items.push(item);
        order
    }

    /// Move `moving_id` to `target_index` locally, then persist it through `backend`.
    pub async fn move_item<B>(
        &mut self,
        moving_id: Uuid,
        target_index: i64,
        backend: &B,
    ) -> Result<(), OptimisticError>
    where
        B: ReorderBackend + ?Sized,
    {
        let plan = ordering::reorder(&self.items, moving_id, target_index)?;
        if plan.is_noop() {
            return Ok(());
        }

        let mut speculative = self.items.clone();
        plan.apply_to(&mut speculative);

        let scope = self.scope;
        optimistic_update(&mut self.items, speculative, || {
            backend.persist_move(scope, moving_id, target_index)
        })
        .await
        .map_err(|e| {
            warn!(scope = %scope, item_id = %moving_id, error = %e, "Reverting optimistic move");
            OptimisticError::Backend(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use db::{
        DBService,
        models::lost_reason::{CreateLostReason, LostReason},
        ordering::ReorderStoreError,
    };

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Card {
        id: Uuid,
        order: i64,
    }

    impl Ordered for Card {
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

    #[derive(Default)]
    struct RecordingBackend {
        fail: AtomicBool,
        calls: Mutex<Vec<(Uuid, i64)>>,
    }

    #[async_trait]
    impl ReorderBackend for RecordingBackend {
        async fn persist_move(
            &self,
            scope: Scope,
            moving_id: Uuid,
            target_index: i64,
        ) -> Result<(), ReorderServiceError> {
            self.calls.lock().unwrap().push((moving_id, target_index));
            if self.fail.load(Ordering::SeqCst) {
                return Err(ReorderStoreError::ScopeMismatch {
                    scope,
                    id: moving_id,
                }
                .into());
            }
            Ok(())
        }
    }

    fn cards(n: usize) -> Vec<Card> {
        (0..n)
            .map(|i| Card {
                id: Uuid::new_v4(),
                order: i as i64,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_move_applies_locally_and_persists() {
        let items = cards(4);
        let ids: Vec<Uuid> = items.iter().map(|c| c.id).collect();
        let mut list = OptimisticList::new(Scope::Pipelines, items);
        let backend = RecordingBackend::default();

        list.move_item(ids[0], 2, &backend).await.unwrap();

        assert_eq!(list.ids(), vec![ids[1], ids[2], ids[0], ids[3]]);
        let orders: Vec<i64> = list.items().iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
        assert_eq!(*backend.calls.lock().unwrap(), vec![(ids[0], 2)]);
    }

    #[tokio::test]
    async fn test_backend_failure_restores_snapshot() {
        let items = cards(3);
        let before = items.clone();
        let mut list = OptimisticList::new(Scope::LostReasons, items);
        let backend = RecordingBackend::default();
        backend.fail.store(true, Ordering::SeqCst);

        let err = list.move_item(before[2].id, 0, &backend).await.unwrap_err();

        assert!(matches!(err, OptimisticError::Backend(_)));
        assert_eq!(list.items(), &before[..]);
    }

    #[tokio::test]
    async fn test_invalid_move_never_reaches_backend() {
        let items = cards(2);
        let before = items.clone();
        let mut list = OptimisticList::new(Scope::Pipelines, items);
        let backend = RecordingBackend::default();

        let err = list.move_item(before[0].id, 5, &backend).await.unwrap_err();
        assert!(matches!(
            err,
            OptimisticError::Rejected(ReorderError::InvalidIndex { index: 5, len: 2 })
        ));

        // Dropping an item on its own slot is a no-op
        list.move_item(before[1].id, 1, &backend).await.unwrap();

        assert!(backend.calls.lock().unwrap().is_empty());
        assert_eq!(list.items(), &before[..]);
    }

    #[tokio::test]
    async fn test_appended_item_can_be_moved() {
        let items = cards(2);
        let ids: Vec<Uuid> = items.iter().map(|c| c.id).collect();
        let mut list = OptimisticList::new(Scope::Pipelines, items);
        let backend = RecordingBackend::default();

        let new_id = Uuid::new_v4();
        let order = list.append(Card {
            id: new_id,
            order: 99,
        });
        assert_eq!(order, 2);
        assert!(ordering::is_dense(list.items()));

        list.move_item(new_id, 0, &backend).await.unwrap();
        assert_eq!(list.ids(), vec![new_id, ids[0], ids[1]]);
        assert!(ordering::is_dense(list.items()));
    }

    #[tokio::test]
    async fn test_optimistic_update_single_value() {
        let mut name = "Lead".to_string();
        let ok: Result<(), &str> =
            optimistic_update(&mut name, "Qualified".to_string(), || async { Ok(()) }).await;
        assert!(ok.is_ok());
        assert_eq!(name, "Qualified");

        let err: Result<(), &str> =
            optimistic_update(&mut name, "Won".to_string(), || async { Err("offline") }).await;
        assert_eq!(err, Err("offline"));
        assert_eq!(name, "Qualified");
    }

    #[tokio::test]
    async fn test_database_backend_matches_local_order() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut reasons = Vec::new();
        for (index, name) in ["Price", "Timing", "Competitor"].iter().enumerate() {
            let reason = LostReason::create(
                &db.pool,
                Uuid::new_v4(),
                &CreateLostReason {
                    name: name.to_string(),
                    description: None,
                },
                index as i64,
            )
            .await
            .unwrap();
            reasons.push(reason);
        }
        let backend = DatabaseBackend::new(db.pool.clone());
        let mut list = OptimisticList::new(Scope::LostReasons, reasons);
        let moving = list.ids()[2];

        list.move_item(moving, 0, &backend).await.unwrap();

        let stored = LostReason::find_all(&db.pool).await.unwrap();
        let stored_ids: Vec<Uuid> = stored.iter().map(|r| r.id).collect();
        assert_eq!(stored_ids, list.ids());
    }
}
