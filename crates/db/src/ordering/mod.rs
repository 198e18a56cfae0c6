//! Dense ordering of sibling records.
//!
//! Every reorderable entity (pipelines, stages, lost reasons, form sections,
//! custom fields) keeps an integer `order` that must stay `0..count` within its
//! [`Scope`]. The functions here are pure: they turn the current rows of one
//! scope plus a move request into a [`ReorderPlan`]. Persisting the plan is the
//! job of [`store`].

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

pub mod store;

pub use store::{OrderedRow, ReorderStoreError, Scope, apply_plan, apply_reorder};

/// A record that occupies a slot in an ordered scope.
pub trait Ordered {
    /// Identifier the scope is keyed on. For pipeline lost-reason links this is
    /// the lost reason id, not the link row id.
    fn ordering_id(&self) -> Uuid;
    fn order(&self) -> i64;
    fn set_order(&mut self, order: i64);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("item not found: {0}")]
    NotFound(Uuid),
    #[error("invalid target index {index} for {len} items")]
    InvalidIndex { index: i64, len: usize },
    #[error("expected {expected} ids, received {received}")]
    IdSetMismatch { expected: usize, received: usize },
    #[error("id does not belong to this scope: {0}")]
    UnknownId(Uuid),
    #[error("id listed more than once: {0}")]
    DuplicateId(Uuid),
}

/// New position for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAssignment {
    pub id: Uuid,
    pub previous: i64,
    pub order: i64,
}

impl OrderAssignment {
    pub fn is_change(&self) -> bool {
        self.previous != self.order
    }
}

/// Full assignment for a scope, sorted by the new order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderPlan {
    assignments: Vec<OrderAssignment>,
}

impl ReorderPlan {
    fn from_positions(mut assignments: Vec<OrderAssignment>) -> Self {
        assignments.sort_by_key(|a| a.order);
        Self { assignments }
    }

    pub fn assignments(&self) -> &[OrderAssignment] {
        &self.assignments
    }

    /// Only the assignments whose order actually differs. This is what gets written.
    pub fn changes(&self) -> impl Iterator<Item = &OrderAssignment> + '_ {
        self.assignments.iter().filter(|a| a.is_change())
    }

    pub fn change_count(&self) -> usize {
        self.changes().count()
    }

    pub fn is_noop(&self) -> bool {
        self.change_count() == 0
    }

    pub fn ordered_ids(&self) -> Vec<Uuid> {
        self.assignments.iter().map(|a| a.id).collect()
    }

    /// Apply the plan to a local copy of the scope and re-sort it.
    pub fn apply_to<T: Ordered>(&self, items: &mut [T]) {
        let by_id: HashMap<Uuid, i64> = self.assignments.iter().map(|a| (a.id, a.order)).collect();
        for item in items.iter_mut() {
            if let Some(order) = by_id.get(&item.ordering_id()) {
                item.set_order(*order);
            }
        }
        items.sort_by_key(|item| item.order());
    }
}

// Stable sort: rows sharing an order value keep the caller's sequence.
fn sorted_by_order<T: Ordered>(items: &[T]) -> Vec<&T> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by_key(|item| item.order());
    sorted
}

fn position_to_order(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}

/// Move `moving_id` so it ends up at `target_index`.
///
/// Positions come from the sorted index rather than the stored `order`, so a
/// scope that drifted (gaps left by an old delete) comes out dense again.
/// Only items between the old and new position shift, each by one slot.
pub fn reorder<T: Ordered>(
    items: &[T],
    moving_id: Uuid,
    target_index: i64,
) -> Result<ReorderPlan, ReorderError> {
    let sorted = sorted_by_order(items);

    let source = sorted
        .iter()
        .position(|item| item.ordering_id() == moving_id)
        .ok_or(ReorderError::NotFound(moving_id))?;

    let target = usize::try_from(target_index)
        .ok()
        .filter(|index| *index < sorted.len())
        .ok_or(ReorderError::InvalidIndex {
            index: target_index,
            len: sorted.len(),
        })?;

    let assignments = sorted
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let new_position = if position == source {
                target
            } else if source < position && position <= target {
                position - 1
            } else if target <= position && position < source {
                position + 1
            } else {
                position
            };
            OrderAssignment {
                id: item.ordering_id(),
                previous: item.order(),
                order: position_to_order(new_position),
            }
        })
        .collect();

    Ok(ReorderPlan::from_positions(assignments))
}

/// Reorder a whole scope from an explicit id sequence.
///
/// `ordered_ids` must list every item of the scope exactly once.
pub fn reorder_by_ids<T: Ordered>(
    items: &[T],
    ordered_ids: &[Uuid],
) -> Result<ReorderPlan, ReorderError> {
    if items.len() != ordered_ids.len() {
        return Err(ReorderError::IdSetMismatch {
            expected: items.len(),
            received: ordered_ids.len(),
        });
    }

    let current: HashMap<Uuid, i64> = items
        .iter()
        .map(|item| (item.ordering_id(), item.order()))
        .collect();

    let mut seen = HashSet::with_capacity(ordered_ids.len());
    let mut assignments = Vec::with_capacity(ordered_ids.len());
    for (position, id) in ordered_ids.iter().enumerate() {
        let previous = *current.get(id).ok_or(ReorderError::UnknownId(*id))?;
        if !seen.insert(*id) {
            return Err(ReorderError::DuplicateId(*id));
        }
        assignments.push(OrderAssignment {
            id: *id,
            previous,
            order: position_to_order(position),
        });
    }

    Ok(ReorderPlan::from_positions(assignments))
}

/// Renumber a scope to `0..count` keeping its relative order.
pub fn compact<T: Ordered>(items: &[T]) -> ReorderPlan {
    let assignments = sorted_by_order(items)
        .into_iter()
        .enumerate()
        .map(|(position, item)| OrderAssignment {
            id: item.ordering_id(),
            previous: item.order(),
            order: position_to_order(position),
        })
        .collect();
    ReorderPlan::from_positions(assignments)
}

/// Slot for a new item appended to a locally held scope.
pub fn next_order<T: Ordered>(items: &[T]) -> i64 {
    position_to_order(items.len())
}

/// True when the orders are exactly `0..count`.
pub fn is_dense<T: Ordered>(items: &[T]) -> bool {
    let mut orders: Vec<i64> = items.iter().map(Ordered::order).collect();
    orders.sort_unstable();
    orders
        .iter()
        .enumerate()
        .all(|(position, order)| *order == position_to_order(position))
}
