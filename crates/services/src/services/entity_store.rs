//! Keyed state container for client-side caches of loaded records.

use std::collections::HashMap;

use db::ordering::Ordered;
use uuid::Uuid;

/// Records keyed by id. Owned by whoever needs it and passed around by reference.
#[derive(Debug, Clone)]
pub struct EntityStore<T> {
    entries: HashMap<Uuid, T>,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> EntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Uuid) -> Option<&T> {
        self.entries.get(id)
    }

    /// Insert or replace, returning the previous value.
    pub fn set(&mut self, id: Uuid, value: T) -> Option<T> {
        self.entries.insert(id, value)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<T> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in no particular order.
    pub fn list(&self) -> Vec<&T> {
        self.entries.values().collect()
    }
}

impl<T: Ordered> EntityStore<T> {
    /// Build a store from a freshly loaded scope.
    pub fn from_ordered(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            entries: items
                .into_iter()
                .map(|item| (item.ordering_id(), item))
                .collect(),
        }
    }

    pub fn insert(&mut self, item: T) -> Option<T> {
        self.entries.insert(item.ordering_id(), item)
    }

    /// Entries sorted by their order, ties broken by id so the result is stable.
    pub fn list_ordered(&self) -> Vec<&T> {
        let mut items: Vec<&T> = self.entries.values().collect();
        items.sort_by_key(|item| (item.order(), item.ordering_id()));
        items
    }
}
