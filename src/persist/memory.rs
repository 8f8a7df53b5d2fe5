//! In-memory item store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{BoxedItem, TypeDescriptor};

use super::ItemStore;

type Factory = Arc<dyn Fn() -> BoxedItem + Send + Sync>;

/// A simple, insertion-ordered [`ItemStore`] kept entirely in memory.
///
/// Items are stored behind clone factories so each load hands out fresh
/// owned values. Cloning the store shares the underlying data.
#[derive(Clone, Default)]
pub struct InMemoryItemStore {
    // (type_id, tenant_id) -> [(item_id, factory)]
    items: Arc<Mutex<HashMap<(String, String), Vec<(String, Factory)>>>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an item under `(type_id, tenant_id, item_id)`.
    pub fn insert<T>(&self, type_id: &str, tenant_id: &str, item_id: &str, item: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut items = self.items.lock();
        let entries = items
            .entry((type_id.to_string(), tenant_id.to_string()))
            .or_default();
        let factory: Factory = Arc::new(move || Box::new(item.clone()) as BoxedItem);
        if let Some(existing) = entries.iter_mut().find(|(id, _)| id == item_id) {
            existing.1 = factory;
        } else {
            entries.push((item_id.to_string(), factory));
        }
    }

    /// Delete an item from one tenant.
    pub fn delete(&self, type_id: &str, tenant_id: &str, item_id: &str) {
        let mut items = self.items.lock();
        if let Some(entries) = items.get_mut(&(type_id.to_string(), tenant_id.to_string())) {
            entries.retain(|(id, _)| id != item_id);
        }
    }

    /// Item ids stored for `(type_id, tenant_id)`, in insertion order.
    pub fn item_ids(&self, type_id: &str, tenant_id: &str) -> Vec<String> {
        self.items
            .lock()
            .get(&(type_id.to_string(), tenant_id.to_string()))
            .map(|entries| entries.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }
}

impl ItemStore for InMemoryItemStore {
    fn load_items_for_tenant(
        &self,
        tenant_id: &str,
        descriptor: &TypeDescriptor,
    ) -> anyhow::Result<Vec<BoxedItem>> {
        let items = self.items.lock();
        let loaded = items
            .get(&(descriptor.type_id.clone(), tenant_id.to_string()))
            .map(|entries| entries.iter().map(|(_, factory)| factory()).collect())
            .unwrap_or_default();
        Ok(loaded)
    }

    fn remove(&self, item_id: &str, descriptor: &TypeDescriptor) -> anyhow::Result<()> {
        let mut items = self.items.lock();
        for ((type_id, _), entries) in items.iter_mut() {
            if type_id == &descriptor.type_id {
                entries.retain(|(id, _)| id != item_id);
            }
        }
        debug!("Removed item {} of type {}", item_id, descriptor.type_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Note {
        id: String,
        body: String,
    }

    fn descriptor(type_id: &str) -> TypeDescriptor {
        TypeDescriptor {
            type_id: type_id.to_string(),
            type_name: std::any::type_name::<Note>(),
            value_type: TypeId::of::<Note>(),
        }
    }

    #[test]
    fn test_load_is_tenant_scoped() {
        let store = InMemoryItemStore::new();
        store.insert(
            "note",
            "tenant-a",
            "n1",
            Note {
                id: "n1".into(),
                body: "a".into(),
            },
        );
        store.insert(
            "note",
            "tenant-b",
            "n2",
            Note {
                id: "n2".into(),
                body: "b".into(),
            },
        );

        let loaded = store
            .load_items_for_tenant("tenant-a", &descriptor("note"))
            .unwrap();
        assert_eq!(loaded.len(), 1);
        let note = loaded[0].downcast_ref::<Note>().unwrap();
        assert_eq!(note.id, "n1");
    }

    #[test]
    fn test_insert_overwrites_by_id_and_keeps_order() {
        let store = InMemoryItemStore::new();
        store.insert("note", "t", "n1", Note { id: "n1".into(), body: "1".into() });
        store.insert("note", "t", "n2", Note { id: "n2".into(), body: "2".into() });
        store.insert("note", "t", "n1", Note { id: "n1".into(), body: "updated".into() });

        assert_eq!(store.item_ids("note", "t"), vec!["n1", "n2"]);
        let loaded = store.load_items_for_tenant("t", &descriptor("note")).unwrap();
        let n1 = loaded[0].downcast_ref::<Note>().unwrap();
        assert_eq!(n1.body, "updated");
    }

    #[test]
    fn test_delete_is_tenant_scoped() {
        let store = InMemoryItemStore::new();
        store.insert("note", "t1", "n1", Note { id: "n1".into(), body: "a".into() });
        store.insert("note", "t2", "n1", Note { id: "n1".into(), body: "b".into() });

        store.delete("note", "t1", "n1");
        assert!(store.item_ids("note", "t1").is_empty());
        assert_eq!(store.item_ids("note", "t2"), vec!["n1"]);
    }

    #[test]
    fn test_remove_spans_tenants() {
        let store = InMemoryItemStore::new();
        store.insert("note", "t1", "n1", Note { id: "n1".into(), body: "a".into() });
        store.insert("note", "t2", "n1", Note { id: "n1".into(), body: "b".into() });

        store.remove("n1", &descriptor("note")).unwrap();
        assert!(store.item_ids("note", "t1").is_empty());
        assert!(store.item_ids("note", "t2").is_empty());
    }
}
