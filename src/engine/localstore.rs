use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::engine::{query, CollectionSpec, Persistence, Registry};
use crate::model::{Document, Fields, Query};
use crate::{Error, Result};

type Lists = HashMap<String, Vec<Document>>;

/// Durable per-collection document lists.
///
/// A collection that was never written reads as its registry defaults. The
/// first write persists the whole list, and from then on the persisted list is
/// authoritative, also across restarts. Every operation runs under one lock
/// and persists before returning.
pub struct LocalStore {
    registry: Registry,
    lists: RwLock<Lists>,
    persistence: Option<Arc<Persistence>>,
}

impl LocalStore {
    /// Creates a store over `registry`. Without `persistence` the store is memory-only.
    pub fn new(registry: Registry, persistence: Option<Arc<Persistence>>) -> Self {
        Self {
            registry,
            lists: RwLock::new(HashMap::new()),
            persistence,
        }
    }

    /// Registered collection names, in registration order.
    pub fn collections(&self) -> Vec<String> {
        self.registry.names()
    }

    fn spec(&self, name: &str) -> Result<&CollectionSpec> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::UnknownCollection(name.to_string()))
    }

    fn read_through(&self, spec: &CollectionSpec) -> Vec<Document> {
        self.persistence
            .as_ref()
            .and_then(|p| p.load_collection(spec.storage_key()))
            .unwrap_or_else(|| spec.defaults().to_vec())
    }

    /// Returns the current document list of a collection.
    pub fn load(&self, name: &str) -> Result<Vec<Document>> {
        let spec = self.spec(name)?;
        {
            let lists = self.lists.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(docs) = lists.get(name) {
                return Ok(docs.clone());
            }
        }
        let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
        let docs = lists
            .entry(name.to_string())
            .or_insert_with(|| self.read_through(spec));
        Ok(docs.clone())
    }

    /// Runs a query against the local lists. Unknown collections read as empty.
    pub fn query(&self, q: &Query) -> Vec<Document> {
        match self.load(q.collection()) {
            Ok(docs) => query::apply(q, docs),
            Err(_) => Vec::new(),
        }
    }

    /// Applies `change` to a copy of the collection's list, persists the copy and
    /// only then makes it current.
    fn mutate<T>(&self, name: &str, change: impl FnOnce(&mut Vec<Document>) -> Result<T>) -> Result<T> {
        let spec = self.spec(name)?;
        let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
        let mut docs = match lists.get(name) {
            Some(docs) => docs.clone(),
            None => self.read_through(spec),
        };

        let out = change(&mut docs)?;

        if let Some(p) = &self.persistence {
            p.save_collection(spec.storage_key(), &docs)?;
        }
        lists.insert(name.to_string(), docs);
        Ok(out)
    }

    /// Appends a new document and returns its generated id.
    ///
    /// An `id` key inside `data` is ignored.
    pub fn add(&self, name: &str, data: Fields) -> Result<String> {
        self.mutate(name, |docs| {
            let id = loop {
                let candidate = generate_id()?;
                if !docs.iter().any(|d| d.id == candidate) {
                    break candidate;
                }
            };
            docs.push(Document::new(id.clone(), data));
            Ok(id)
        })
    }

    /// Shallow-merges `patch` into document `id`. The id itself never changes.
    pub fn update(&self, name: &str, id: &str, patch: Fields) -> Result<()> {
        self.mutate(name, |docs| {
            let doc = docs
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| not_found(name, id))?;
            doc.merge(patch);
            Ok(())
        })
    }

    /// Removes document `id`.
    pub fn delete(&self, name: &str, id: &str) -> Result<()> {
        self.mutate(name, |docs| {
            let pos = docs
                .iter()
                .position(|d| d.id == id)
                .ok_or_else(|| not_found(name, id))?;
            docs.remove(pos);
            Ok(())
        })
    }

    /// Drops persisted and cached state so the collection reads as its defaults again.
    pub fn reset(&self, name: &str) -> Result<()> {
        let spec = self.spec(name)?;
        let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(p) = &self.persistence {
            p.remove(spec.storage_key())?;
        }
        lists.remove(name);
        Ok(())
    }
}

fn not_found(collection: &str, id: &str) -> Error {
    Error::DocumentNotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

/// 128 random bits, hex encoded.
fn generate_id() -> Result<String> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{collection, filter, order_by, Direction, FilterOp};
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn registry() -> Registry {
        Registry::new(vec![CollectionSpec::new(
            "products",
            vec![
                Document::from_json("a", json!({ "name": "A", "price": 10 })),
                Document::from_json("b", json!({ "name": "B", "price": 20 })),
            ],
        )])
    }

    #[test]
    fn test_untouched_collection_reads_defaults() {
        let store = LocalStore::new(registry(), None);
        let docs = store.load("products").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
    }

    #[test]
    fn test_defaults_not_persisted_until_first_write() {
        let dir = tempdir().unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()).unwrap());
        let store = LocalStore::new(registry(), Some(persistence));

        store.load("products").unwrap();
        assert!(!dir.path().join("launchpad.products.json").exists());

        store.add("products", fields(json!({ "name": "C" }))).unwrap();
        assert!(dir.path().join("launchpad.products.json").exists());
    }

    #[test]
    fn test_add_survives_restart() {
        let dir = tempdir().unwrap();
        let id = {
            let persistence = Arc::new(Persistence::new(dir.path()).unwrap());
            let store = LocalStore::new(registry(), Some(persistence));
            store.add("products", fields(json!({ "name": "C", "price": 30 }))).unwrap()
        };

        let persistence = Arc::new(Persistence::new(dir.path()).unwrap());
        let store = LocalStore::new(registry(), Some(persistence));
        let docs = store.load("products").unwrap();
        assert_eq!(docs.len(), 3);
        let added = docs.iter().find(|d| d.id == id).unwrap();
        assert_eq!(added.fields, fields(json!({ "name": "C", "price": 30 })));
    }

    #[test]
    fn test_add_assigns_fresh_ids() {
        let store = LocalStore::new(registry(), None);
        let first = store.add("products", fields(json!({ "id": "a", "name": "C" }))).unwrap();
        let second = store.add("products", fields(json!({ "name": "D" }))).unwrap();

        assert_ne!(first, "a");
        assert_ne!(first, second);
        assert_eq!(first.len(), 32);
        assert_eq!(store.load("products").unwrap().len(), 4);
    }

    #[test]
    fn test_update_merges_and_keeps_id() {
        let store = LocalStore::new(registry(), None);
        store.update("products", "a", fields(json!({ "price": 15, "id": "z" }))).unwrap();

        let docs = store.load("products").unwrap();
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].fields, fields(json!({ "name": "A", "price": 15 })));
    }

    #[test]
    fn test_missing_document_and_unknown_collection() {
        let store = LocalStore::new(registry(), None);
        assert!(matches!(
            store.update("products", "missing", Fields::new()),
            Err(Error::DocumentNotFound { .. })
        ));
        assert!(matches!(store.delete("products", "missing"), Err(Error::DocumentNotFound { .. })));
        assert!(matches!(
            store.add("orders", Fields::new()),
            Err(Error::UnknownCollection(name)) if name == "orders"
        ));
        assert!(store.query(&Query::new(&collection("orders"))).is_empty());
    }

    #[test]
    fn test_delete_removes_and_persists() {
        let dir = tempdir().unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()).unwrap());
        let store = LocalStore::new(registry(), Some(persistence.clone()));
        store.delete("products", "a").unwrap();

        let fresh = LocalStore::new(registry(), Some(persistence));
        let ids: Vec<String> = fresh.load("products").unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_corrupt_persisted_data_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("launchpad.products.json"), "[{\"id\": 1").unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()).unwrap());
        let store = LocalStore::new(registry(), Some(persistence));

        let docs = store.load("products").unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_query_filters_and_orders() {
        let store = LocalStore::new(registry(), None);
        let q = crate::model::query(&collection("products"), [filter("price", FilterOp::Ge, 15)]);
        let docs = store.query(&q);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields, fields(json!({ "name": "B", "price": 20 })));

        let q = crate::model::query(&collection("products"), [order_by("price", Direction::Desc)]);
        let ids: Vec<String> = store.query(&q).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let dir = tempdir().unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()).unwrap());
        let store = LocalStore::new(registry(), Some(persistence));
        store.delete("products", "a").unwrap();
        store.reset("products").unwrap();

        assert_eq!(store.load("products").unwrap().len(), 2);
        assert!(!dir.path().join("launchpad.products.json").exists());
    }
}
