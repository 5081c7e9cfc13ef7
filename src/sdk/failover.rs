use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::engine::LocalStore;
use crate::model::{doc, CollectionRef, DocRef, DocumentSnapshot, Fields, Query};
use crate::{RemoteStore, RemoteUnavailable, Result};

/// Document store that prefers a remote service and falls back to a [`LocalStore`].
///
/// The first [`RemoteUnavailable`] from any call switches this instance to local
/// mode for the rest of its lifetime; the failed operation is replayed locally and
/// its local result returned. Callers never see `RemoteUnavailable`.
pub struct FailoverStore {
    remote: Option<Arc<dyn RemoteStore>>,
    local: Arc<LocalStore>,
    local_mode: AtomicBool,
}

impl FailoverStore {
    pub fn new(remote: Arc<dyn RemoteStore>, local: Arc<LocalStore>) -> Self {
        Self {
            remote: Some(remote),
            local,
            local_mode: AtomicBool::new(false),
        }
    }

    /// A store with no remote configured; it starts in local mode.
    pub fn local_only(local: Arc<LocalStore>) -> Self {
        Self {
            remote: None,
            local,
            local_mode: AtomicBool::new(true),
        }
    }

    pub fn is_local_mode(&self) -> bool {
        self.local_mode.load(Ordering::SeqCst)
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// The remote to try, or `None` once local mode is active.
    fn remote(&self) -> Option<&dyn RemoteStore> {
        if self.is_local_mode() {
            return None;
        }
        self.remote.as_deref()
    }

    fn fall_back(&self, collection: &str, op: &str, err: &RemoteUnavailable) {
        if !self.local_mode.swap(true, Ordering::SeqCst) {
            warn!(
                "{} on '{}' failed ({}); switching to local store",
                op, collection, err
            );
        } else {
            debug!("{} on '{}' failed after switch to local store: {}", op, collection, err);
        }
    }

    /// Runs `query`, returning snapshots in the query's order.
    pub async fn get_docs(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        if let Some(remote) = self.remote() {
            match remote.read(query).await {
                Ok(docs) => return Ok(docs),
                Err(e) => self.fall_back(query.collection(), "getDocs", &e),
            }
        }
        Ok(self
            .local
            .query(query)
            .into_iter()
            .map(DocumentSnapshot::from)
            .collect())
    }

    /// Adds a document to `collection` and returns its reference.
    pub async fn add_doc(&self, collection: &CollectionRef, data: Fields) -> Result<DocRef> {
        if let Some(remote) = self.remote() {
            match remote.add(collection, data.clone()).await {
                Ok(r) => return Ok(r),
                Err(e) => self.fall_back(collection.name(), "addDoc", &e),
            }
        }
        let id = self.local.add(collection.name(), data)?;
        Ok(doc(collection.name(), id))
    }

    /// Merges `data` into the referenced document.
    pub async fn update_doc(&self, doc_ref: &DocRef, data: Fields) -> Result<()> {
        if let Some(remote) = self.remote() {
            match remote.update(doc_ref, data.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => self.fall_back(doc_ref.collection(), "updateDoc", &e),
            }
        }
        self.local.update(doc_ref.collection(), doc_ref.id(), data)
    }

    /// Removes the referenced document.
    pub async fn delete_doc(&self, doc_ref: &DocRef) -> Result<()> {
        if let Some(remote) = self.remote() {
            match remote.delete(doc_ref).await {
                Ok(()) => return Ok(()),
                Err(e) => self.fall_back(doc_ref.collection(), "deleteDoc", &e),
            }
        }
        self.local.delete(doc_ref.collection(), doc_ref.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CollectionSpec, Registry};
    use crate::model::{collection, filter, order_by, query, Direction, Document, FilterOp};
    use crate::{Error, RemoteResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> Registry {
        Registry::new(vec![CollectionSpec::new(
            "products",
            vec![
                Document::from_json("a", json!({ "name": "A", "price": 10 })),
                Document::from_json("b", json!({ "name": "B", "price": 20 })),
            ],
        )])
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    /// Remote double backed by its own local store; fails from call `fail_from` on.
    struct FlakyRemote {
        backing: LocalStore,
        calls: AtomicUsize,
        fail_from: usize,
    }

    impl FlakyRemote {
        fn new(fail_from: usize) -> Self {
            Self {
                backing: LocalStore::new(registry(), None),
                calls: AtomicUsize::new(0),
                fail_from,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn tick(&self) -> RemoteResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.fail_from {
                return Err(RemoteUnavailable::new("network partition"));
            }
            Ok(())
        }
    }

    fn remote_err(e: Error) -> RemoteUnavailable {
        RemoteUnavailable::new(e.to_string())
    }

    #[async_trait]
    impl RemoteStore for FlakyRemote {
        async fn read(&self, query: &Query) -> RemoteResult<Vec<DocumentSnapshot>> {
            self.tick()?;
            Ok(self.backing.query(query).into_iter().map(DocumentSnapshot::from).collect())
        }

        async fn add(&self, collection: &CollectionRef, data: Fields) -> RemoteResult<DocRef> {
            self.tick()?;
            let id = self.backing.add(collection.name(), data).map_err(remote_err)?;
            Ok(doc(collection.name(), id))
        }

        async fn update(&self, doc: &DocRef, data: Fields) -> RemoteResult<()> {
            self.tick()?;
            self.backing.update(doc.collection(), doc.id(), data).map_err(remote_err)
        }

        async fn delete(&self, doc: &DocRef) -> RemoteResult<()> {
            self.tick()?;
            self.backing.delete(doc.collection(), doc.id()).map_err(remote_err)
        }
    }

    fn store_with(remote: Arc<FlakyRemote>) -> FailoverStore {
        FailoverStore::new(remote, Arc::new(LocalStore::new(registry(), None)))
    }

    #[tokio::test]
    async fn test_healthy_remote_serves_reads() {
        let remote = Arc::new(FlakyRemote::new(usize::MAX));
        let store = store_with(remote.clone());

        let q = query(&collection("products"), [filter("price", FilterOp::Ge, 15)]);
        let docs = store.get_docs(&q).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data(), &fields(json!({ "name": "B", "price": 20 })));
        assert_eq!(remote.calls(), 1);
        assert!(!store.is_local_mode());
    }

    #[tokio::test]
    async fn test_first_failure_switches_and_replays_locally() {
        let remote = Arc::new(FlakyRemote::new(1));
        let store = store_with(remote.clone());

        let q = query(&collection("products"), [filter("price", FilterOp::Ge, 15)]);
        let docs = store.get_docs(&q).await.unwrap();

        assert!(store.is_local_mode());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id(), "b");
        assert_eq!(docs[0].get("name"), Some(&json!("B")));
    }

    #[tokio::test]
    async fn test_mode_is_monotonic() {
        let remote = Arc::new(FlakyRemote::new(2));
        let store = store_with(remote.clone());
        let products = collection("products");

        store.get_docs(&Query::new(&products)).await.unwrap();
        assert!(!store.is_local_mode());

        store.add_doc(&products, fields(json!({ "name": "C" }))).await.unwrap();
        assert!(store.is_local_mode());
        assert_eq!(remote.calls(), 2);

        store.get_docs(&Query::new(&products)).await.unwrap();
        store.update_doc(&doc("products", "a"), fields(json!({ "price": 11 }))).await.unwrap();
        store.delete_doc(&doc("products", "b")).await.unwrap();
        assert_eq!(remote.calls(), 2);
        assert!(store.is_local_mode());
    }

    #[tokio::test]
    async fn test_failover_results_match_healthy_remote() {
        async fn run(store: &FailoverStore) -> Vec<(String, Fields)> {
            let products = collection("products");
            store.update_doc(&doc("products", "a"), fields(json!({ "price": 25 }))).await.unwrap();
            store.delete_doc(&doc("products", "b")).await.unwrap();
            store.add_doc(&products, fields(json!({ "name": "C", "price": 5 }))).await.unwrap();
            let q = query(&products, [order_by("price", Direction::Desc)]);
            store
                .get_docs(&q)
                .await
                .unwrap()
                .into_iter()
                .map(|s| (s.get("name").cloned().unwrap_or_default().to_string(), s.into_data()))
                .collect()
        }

        let healthy = store_with(Arc::new(FlakyRemote::new(usize::MAX)));
        let failing = store_with(Arc::new(FlakyRemote::new(1)));

        let expected = run(&healthy).await;
        let actual = run(&failing).await;
        assert!(!healthy.is_local_mode());
        assert!(failing.is_local_mode());
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_local_errors_surface_after_switch() {
        let store = FailoverStore::local_only(Arc::new(LocalStore::new(registry(), None)));

        let missing = store.update_doc(&doc("products", "missing-id"), fields(json!({ "a": 1 }))).await;
        assert!(matches!(missing, Err(Error::DocumentNotFound { .. })));

        let unknown = store.add_doc(&collection("orders"), Fields::new()).await;
        assert!(matches!(unknown, Err(Error::UnknownCollection(_))));

        let empty = store.get_docs(&Query::new(&collection("nonexistent"))).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_through_failover() {
        let store = store_with(Arc::new(FlakyRemote::new(1)));
        store
            .update_doc(&doc("products", "a"), fields(json!({ "price": 12, "id": "99" })))
            .await
            .unwrap();

        let docs = store.get_docs(&Query::new(&collection("products"))).await.unwrap();
        assert_eq!(docs[0].id(), "a");
        assert_eq!(docs[0].data(), &fields(json!({ "name": "A", "price": 12 })));
    }
}
