//! Launchpad Store is a document store adapter for the storefront's content collections.
//!
//! Every operation is first attempted against a remote document service. The first
//! time the remote path fails, the adapter switches permanently to a durable local
//! store seeded with default records, and replays the same logical operation there.
//! Callers see the same snapshot shape on both paths.
//!
//! ## Core Components
//! - [`model`]: Documents, references and the query algebra.
//! - [`engine`]: The local store (registry, query translator, persistence).
//! - [`sdk`]: The remote TCP client, the failover adapter and mode discovery.
//! - [`server`]: TCP daemon serving the document protocol.

pub mod engine;
pub mod model;
pub mod sdk;
pub mod server;

use async_trait::async_trait;
use thiserror::Error;

pub use model::{
    collection, doc, filter, order_by, query, Clause, CollectionRef, DocRef, Direction, Document,
    DocumentSnapshot, Fields, FilterOp, Query, RangeOp, Timestamp,
};

/// Errors returned to callers of the store.
#[derive(Error, Debug)]
pub enum Error {
    /// The collection is not part of the registry.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    /// No document with this id exists in the collection.
    #[error("document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// An I/O error occurred during persistence or network communication.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure of the remote path: network, auth, malformed request, quota.
///
/// Never surfaced to callers of [`sdk::FailoverStore`]; it triggers the switch to local mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote store unavailable: {reason}")]
pub struct RemoteUnavailable {
    pub reason: String,
}

impl RemoteUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Result of a remote store call.
pub type RemoteResult<T> = std::result::Result<T, RemoteUnavailable>;

/// Operations of the remote document service.
///
/// Reference and query construction are pure (see [`collection`], [`doc`], [`query`]);
/// only the calls below touch the network.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Runs a query. Results follow the query's ordering clauses, else store order.
    async fn read(&self, query: &Query) -> RemoteResult<Vec<DocumentSnapshot>>;
    /// Adds a document and returns its reference, including the assigned id.
    async fn add(&self, collection: &CollectionRef, data: Fields) -> RemoteResult<DocRef>;
    /// Merges `data` into an existing document. Fields not in `data` are untouched.
    async fn update(&self, doc: &DocRef, data: Fields) -> RemoteResult<()>;
    /// Removes a document.
    async fn delete(&self, doc: &DocRef) -> RemoteResult<()>;
}
