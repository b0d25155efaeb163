// Private module declaration
mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;

use crate::utils::IsTransient;

// Re-export for public API
pub use memory::MemoryStore;

// ============================================================================
// Document Store Contract
// ============================================================================
//
// The one external collaborator of this service: a keyed document database
// providing reads, merge writes, range scans over a field, single-document
// transactions, and a change-notification feed for document creation.
//
// The contract is deliberately narrow:
// - Merge writes leave fields that are not in the write untouched.
// - `transact_merge` is a read-modify-write with serializable isolation per
//   document; conflicting concurrent transactions are retried by the store
//   implementation, not by callers.
// - The creation feed is at-least-once: a consumer may see the same
//   creation more than once and must not assume exactly-once delivery.
//
// ============================================================================

/// Loosely-typed field bag stored under a document key.
pub type Fields = serde_json::Map<String, Value>;

/// Closure run inside a single-document transaction. Receives the current
/// fields (None if the document is absent) and returns fields to merge back.
/// May be invoked more than once if the transaction is retried.
pub type MergeFn<'a> = &'a (dyn Fn(Option<&Fields>) -> Fields + Send + Sync);

/// Opaque document address: collection path plus document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocKey {
    pub collection: String,
    pub id: String,
}

impl DocKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document-creation notification delivered on the creation feed.
#[derive(Debug, Clone)]
pub struct CreatedDocument {
    pub key: DocKey,
    pub fields: Fields,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transaction on {key} conflicted with a concurrent write")]
    TransactionConflict { key: DocKey },

    #[error("transaction on {key} did not commit after {attempts} attempts")]
    TransactionContention { key: DocKey, attempts: u32 },

    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::TransactionConflict { .. } | StoreError::Unavailable(_)
        )
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document, or None if it is absent.
    async fn get(&self, key: &DocKey) -> Result<Option<Fields>, StoreError>;

    /// Merge-write a document, creating it if absent. Fields not present in
    /// `fields` keep their stored values.
    async fn set_merge(&self, key: &DocKey, fields: Fields) -> Result<(), StoreError>;

    /// Create a document with a generated id and publish it on the
    /// collection's creation feed.
    async fn add(&self, collection: &str, fields: Fields) -> Result<DocKey, StoreError>;

    /// Range scan: all documents in `collection` whose string field `field`
    /// is >= `lower_bound`, ordered by that field.
    async fn query_at_least(
        &self,
        collection: &str,
        field: &str,
        lower_bound: &str,
    ) -> Result<Vec<(DocKey, Fields)>, StoreError>;

    /// Run a read-modify-write cycle against a single document with
    /// serializable isolation. The store retries `apply` on conflicting
    /// concurrent transactions.
    async fn transact_merge(&self, key: &DocKey, apply: MergeFn<'_>) -> Result<(), StoreError>;

    /// Subscribe to document creations in `collection`.
    fn watch_creates(&self, collection: &str) -> broadcast::Receiver<CreatedDocument>;
}
