use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

use super::{CreatedDocument, DocKey, DocumentStore, Fields, MergeFn, StoreError};

// ============================================================================
// In-Memory Document Store Backend
// ============================================================================
//
// In-process stand-in for the external document database, carrying the
// store-side responsibilities of the contract:
//
// - merge writes overlay the written fields onto the stored document;
// - single-document transactions use optimistic versioning: the document
//   version observed at read time must still be current at commit time,
//   otherwise the transaction is re-run with backoff;
// - every document creation is published on the owning collection's
//   broadcast feed.
//
// ============================================================================

/// Buffered creations per collection feed before slow subscribers lag.
const CREATE_FEED_CAPACITY: usize = 256;

struct VersionedDoc {
    version: u64,
    fields: Fields,
}

pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, VersionedDoc>>>,
    feeds: Mutex<HashMap<String, broadcast::Sender<CreatedDocument>>>,
    conflict_retry: RetryConfig,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            feeds: Mutex::new(HashMap::new()),
            conflict_retry: RetryConfig {
                max_attempts: 32,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
            },
        }
    }

    fn publish_create(&self, key: &DocKey, fields: Fields) {
        let feeds = self.feeds.lock().expect("creation feed lock poisoned");
        if let Some(tx) = feeds.get(&key.collection) {
            // Send only fails when there are no live subscribers.
            let _ = tx.send(CreatedDocument {
                key: key.clone(),
                fields,
            });
        }
    }

    /// One optimistic attempt of a single-document transaction.
    async fn try_transact(&self, key: &DocKey, apply: MergeFn<'_>) -> Result<(), StoreError> {
        // Snapshot outside the write lock so `apply` never runs under it.
        let snapshot = {
            let collections = self.collections.read().await;
            collections
                .get(&key.collection)
                .and_then(|col| col.get(&key.id))
                .map(|doc| (doc.version, doc.fields.clone()))
        };

        let updates = match &snapshot {
            Some((_, fields)) => apply(Some(fields)),
            None => apply(None),
        };
        let seen_version = snapshot.map(|(version, _)| version);

        let mut collections = self.collections.write().await;
        let col = collections.entry(key.collection.clone()).or_default();

        let created = match col.get_mut(&key.id) {
            Some(doc) => {
                if seen_version != Some(doc.version) {
                    return Err(StoreError::TransactionConflict { key: key.clone() });
                }
                merge_into(&mut doc.fields, updates);
                doc.version += 1;
                None
            }
            None => {
                if seen_version.is_some() {
                    // Document vanished between snapshot and commit.
                    return Err(StoreError::TransactionConflict { key: key.clone() });
                }
                col.insert(
                    key.id.clone(),
                    VersionedDoc {
                        version: 1,
                        fields: updates.clone(),
                    },
                );
                Some(updates)
            }
        };
        drop(collections);

        if let Some(fields) = created {
            self.publish_create(key, fields);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &DocKey) -> Result<Option<Fields>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&key.collection)
            .and_then(|col| col.get(&key.id))
            .map(|doc| doc.fields.clone()))
    }

    async fn set_merge(&self, key: &DocKey, fields: Fields) -> Result<(), StoreError> {
        let created = {
            let mut collections = self.collections.write().await;
            let col = collections.entry(key.collection.clone()).or_default();
            match col.get_mut(&key.id) {
                Some(doc) => {
                    merge_into(&mut doc.fields, fields);
                    doc.version += 1;
                    None
                }
                None => {
                    col.insert(
                        key.id.clone(),
                        VersionedDoc {
                            version: 1,
                            fields: fields.clone(),
                        },
                    );
                    Some(fields)
                }
            }
        };

        if let Some(fields) = created {
            self.publish_create(key, fields);
        }
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<DocKey, StoreError> {
        let key = DocKey::new(collection, Uuid::new_v4().to_string());
        {
            let mut collections = self.collections.write().await;
            let col = collections.entry(collection.to_string()).or_default();
            col.insert(
                key.id.clone(),
                VersionedDoc {
                    version: 1,
                    fields: fields.clone(),
                },
            );
        }

        tracing::debug!(key = %key, "Document created");
        self.publish_create(&key, fields);
        Ok(key)
    }

    async fn query_at_least(
        &self,
        collection: &str,
        field: &str,
        lower_bound: &str,
    ) -> Result<Vec<(DocKey, Fields)>, StoreError> {
        let collections = self.collections.read().await;
        let mut matches: Vec<(DocKey, Fields)> = match collections.get(collection) {
            Some(col) => col
                .iter()
                .filter(|(_, doc)| {
                    doc.fields
                        .get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|value| value >= lower_bound)
                })
                .map(|(id, doc)| (DocKey::new(collection, id.clone()), doc.fields.clone()))
                .collect(),
            None => Vec::new(),
        };
        drop(collections);

        matches.sort_by(|(_, a), (_, b)| {
            let a = a.get(field).and_then(Value::as_str).unwrap_or_default();
            let b = b.get(field).and_then(Value::as_str).unwrap_or_default();
            a.cmp(b)
        });
        Ok(matches)
    }

    async fn transact_merge(&self, key: &DocKey, apply: MergeFn<'_>) -> Result<(), StoreError> {
        let attempts = self.conflict_retry.max_attempts;
        let result = retry_on_transient(self.conflict_retry.clone(), |_attempt| {
            self.try_transact(key, apply)
        })
        .await;

        match result {
            RetryResult::Success(()) => Ok(()),
            RetryResult::Failed(_) => Err(StoreError::TransactionContention {
                key: key.clone(),
                attempts,
            }),
            RetryResult::PermanentFailure(err) => Err(err),
        }
    }

    fn watch_creates(&self, collection: &str) -> broadcast::Receiver<CreatedDocument> {
        let mut feeds = self.feeds.lock().expect("creation feed lock poisoned");
        feeds
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(CREATE_FEED_CAPACITY).0)
            .subscribe()
    }
}

fn merge_into(existing: &mut Fields, updates: Fields) {
    for (name, value) in updates {
        existing.insert(name, value);
    }
}
