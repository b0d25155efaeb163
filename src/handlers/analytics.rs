use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::{AnalyticsRecord, EventRecord};
use crate::store::{CreatedDocument, DocumentStore};

// ============================================================================
// Analytics Updater
// ============================================================================
//
// Maintains a per-user running count of events. Invoked once per event
// document creation delivered on the store's creation feed; the feed is
// at-least-once and nothing here deduplicates by event id, so a duplicate
// delivery counts twice.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Counter incremented; carries the value that was written.
    Applied { user_id: String, total_events: u64 },
    /// Event carries no user id - logged, no write.
    SkippedMissingUser,
    /// Event document failed schema validation - logged, no write.
    SkippedMalformed,
}

impl UpdateOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateOutcome::Applied { .. } => "applied",
            UpdateOutcome::SkippedMissingUser => "skipped_missing_user",
            UpdateOutcome::SkippedMalformed => "skipped_malformed",
        }
    }
}

pub struct AnalyticsUpdater {
    store: Arc<dyn DocumentStore>,
}

impl AnalyticsUpdater {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Handle one event-document creation: read the user's analytics record
    /// inside a single-document transaction (absent reads as zero) and merge
    /// back the incremented counter, leaving unrelated fields untouched.
    pub async fn apply(&self, created: &CreatedDocument) -> anyhow::Result<UpdateOutcome> {
        let event = match EventRecord::from_fields(&created.fields) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(
                    key = %created.key,
                    error = %err,
                    "Skipping malformed event document"
                );
                return Ok(UpdateOutcome::SkippedMalformed);
            }
        };

        let user_id = match event.user_id {
            Some(user_id) => user_id,
            None => {
                tracing::info!(
                    key = %created.key,
                    "No user_id on event, skipping analytics update"
                );
                return Ok(UpdateOutcome::SkippedMissingUser);
            }
        };

        let key = AnalyticsRecord::doc_key(&user_id);
        // The transaction closure may run more than once; the last write wins,
        // so the committed value is whatever the final attempt stored here.
        let written = AtomicU64::new(0);
        self.store
            .transact_merge(&key, &|current| {
                let next = AnalyticsRecord::from_fields(current).total_events + 1;
                written.store(next, Ordering::SeqCst);
                AnalyticsRecord { total_events: next }.into_fields()
            })
            .await?;

        let total_events = written.load(Ordering::SeqCst);
        tracing::info!(
            user_id = %user_id,
            total_events,
            event_key = %created.key,
            "Analytics updated"
        );
        Ok(UpdateOutcome::Applied {
            user_id,
            total_events,
        })
    }
}
