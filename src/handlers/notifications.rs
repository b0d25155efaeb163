use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::models::{to_iso_millis, EventRecord, NotificationRecord, EVENTS_COLLECTION};
use crate::store::DocumentStore;

// ============================================================================
// Notification Generator
// ============================================================================
//
// Produces one notification record per event created within the trailing
// window. Each run is a stateless full re-scan of the window - no cursor,
// no job state. Notifications are keyed by (user id, event id), so a run
// that overlaps the previous window regenerates the same documents as an
// idempotent overwrite.
//
// ============================================================================

pub struct NotificationGenerator {
    store: Arc<dyn DocumentStore>,
    window: Duration,
}

impl NotificationGenerator {
    pub fn new(store: Arc<dyn DocumentStore>, window_hours: i64) -> Self {
        Self {
            store,
            window: Duration::hours(window_hours),
        }
    }

    /// Batch routine invoked by the scheduled and on-demand triggers.
    /// Returns the number of notifications written.
    pub async fn generate_upcoming(&self) -> anyhow::Result<usize> {
        self.generate_upcoming_at(Utc::now()).await
    }

    pub async fn generate_upcoming_at(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let since = to_iso_millis(now - self.window);
        let matches = self
            .store
            .query_at_least(EVENTS_COLLECTION, "created_at", &since)
            .await?;

        tracing::debug!(
            since = %since,
            candidates = matches.len(),
            "Scanning events for upcoming notifications"
        );

        let mut generated = 0usize;
        for (key, fields) in matches {
            let event = match EventRecord::from_fields(&fields) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(
                        key = %key,
                        error = %err,
                        "Skipping malformed event document"
                    );
                    continue;
                }
            };

            let user_id = match event.user_id.as_deref() {
                Some(user_id) => user_id,
                None => {
                    tracing::debug!(key = %key, "No user_id on event, skipping notification");
                    continue;
                }
            };

            let notification = NotificationRecord::upcoming(&event, &key.id, now);
            self.store
                .set_merge(
                    &NotificationRecord::doc_key(user_id, &key.id),
                    notification.into_fields(),
                )
                .await?;
            generated += 1;
        }

        tracing::info!(generated, since = %since, "Notifications generated");
        Ok(generated)
    }
}
