use actix::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::handlers::AnalyticsUpdater;
use crate::metrics::Metrics;
use crate::models::EVENTS_COLLECTION;
use crate::store::{CreatedDocument, DocumentStore};

use super::health_check::{HealthCheckActor, HealthStatus, UpdateHealth};

// ============================================================================
// Event Feed Actor - the reactive trigger
// ============================================================================
//
// Subscribes to the store's creation feed for the events collection and
// invokes the analytics updater once per delivered creation. Delivery is
// at-least-once; a duplicate delivery increments the counter again (no
// dedup by event id). A failed update is logged and surfaced through
// metrics - retry policy belongs to the platform, not this consumer.
//
// ============================================================================

pub struct EventFeedActor {
    store: Arc<dyn DocumentStore>,
    updater: Arc<AnalyticsUpdater>,
    metrics: Arc<Metrics>,
    health: Addr<HealthCheckActor>,
}

impl EventFeedActor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        updater: Arc<AnalyticsUpdater>,
        metrics: Arc<Metrics>,
        health: Addr<HealthCheckActor>,
    ) -> Self {
        Self {
            store,
            updater,
            metrics,
            health,
        }
    }
}

impl Actor for EventFeedActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(collection = EVENTS_COLLECTION, "EventFeedActor started");

        let mut feed = self.store.watch_creates(EVENTS_COLLECTION);
        let updater = self.updater.clone();
        let metrics = self.metrics.clone();
        let health = self.health.clone();

        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(created) => {
                        consume_create(&updater, &metrics, &created).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Event feed lagged, creations were dropped");
                        health.do_send(UpdateHealth {
                            component: "event_feed".to_string(),
                            status: HealthStatus::Degraded(format!(
                                "feed lagged, {missed} creations dropped"
                            )),
                            details: None,
                        });
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::error!("Event feed closed, reactive trigger stopped");
                        health.do_send(UpdateHealth {
                            component: "event_feed".to_string(),
                            status: HealthStatus::Unhealthy("feed closed".to_string()),
                            details: None,
                        });
                        break;
                    }
                }
            }
        });
    }
}

/// Process one delivered creation. Fire-and-forget: nothing consumes a
/// return value, so failures surface only through logs and metrics.
async fn consume_create(
    updater: &AnalyticsUpdater,
    metrics: &Metrics,
    created: &CreatedDocument,
) {
    tracing::debug!(key = %created.key, "Received event creation");

    let started = Instant::now();
    match updater.apply(created).await {
        Ok(outcome) => {
            metrics.record_event_processed(outcome.label(), started.elapsed().as_secs_f64());
        }
        Err(err) => {
            tracing::error!(
                key = %created.key,
                error = %err,
                "Analytics update failed"
            );
            metrics.record_event_processed("failed", started.elapsed().as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ANALYTICS_COLLECTION;
    use crate::store::{DocKey, Fields, MemoryStore};
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_consume_create_updates_analytics() {
        let store = Arc::new(MemoryStore::new());
        let updater = AnalyticsUpdater::new(store.clone());
        let metrics = Metrics::new().unwrap();

        let mut feed = store.watch_creates(EVENTS_COLLECTION);
        store
            .add(
                EVENTS_COLLECTION,
                fields(json!({"user_id": "u1", "created_at": "2024-01-01T00:00:00.000Z"})),
            )
            .await
            .unwrap();

        let created = feed.recv().await.unwrap();
        consume_create(&updater, &metrics, &created).await;

        let doc = store
            .get(&DocKey::new(ANALYTICS_COLLECTION, "u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.get("totalEvents"), Some(&json!(1)));
        assert_eq!(
            metrics.events_processed.with_label_values(&["applied"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn test_consume_create_records_skips() {
        let store = Arc::new(MemoryStore::new());
        let updater = AnalyticsUpdater::new(store.clone());
        let metrics = Metrics::new().unwrap();

        let created = CreatedDocument {
            key: DocKey::new(EVENTS_COLLECTION, "e1"),
            fields: fields(json!({"created_at": "2024-01-01T00:00:00.000Z"})),
        };
        consume_create(&updater, &metrics, &created).await;

        assert_eq!(
            metrics
                .events_processed
                .with_label_values(&["skipped_missing_user"])
                .get(),
            1
        );
    }
}
