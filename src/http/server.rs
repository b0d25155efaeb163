use actix::Addr;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::actors::{GetSystemHealth, HealthCheckActor, HealthStatus};
use crate::handlers::NotificationGenerator;
use crate::metrics::Metrics;
use crate::models::{to_iso_millis, AnalyticsRecord, EVENTS_COLLECTION};
use crate::store::{DocumentStore, Fields};

// ============================================================================
// HTTP Server - on-demand surface
// ============================================================================
//
// Routes:
// - POST /events                  - create an event document (producer API)
// - GET  /analytics/{user_id}     - read a user's event counter
// - POST /jobs/notifications/run  - run the notification job synchronously
// - GET  /health                  - aggregated component health
// - GET  /metrics                 - Prometheus exposition
//
// ============================================================================

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub generator: Arc<NotificationGenerator>,
    pub metrics: Arc<Metrics>,
    pub health: Addr<HealthCheckActor>,
}

/// Start the HTTP server and serve until shutdown.
pub async fn start_http_server(state: AppState, bind: (String, u16)) -> std::io::Result<()> {
    tracing::info!("Starting HTTP server on http://{}:{}", bind.0, bind.1);

    let state = web::Data::new(state);
    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind(bind)?
        .run()
        .await
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/events", web::post().to(create_event))
        .route("/analytics/{user_id}", web::get().to(user_analytics))
        .route(
            "/jobs/notifications/run",
            web::post().to(run_notification_job),
        )
        .route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

#[derive(Deserialize)]
struct EventIn {
    title: String,
    #[serde(default)]
    description: Option<String>,
    user_id: String,
}

async fn create_event(state: web::Data<AppState>, body: web::Json<EventIn>) -> impl Responder {
    let body = body.into_inner();

    let mut fields = Fields::new();
    fields.insert("title".to_string(), Value::from(body.title));
    if let Some(description) = body.description {
        fields.insert("description".to_string(), Value::from(description));
    }
    fields.insert("user_id".to_string(), Value::from(body.user_id));
    fields.insert(
        "created_at".to_string(),
        Value::from(to_iso_millis(Utc::now())),
    );

    match state.store.add(EVENTS_COLLECTION, fields.clone()).await {
        Ok(key) => HttpResponse::Ok().json(serde_json::json!({
            "id": key.id,
            "data": fields,
        })),
        Err(err) => {
            tracing::error!(error = %err, "Event creation failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "ok": false,
                "error": err.to_string(),
            }))
        }
    }
}

async fn user_analytics(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = path.into_inner();

    match state.store.get(&AnalyticsRecord::doc_key(&user_id)).await {
        Ok(fields) => {
            let record = AnalyticsRecord::from_fields(fields.as_ref());
            HttpResponse::Ok().json(serde_json::json!({
                "totalEvents": record.total_events,
            }))
        }
        Err(err) => {
            tracing::error!(user_id = %user_id, error = %err, "Analytics read failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "ok": false,
                "error": err.to_string(),
            }))
        }
    }
}

async fn run_notification_job(state: web::Data<AppState>) -> impl Responder {
    tracing::info!("On-demand notification job started");
    let started = Instant::now();

    match state.generator.generate_upcoming().await {
        Ok(generated) => {
            state.metrics.record_notification_job(
                "http",
                true,
                generated,
                started.elapsed().as_secs_f64(),
            );
            tracing::info!(generated, "On-demand notification job finished");
            HttpResponse::Ok().json(serde_json::json!({
                "ok": true,
                "generated": generated,
            }))
        }
        Err(err) => {
            state
                .metrics
                .record_notification_job("http", false, 0, started.elapsed().as_secs_f64());
            tracing::error!(error = %err, "On-demand notification job failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "ok": false,
                "error": err.to_string(),
            }))
        }
    }
}

async fn health_handler(state: web::Data<AppState>) -> impl Responder {
    match state.health.send(GetSystemHealth).await {
        Ok(health) => {
            let components: serde_json::Map<String, Value> = health
                .components
                .values()
                .map(|component| {
                    (
                        component.name.clone(),
                        Value::from(component.status.to_string()),
                    )
                })
                .collect();
            let body = serde_json::json!({
                "status": health.overall_status.to_string(),
                "service": "event-triggers",
                "components": components,
            });

            match health.overall_status {
                HealthStatus::Unhealthy(_) => HttpResponse::ServiceUnavailable().json(body),
                _ => HttpResponse::Ok().json(body),
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "Health check actor unreachable");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "status": "unknown" }))
        }
    }
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::UpdateHealth;
    use crate::store::{CreatedDocument, DocKey, MemoryStore, MergeFn, StoreError};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn state_with(store: Arc<dyn DocumentStore>) -> web::Data<AppState> {
        web::Data::new(AppState {
            store: store.clone(),
            generator: Arc::new(NotificationGenerator::new(store, 24)),
            metrics: Arc::new(Metrics::new().unwrap()),
            health: actix::Actor::start(HealthCheckActor::new()),
        })
    }

    /// Store stub that refuses every operation, for the failure paths.
    struct FailingStore;

    impl FailingStore {
        fn error() -> StoreError {
            StoreError::Unavailable("store offline".to_string())
        }
    }

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn get(&self, _key: &DocKey) -> Result<Option<Fields>, StoreError> {
            Err(Self::error())
        }

        async fn set_merge(&self, _key: &DocKey, _fields: Fields) -> Result<(), StoreError> {
            Err(Self::error())
        }

        async fn add(&self, _collection: &str, _fields: Fields) -> Result<DocKey, StoreError> {
            Err(Self::error())
        }

        async fn query_at_least(
            &self,
            _collection: &str,
            _field: &str,
            _lower_bound: &str,
        ) -> Result<Vec<(DocKey, Fields)>, StoreError> {
            Err(Self::error())
        }

        async fn transact_merge(
            &self,
            _key: &DocKey,
            _apply: MergeFn<'_>,
        ) -> Result<(), StoreError> {
            Err(Self::error())
        }

        fn watch_creates(&self, _collection: &str) -> broadcast::Receiver<CreatedDocument> {
            broadcast::channel(1).1
        }
    }

    #[actix_web::test]
    async fn test_run_job_with_no_events() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/jobs/notifications/run")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, json!({"ok": true, "generated": 0}));
    }

    #[actix_web::test]
    async fn test_created_event_is_picked_up_by_job() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/events")
            .set_json(json!({"title": "Launch", "user_id": "u2"}))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        assert!(created.get("id").is_some());
        assert_eq!(created["data"]["title"], json!("Launch"));

        let req = test::TestRequest::post()
            .uri("/jobs/notifications/run")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"ok": true, "generated": 1}));
    }

    #[actix_web::test]
    async fn test_run_job_failure_reports_error() {
        let state = state_with(Arc::new(FailingStore));
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/jobs/notifications/run")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], json!(false));
        assert!(body["error"].as_str().unwrap().contains("store offline"));
    }

    #[actix_web::test]
    async fn test_user_analytics_defaults_to_zero() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::get().uri("/analytics/u1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"totalEvents": 0}));
    }

    #[actix_web::test]
    async fn test_user_analytics_reads_counter() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_merge(&AnalyticsRecord::doc_key("u1"), {
                let mut fields = Fields::new();
                fields.insert("totalEvents".to_string(), Value::from(5));
                fields
            })
            .await
            .unwrap();

        let state = state_with(store);
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::get().uri("/analytics/u1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"totalEvents": 5}));
    }

    #[actix_web::test]
    async fn test_health_reports_components() {
        let state = state_with(Arc::new(MemoryStore::new()));
        state.health.do_send(UpdateHealth {
            component: "event_feed".to_string(),
            status: HealthStatus::Healthy,
            details: None,
        });

        let app =
            test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["service"], json!("event-triggers"));
    }
}
