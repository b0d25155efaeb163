use actix::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::handlers::{AnalyticsUpdater, NotificationGenerator};
use crate::metrics::Metrics;
use crate::store::DocumentStore;

use super::event_feed::EventFeedActor;
use super::health_check::{GetSystemHealth, HealthCheckActor, HealthStatus, UpdateHealth};
use super::scheduler::SchedulerActor;

// ============================================================================
// Coordinator Actor - Orchestrates all system actors
// ============================================================================
//
// Responsibilities:
// - Manages lifecycle of child actors (EventFeedActor, SchedulerActor)
// - Reports startup health per component
// - Logs a periodic system-health summary
//
// Actor Hierarchy:
//   CoordinatorActor
//   ├── EventFeedActor   (reactive trigger)
//   ├── SchedulerActor   (scheduled trigger)
//   └── HealthCheckActor
//
// ============================================================================

const HEALTH_SUMMARY_INTERVAL: Duration = Duration::from_secs(30);

pub struct CoordinatorActor {
    store: Arc<dyn DocumentStore>,
    updater: Arc<AnalyticsUpdater>,
    generator: Arc<NotificationGenerator>,
    metrics: Arc<Metrics>,
    job_interval: Duration,
    event_feed: Option<Addr<EventFeedActor>>,
    scheduler: Option<Addr<SchedulerActor>>,
    health_check: Option<Addr<HealthCheckActor>>,
}

impl CoordinatorActor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        updater: Arc<AnalyticsUpdater>,
        generator: Arc<NotificationGenerator>,
        metrics: Arc<Metrics>,
        job_interval: Duration,
    ) -> Self {
        Self {
            store,
            updater,
            generator,
            metrics,
            job_interval,
            event_feed: None,
            scheduler: None,
            health_check: None,
        }
    }

    fn start_child_actors(&mut self) {
        tracing::info!("Starting child actors");

        let health_check = HealthCheckActor::new().start();
        self.health_check = Some(health_check.clone());

        let event_feed = EventFeedActor::new(
            self.store.clone(),
            self.updater.clone(),
            self.metrics.clone(),
            health_check.clone(),
        )
        .start();
        self.event_feed = Some(event_feed);

        health_check.do_send(UpdateHealth {
            component: "event_feed".to_string(),
            status: HealthStatus::Healthy,
            details: Some("Event feed started".to_string()),
        });

        let scheduler = SchedulerActor::new(
            self.generator.clone(),
            self.metrics.clone(),
            health_check.clone(),
            self.job_interval,
        )
        .start();
        self.scheduler = Some(scheduler);

        health_check.do_send(UpdateHealth {
            component: "notification_job".to_string(),
            status: HealthStatus::Healthy,
            details: Some("Scheduler started".to_string()),
        });

        tracing::info!("✅ All child actors started");
    }
}

impl Actor for CoordinatorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("CoordinatorActor started");
        self.start_child_actors();

        // Periodic system-health summary in the logs
        ctx.run_interval(HEALTH_SUMMARY_INTERVAL, |act, _ctx| {
            if let Some(ref health_check) = act.health_check {
                let health_check = health_check.clone();
                actix::spawn(async move {
                    match health_check.send(GetSystemHealth).await {
                        Ok(health) => match health.overall_status {
                            HealthStatus::Healthy => {
                                tracing::debug!("System health check: Healthy");
                            }
                            HealthStatus::Degraded(ref msg) => {
                                tracing::warn!("System health check: Degraded - {}", msg);
                            }
                            HealthStatus::Unhealthy(ref msg) => {
                                tracing::error!("System health check: Unhealthy - {}", msg);
                            }
                        },
                        Err(e) => {
                            tracing::error!("Failed to get system health: {}", e);
                        }
                    }
                });
            }
        });
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("CoordinatorActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<(), String>")]
pub struct Shutdown;

impl Handler<Shutdown> for CoordinatorActor {
    type Result = Result<(), String>;

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Received shutdown signal");

        // Stop child actors gracefully
        if let Some(ref event_feed) = self.event_feed {
            event_feed.do_send(StopActor);
        }

        if let Some(ref scheduler) = self.scheduler {
            scheduler.do_send(StopActor);
        }

        if let Some(ref health_check) = self.health_check {
            health_check.do_send(StopActor);
        }

        // Stop coordinator
        ctx.stop();

        Ok(())
    }
}

/// Message to gracefully stop an actor
#[derive(Message)]
#[rtype(result = "()")]
struct StopActor;

impl Handler<StopActor> for EventFeedActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("EventFeedActor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for SchedulerActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("SchedulerActor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for HealthCheckActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("HealthCheckActor received stop signal");
        ctx.stop();
    }
}

// ============================================================================
// Public API for accessing child actors
// ============================================================================

#[derive(Message)]
#[rtype(result = "Option<Addr<HealthCheckActor>>")]
pub struct GetHealthCheckActor;

impl Handler<GetHealthCheckActor> for CoordinatorActor {
    type Result = Option<Addr<HealthCheckActor>>;

    fn handle(&mut self, _: GetHealthCheckActor, _: &mut Self::Context) -> Self::Result {
        self.health_check.clone()
    }
}
