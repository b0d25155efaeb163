use actix::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::handlers::NotificationGenerator;
use crate::metrics::Metrics;

use super::health_check::{HealthCheckActor, HealthStatus, UpdateHealth};

// ============================================================================
// Scheduler Actor - the scheduled trigger
// ============================================================================
//
// Runs the notification generator on a fixed period (every 24 hours by
// default). Each run is a stateless single-shot invocation; a failed run is
// logged and reported to health, and the next tick starts fresh - there is
// no carried-over job state to resume.
//
// ============================================================================

pub struct SchedulerActor {
    generator: Arc<NotificationGenerator>,
    metrics: Arc<Metrics>,
    health: Addr<HealthCheckActor>,
    interval: Duration,
}

impl SchedulerActor {
    pub fn new(
        generator: Arc<NotificationGenerator>,
        metrics: Arc<Metrics>,
        health: Addr<HealthCheckActor>,
        interval: Duration,
    ) -> Self {
        Self {
            generator,
            metrics,
            health,
            interval,
        }
    }
}

impl Actor for SchedulerActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "SchedulerActor started"
        );

        ctx.run_interval(self.interval, |act, _ctx| {
            let generator = act.generator.clone();
            let metrics = act.metrics.clone();
            let health = act.health.clone();

            actix::spawn(async move {
                tracing::info!("Scheduled notification job started");
                let started = Instant::now();

                match generator.generate_upcoming().await {
                    Ok(generated) => {
                        metrics.record_notification_job(
                            "scheduled",
                            true,
                            generated,
                            started.elapsed().as_secs_f64(),
                        );
                        health.do_send(UpdateHealth {
                            component: "notification_job".to_string(),
                            status: HealthStatus::Healthy,
                            details: None,
                        });
                        tracing::info!(generated, "Scheduled notification job finished");
                    }
                    Err(err) => {
                        metrics.record_notification_job(
                            "scheduled",
                            false,
                            0,
                            started.elapsed().as_secs_f64(),
                        );
                        health.do_send(UpdateHealth {
                            component: "notification_job".to_string(),
                            status: HealthStatus::Degraded(err.to_string()),
                            details: None,
                        });
                        tracing::error!(error = %err, "Scheduled notification job failed");
                    }
                }
            });
        });
    }
}
