use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Event-creation processing (per-outcome throughput, latency)
// - Notification job runs (per-trigger counts, generated totals, latency)
//
// All metrics are registered with Prometheus and scraped via /metrics.
//
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Event Processing Metrics
    pub events_processed: IntCounterVec,
    pub analytics_update_duration: Histogram,

    // Notification Job Metrics
    pub notification_jobs: IntCounterVec,
    pub notifications_generated: IntCounter,
    pub notification_job_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Event Processing Metrics
        let events_processed = IntCounterVec::new(
            Opts::new(
                "events_processed_total",
                "Event creations processed by the analytics updater",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(events_processed.clone()))?;

        let analytics_update_duration = Histogram::with_opts(
            HistogramOpts::new(
                "analytics_update_duration_seconds",
                "Analytics counter update duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(analytics_update_duration.clone()))?;

        // Notification Job Metrics
        let notification_jobs = IntCounterVec::new(
            Opts::new("notification_jobs_total", "Notification job runs"),
            &["trigger", "outcome"],
        )?;
        registry.register(Box::new(notification_jobs.clone()))?;

        let notifications_generated = IntCounter::new(
            "notifications_generated_total",
            "Notification records written by generator runs",
        )?;
        registry.register(Box::new(notifications_generated.clone()))?;

        let notification_job_duration = HistogramVec::new(
            HistogramOpts::new(
                "notification_job_duration_seconds",
                "Notification job duration",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["trigger"],
        )?;
        registry.register(Box::new(notification_job_duration.clone()))?;

        Ok(Self {
            registry,
            events_processed,
            analytics_update_duration,
            notification_jobs,
            notifications_generated,
            notification_job_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record one processed event creation
    pub fn record_event_processed(&self, outcome: &str, duration_secs: f64) {
        self.events_processed.with_label_values(&[outcome]).inc();
        self.analytics_update_duration.observe(duration_secs);
    }

    /// Helper to record one notification job run
    pub fn record_notification_job(
        &self,
        trigger: &str,
        success: bool,
        generated: usize,
        duration_secs: f64,
    ) {
        let outcome = if success { "success" } else { "failure" };
        self.notification_jobs
            .with_label_values(&[trigger, outcome])
            .inc();
        self.notifications_generated.inc_by(generated as u64);
        self.notification_job_duration
            .with_label_values(&[trigger])
            .observe(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_event_processed() {
        let metrics = Metrics::new().unwrap();
        metrics.record_event_processed("applied", 0.05);
        metrics.record_event_processed("skipped_missing_user", 0.001);

        let gathered = metrics.registry.gather();
        let processed = gathered
            .iter()
            .find(|m| m.name() == "events_processed_total")
            .unwrap();
        assert_eq!(processed.metric.len(), 2); // Two different outcome labels
    }

    #[test]
    fn test_record_notification_job() {
        let metrics = Metrics::new().unwrap();
        metrics.record_notification_job("scheduled", true, 3, 0.2);
        metrics.record_notification_job("http", true, 2, 0.1);

        let gathered = metrics.registry.gather();
        let generated = gathered
            .iter()
            .find(|m| m.name() == "notifications_generated_total")
            .unwrap();
        assert_eq!(generated.metric[0].counter.value, Some(5.0));

        let jobs = gathered
            .iter()
            .find(|m| m.name() == "notification_jobs_total")
            .unwrap();
        assert_eq!(jobs.metric.len(), 2); // Two different trigger labels
    }

    #[test]
    fn test_record_notification_job_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_notification_job("http", false, 0, 0.01);

        let gathered = metrics.registry.gather();
        let jobs = gathered
            .iter()
            .find(|m| m.name() == "notification_jobs_total")
            .unwrap();
        assert_eq!(jobs.metric[0].counter.value, Some(1.0));
    }
}
