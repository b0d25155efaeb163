use actix::prelude::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Health Check Actor - Monitors system health
// ============================================================================
//
// Responsibilities:
// - Track health status of all components
// - Aggregate system-wide health for the /health endpoint
// - Detect and report degraded states
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded(msg) => write!(f, "degraded: {msg}"),
            HealthStatus::Unhealthy(msg) => write!(f, "unhealthy: {msg}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub details: Option<String>,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

#[derive(Message)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

// ============================================================================
// Health Check Actor
// ============================================================================

pub struct HealthCheckActor {
    components: HashMap<String, ComponentHealth>,
}

impl HealthCheckActor {
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
        }
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => {
                    has_degraded = true;
                }
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy_components.is_empty() {
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Default for HealthCheckActor {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for HealthCheckActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("HealthCheckActor started");
    }
}

impl Handler<UpdateHealth> for HealthCheckActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateHealth, _: &mut Self::Context) {
        let health = ComponentHealth {
            name: msg.component.clone(),
            status: msg.status.clone(),
            last_check: Utc::now(),
            details: msg.details,
        };

        tracing::debug!(
            component = %msg.component,
            status = %msg.status,
            "Updated component health"
        );

        self.components.insert(msg.component, health);
    }
}

impl Handler<GetSystemHealth> for HealthCheckActor {
    type Result = MessageResult<GetSystemHealth>;

    fn handle(&mut self, _msg: GetSystemHealth, _: &mut Self::Context) -> Self::Result {
        let overall_status = self.compute_overall_status();

        MessageResult(SystemHealth {
            overall_status,
            components: self.components.clone(),
            check_time: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_component(actor: &mut HealthCheckActor, name: &str, status: HealthStatus) {
        actor.components.insert(
            name.to_string(),
            ComponentHealth {
                name: name.to_string(),
                status,
                last_check: Utc::now(),
                details: None,
            },
        );
    }

    #[test]
    fn test_empty_system_is_healthy() {
        let actor = HealthCheckActor::new();
        assert_eq!(actor.compute_overall_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_degraded_component_degrades_system() {
        let mut actor = HealthCheckActor::new();
        with_component(&mut actor, "event_feed", HealthStatus::Healthy);
        with_component(
            &mut actor,
            "notification_job",
            HealthStatus::Degraded("last run failed".to_string()),
        );

        assert!(matches!(
            actor.compute_overall_status(),
            HealthStatus::Degraded(_)
        ));
    }

    #[test]
    fn test_unhealthy_component_dominates() {
        let mut actor = HealthCheckActor::new();
        with_component(
            &mut actor,
            "notification_job",
            HealthStatus::Degraded("last run failed".to_string()),
        );
        with_component(
            &mut actor,
            "event_feed",
            HealthStatus::Unhealthy("feed closed".to_string()),
        );

        match actor.compute_overall_status() {
            HealthStatus::Unhealthy(msg) => assert!(msg.contains("event_feed")),
            other => panic!("expected unhealthy, got {other}"),
        }
    }
}
