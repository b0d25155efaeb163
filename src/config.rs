use std::env;
use std::fmt::Display;
use std::str::FromStr;

// ============================================================================
// Configuration - environment-driven with defaults
// ============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP bind address
    pub http_bind: String,
    /// HTTP port
    pub http_port: u16,
    /// Trailing window scanned by the notification generator, in hours
    pub window_hours: i64,
    /// Period of the scheduled notification job, in hours
    pub job_interval_hours: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            http_bind: env::var("HTTP_BIND").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_or(env::var("HTTP_PORT").ok(), "HTTP_PORT", 8080),
            window_hours: parse_or(
                env::var("NOTIFICATION_WINDOW_HOURS").ok(),
                "NOTIFICATION_WINDOW_HOURS",
                24,
            ),
            job_interval_hours: parse_or(
                env::var("NOTIFICATION_JOB_INTERVAL_HOURS").ok(),
                "NOTIFICATION_JOB_INTERVAL_HOURS",
                24,
            ),
        }
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match raw {
        None => default,
        Some(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(
                    name,
                    value = %value,
                    default = %default,
                    "Invalid configuration value, using default"
                );
                default
            }
        },
    }
}
