// ============================================================================
// Handlers Module
// ============================================================================
//
// The two core operations, kept free of trigger plumbing so they are
// testable without the actor runtime or HTTP server:
// - analytics:     per-user event counter, updated transactionally
// - notifications: trailing-window batch generation of notification records
//
// ============================================================================

mod analytics;
mod notifications;

pub use analytics::{AnalyticsUpdater, UpdateOutcome};
pub use notifications::NotificationGenerator;
