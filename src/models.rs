use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::store::{DocKey, Fields};

// ============================================================================
// Record Schemas
// ============================================================================
//
// The document store hands back loosely-typed field bags; these are the
// explicit schemas per record kind, validated at the store boundary so a
// malformed document is rejected (and logged by the caller) instead of
// silently propagating missing fields.
//
// ============================================================================

pub const EVENTS_COLLECTION: &str = "events";
pub const ANALYTICS_COLLECTION: &str = "analytics";

pub const UPCOMING_EVENT_TYPE: &str = "upcoming_event";
pub const DEFAULT_NOTIFICATION_TITLE: &str = "event";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` has unexpected type (expected {expected})")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// ISO-8601 with millisecond precision and `Z` suffix. The fixed width keeps
/// plain string comparison chronologically monotonic.
pub fn to_iso_millis(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Event record - created by an upstream producer, read-only here
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub created_at: String,
}

impl EventRecord {
    pub fn from_fields(fields: &Fields) -> Result<Self, ModelError> {
        let created_at = match fields.get("created_at") {
            Some(Value::String(value)) => value.clone(),
            Some(_) => {
                return Err(ModelError::WrongType {
                    field: "created_at",
                    expected: "string",
                })
            }
            None => return Err(ModelError::MissingField("created_at")),
        };

        Ok(Self {
            user_id: optional_string(fields, "user_id")?,
            title: optional_string(fields, "title")?,
            created_at,
        })
    }
}

/// Optional string field; null and empty values read as absent.
fn optional_string(fields: &Fields, name: &'static str) -> Result<Option<String>, ModelError> {
    match fields.get(name) {
        Some(Value::String(value)) if value.is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(ModelError::WrongType {
            field: name,
            expected: "string",
        }),
    }
}

// ============================================================================
// Analytics record - per-user counter, keyed by user id
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalyticsRecord {
    pub total_events: u64,
}

impl AnalyticsRecord {
    /// Absence of the document or of the counter field reads as zero; so
    /// does a counter of an unexpected type.
    pub fn from_fields(fields: Option<&Fields>) -> Self {
        let total_events = fields
            .and_then(|f| f.get("totalEvents"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Self { total_events }
    }

    pub fn doc_key(user_id: &str) -> DocKey {
        DocKey::new(ANALYTICS_COLLECTION, user_id)
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("totalEvents".to_string(), Value::from(self.total_events));
        fields
    }
}

// ============================================================================
// Notification record - keyed by (user id, event id)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub kind: String,
    pub title: String,
    pub created_at: String,
    pub event_id: String,
}

impl NotificationRecord {
    pub fn upcoming(event: &EventRecord, event_id: &str, generated_at: DateTime<Utc>) -> Self {
        Self {
            kind: UPCOMING_EVENT_TYPE.to_string(),
            title: event
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_string()),
            created_at: to_iso_millis(generated_at),
            event_id: event_id.to_string(),
        }
    }

    /// Notifications live in a per-user subcollection, one document per
    /// originating event, so regenerating is an idempotent overwrite.
    pub fn doc_key(user_id: &str, event_id: &str) -> DocKey {
        DocKey::new(format!("notifications/{user_id}/items"), event_id)
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("type".to_string(), Value::from(self.kind));
        fields.insert("title".to_string(), Value::from(self.title));
        fields.insert("created_at".to_string(), Value::from(self.created_at));
        fields.insert("event_id".to_string(), Value::from(self.event_id));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_event_record_from_complete_fields() {
        let event = EventRecord::from_fields(&fields(json!({
            "user_id": "u1",
            "title": "Launch",
            "created_at": "2024-01-01T00:00:00.000Z",
            "description": "extra fields are ignored"
        })))
        .unwrap();

        assert_eq!(event.user_id.as_deref(), Some("u1"));
        assert_eq!(event.title.as_deref(), Some("Launch"));
        assert_eq!(event.created_at, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_event_record_requires_created_at() {
        let err = EventRecord::from_fields(&fields(json!({"user_id": "u1"}))).unwrap_err();
        assert!(matches!(err, ModelError::MissingField("created_at")));

        let err =
            EventRecord::from_fields(&fields(json!({"user_id": "u1", "created_at": 42})))
                .unwrap_err();
        assert!(matches!(
            err,
            ModelError::WrongType {
                field: "created_at",
                ..
            }
        ));
    }

    #[test]
    fn test_event_record_absent_and_empty_user_id() {
        let no_field = EventRecord::from_fields(&fields(json!({
            "created_at": "2024-01-01T00:00:00.000Z"
        })))
        .unwrap();
        assert_eq!(no_field.user_id, None);

        let empty = EventRecord::from_fields(&fields(json!({
            "user_id": "",
            "created_at": "2024-01-01T00:00:00.000Z"
        })))
        .unwrap();
        assert_eq!(empty.user_id, None);

        let null = EventRecord::from_fields(&fields(json!({
            "user_id": null,
            "created_at": "2024-01-01T00:00:00.000Z"
        })))
        .unwrap();
        assert_eq!(null.user_id, None);
    }

    #[test]
    fn test_analytics_record_reads_absent_as_zero() {
        assert_eq!(AnalyticsRecord::from_fields(None).total_events, 0);

        let empty = fields(json!({}));
        assert_eq!(AnalyticsRecord::from_fields(Some(&empty)).total_events, 0);

        let wrong_type = fields(json!({"totalEvents": "three"}));
        assert_eq!(
            AnalyticsRecord::from_fields(Some(&wrong_type)).total_events,
            0
        );

        let populated = fields(json!({"totalEvents": 7}));
        assert_eq!(
            AnalyticsRecord::from_fields(Some(&populated)).total_events,
            7
        );
    }

    #[test]
    fn test_analytics_record_round_trip() {
        let written = AnalyticsRecord { total_events: 3 }.into_fields();
        assert_eq!(written.get("totalEvents"), Some(&json!(3)));
        assert_eq!(AnalyticsRecord::doc_key("u1").to_string(), "analytics/u1");
    }

    #[test]
    fn test_notification_title_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let untitled = EventRecord {
            user_id: Some("u1".to_string()),
            title: None,
            created_at: "2024-06-01T10:00:00.000Z".to_string(),
        };

        let notification = NotificationRecord::upcoming(&untitled, "e1", now);
        assert_eq!(notification.kind, "upcoming_event");
        assert_eq!(notification.title, "event");
        assert_eq!(notification.created_at, "2024-06-01T12:00:00.000Z");
        assert_eq!(notification.event_id, "e1");
    }

    #[test]
    fn test_notification_doc_key_layout() {
        let key = NotificationRecord::doc_key("u2", "e42");
        assert_eq!(key.collection, "notifications/u2/items");
        assert_eq!(key.id, "e42");
    }

    #[test]
    fn test_iso_millis_formatting() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(to_iso_millis(timestamp), "2024-01-01T00:00:00.000Z");
    }
}
