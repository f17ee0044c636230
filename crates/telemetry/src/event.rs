use chrono::{DateTime, Utc};
use serde::Serialize;

/// A timestamped occurrence worth a single structured log line
#[derive(Debug, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub event_type: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: crate::session_id(),
            event_type: event_type.into(),
            data,
        }
    }

    /// Emit at warn level; events mark something an operator should see.
    pub fn log(&self) {
        tracing::warn!(
            event_type = %self.event_type,
            timestamp = %self.timestamp.to_rfc3339(),
            data = %self.data,
            "event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_carries_session() {
        let event = Event::new("security.alert", serde_json::json!({ "tampered": true }));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event_type"], "security.alert");
        assert_eq!(value["session_id"], crate::session_id());
        assert_eq!(value["data"]["tampered"], true);
    }
}
