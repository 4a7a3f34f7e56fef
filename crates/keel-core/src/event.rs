//! Domain event model.
//!
//! An [`Event`] is an immutable fact about one aggregate. Its `version` is
//! left at zero when the event is created and is assigned exactly once,
//! either by [`Aggregate::apply`](crate::aggregate::Aggregate) or by the
//! event store on append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::Clock;

/// Ordered key/value payload used for event data, metadata and state.
pub type Payload = serde_json::Map<String, Value>;

/// Converts an arbitrary JSON value into a [`Payload`].
///
/// Objects are taken as-is, `null` becomes an empty payload and any other
/// value is stored under the `"value"` key.
#[must_use]
pub fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        Value::Null => Payload::new(),
        other => {
            let mut map = Payload::new();
            map.insert("value".to_owned(), other);
            map
        }
    }
}

/// A single immutable domain event.
///
/// Serializes to `{id, event_type, aggregate_id, data, metadata, version,
/// timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// Type tag used to route the event to its handler.
    pub event_type: String,
    /// Aggregate this event belongs to. Empty until stamped.
    pub aggregate_id: String,
    /// Event payload.
    pub data: Payload,
    /// Free-form metadata (source, user, correlation, ...).
    pub metadata: Payload,
    /// Position in the aggregate stream, starting at 1. Zero until stamped.
    pub version: i64,
    /// Time the event was created.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates an unsequenced event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: Value, clock: &dyn Clock) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            aggregate_id: String::new(),
            data: into_payload(data),
            metadata: Payload::new(),
            version: 0,
            timestamp: clock.now(),
        }
    }

    /// Targets the event at a specific aggregate.
    #[must_use]
    pub fn for_aggregate(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = aggregate_id.into();
        self
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Assigns the stream position and owning aggregate.
    ///
    /// Called by the aggregate on `apply` and by stores on append; the
    /// store's assignment is authoritative.
    #[must_use]
    pub fn sequenced(mut self, aggregate_id: &str, version: i64) -> Self {
        aggregate_id.clone_into(&mut self.aggregate_id);
        self.version = version;
        self
    }

    /// Returns a data field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a data field as a string slice.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Returns a metadata entry.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use serde_json::json;

    #[test]
    fn test_new_event_is_unsequenced() {
        // Arrange
        let clock = FixedClock::at_default();
        let fixed_now = clock.now();

        // Act
        let event = Event::new("OrderCreated", json!({"total": 42}), &clock);

        // Assert
        assert_eq!(event.event_type, "OrderCreated");
        assert_eq!(event.version, 0);
        assert!(event.aggregate_id.is_empty());
        assert_eq!(event.timestamp, fixed_now);
        assert_eq!(event.field("total"), Some(&json!(42)));
    }

    #[test]
    fn test_event_serializes_with_wire_field_names() {
        // Arrange
        let clock = FixedClock::at_default();
        let event = Event::new("OrderShipped", json!({"carrier": "UPS"}), &clock)
            .with_metadata("source", "api")
            .sequenced("order-1", 2);

        // Act
        let wire = serde_json::to_value(&event).unwrap();

        // Assert
        let object = wire.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "aggregate_id",
                "data",
                "event_type",
                "id",
                "metadata",
                "timestamp",
                "version"
            ]
        );
        assert_eq!(wire["aggregate_id"], "order-1");
        assert_eq!(wire["version"], 2);
        assert_eq!(wire["metadata"]["source"], "api");
    }

    #[test]
    fn test_into_payload_wraps_scalars() {
        assert!(into_payload(Value::Null).is_empty());
        assert_eq!(into_payload(json!(7))["value"], json!(7));
        assert_eq!(into_payload(json!({"a": 1}))["a"], json!(1));
    }
}
