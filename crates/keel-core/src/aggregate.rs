//! Aggregate root abstraction and the generic event-sourced aggregate.
//!
//! Event handlers are registered explicitly in an [`EventHandlers`] table
//! keyed by event type tag. The table is built once per aggregate type and
//! shared by every instance through an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::{Event, Payload};
use crate::snapshot::Snapshot;

/// Default untyped aggregate state.
pub type StateMap = Payload;

/// A state transition for one event type.
pub type EventHandlerFn<S> = fn(&mut S, &Event);

/// Registration table from event type tag to state transition.
pub struct EventHandlers<S> {
    handlers: HashMap<String, EventHandlerFn<S>>,
}

impl<S> EventHandlers<S> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `event_type`, replacing any earlier entry.
    #[must_use]
    pub fn on(mut self, event_type: impl Into<String>, handler: EventHandlerFn<S>) -> Self {
        self.handlers.insert(event_type.into(), handler);
        self
    }

    /// Looks up the handler for an event type.
    #[must_use]
    pub fn get(&self, event_type: &str) -> Option<EventHandlerFn<S>> {
        self.handlers.get(event_type).copied()
    }

    /// Returns `true` if a handler is registered for the event type.
    #[must_use]
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Number of registered event types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<S> Default for EventHandlers<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for EventHandlers<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut event_types: Vec<&String> = self.handlers.keys().collect();
        event_types.sort();
        f.debug_struct("EventHandlers")
            .field("event_types", &event_types)
            .finish()
    }
}

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Send + Sync {
    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &str;

    /// Returns the current version (number of events applied).
    fn version(&self) -> i64;

    /// Applies a new event: dispatches it, assigns `version + 1` and
    /// records it as uncommitted.
    fn apply(&mut self, event: Event);

    /// Resets state and version, then replays `events` in order.
    /// Uncommitted events are left untouched.
    fn load_from_events(&mut self, events: &[Event]);

    /// Replays `events` on top of the current state without resetting.
    fn replay(&mut self, events: &[Event]);

    /// Returns uncommitted events produced since the last commit.
    fn uncommitted_events(&self) -> &[Event];

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self);

    /// Materializes the current state as a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the state does not
    /// serialize to a JSON object.
    fn snapshot(&self, clock: &dyn Clock) -> Result<Snapshot, DomainError>;

    /// Replaces state and version with the snapshot's.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the snapshot belongs to another
    /// aggregate and `DomainError::Infrastructure` if its state cannot be
    /// deserialized.
    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), DomainError>;
}

/// Event-sourced aggregate over a state type `S`.
pub struct Aggregate<S = StateMap> {
    id: String,
    version: i64,
    state: S,
    uncommitted_events: Vec<Event>,
    handlers: Arc<EventHandlers<S>>,
}

impl<S: Default> Aggregate<S> {
    /// Creates an empty aggregate at version 0.
    #[must_use]
    pub fn new(id: impl Into<String>, handlers: Arc<EventHandlers<S>>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            state: S::default(),
            uncommitted_events: Vec::new(),
            handlers,
        }
    }

    /// Creates an empty aggregate with a random UUID identifier.
    #[must_use]
    pub fn with_generated_id(handlers: Arc<EventHandlers<S>>) -> Self {
        Self::new(Uuid::new_v4().to_string(), handlers)
    }
}

impl<S> Aggregate<S> {
    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    fn dispatch(&mut self, event: &Event) {
        match self.handlers.get(&event.event_type) {
            Some(handler) => handler(&mut self.state, event),
            None => debug!(
                aggregate_id = %self.id,
                event_type = %event.event_type,
                version = event.version,
                "no handler registered for event type; state unchanged"
            ),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Aggregate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregate")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("uncommitted_events", &self.uncommitted_events.len())
            .finish_non_exhaustive()
    }
}

impl<S> AggregateRoot for Aggregate<S>
where
    S: Default + Serialize + DeserializeOwned + Send + Sync,
{
    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: Event) {
        let aggregate_id = if event.aggregate_id.is_empty() {
            self.id.clone()
        } else {
            event.aggregate_id.clone()
        };
        let event = event.sequenced(&aggregate_id, self.version + 1);
        self.dispatch(&event);
        self.version = event.version;
        self.uncommitted_events.push(event);
    }

    fn load_from_events(&mut self, events: &[Event]) {
        self.state = S::default();
        self.version = 0;
        self.replay(events);
    }

    fn replay(&mut self, events: &[Event]) {
        for event in events {
            self.dispatch(event);
            self.version = event.version;
        }
    }

    fn uncommitted_events(&self) -> &[Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }

    fn snapshot(&self, clock: &dyn Clock) -> Result<Snapshot, DomainError> {
        let value = serde_json::to_value(&self.state).map_err(|e| {
            DomainError::Infrastructure(format!("state serialization failed: {e}"))
        })?;
        let Value::Object(state) = value else {
            return Err(DomainError::Infrastructure(format!(
                "state of aggregate {} is not a JSON object",
                self.id
            )));
        };
        Ok(Snapshot::new(self.id.clone(), self.version, state, clock))
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), DomainError> {
        if snapshot.aggregate_id != self.id {
            return Err(DomainError::Validation(format!(
                "snapshot for {} cannot seed aggregate {}",
                snapshot.aggregate_id, self.id
            )));
        }
        self.state = serde_json::from_value(Value::Object(snapshot.state.clone())).map_err(
            |e| DomainError::Infrastructure(format!("snapshot deserialization failed: {e}")),
        )?;
        self.version = snapshot.version;
        Ok(())
    }
}
