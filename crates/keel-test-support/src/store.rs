//! Test event store that fails every call.

use async_trait::async_trait;
use keel_core::error::DomainError;
use keel_core::event::Event;
use keel_core::repository::EventStore;
use keel_core::snapshot::Snapshot;

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

fn refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(
        &self,
        _aggregate_id: &str,
        _events: Vec<Event>,
    ) -> Result<Vec<Event>, DomainError> {
        Err(refused())
    }

    async fn append_expected(
        &self,
        _aggregate_id: &str,
        _expected_version: i64,
        _events: Vec<Event>,
    ) -> Result<Vec<Event>, DomainError> {
        Err(refused())
    }

    async fn get_events(
        &self,
        _aggregate_id: &str,
        _since_version: i64,
    ) -> Result<Vec<Event>, DomainError> {
        Err(refused())
    }

    async fn current_version(&self, _aggregate_id: &str) -> Result<i64, DomainError> {
        Err(refused())
    }

    async fn save_snapshot(&self, _snapshot: Snapshot) -> Result<(), DomainError> {
        Err(refused())
    }

    async fn get_snapshot(&self, _aggregate_id: &str) -> Result<Option<Snapshot>, DomainError> {
        Err(refused())
    }
}
