//! Event store abstraction and aggregate persistence helpers.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::aggregate::AggregateRoot;
use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::Event;
use crate::snapshot::Snapshot;

/// Append-only per-aggregate event log plus a latest-snapshot table.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events after the highest stored version, assigning each the
    /// next sequential version and stamping `aggregate_id`. Returns the
    /// stored events.
    async fn append(&self, aggregate_id: &str, events: Vec<Event>)
    -> Result<Vec<Event>, DomainError>;

    /// Like [`append`](Self::append), but fails with
    /// `DomainError::ConcurrencyConflict` unless the stored version equals
    /// `expected_version`.
    async fn append_expected(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: Vec<Event>,
    ) -> Result<Vec<Event>, DomainError>;

    /// Returns events with `version > since_version`, in ascending order.
    /// Unknown aggregates yield an empty vector.
    async fn get_events(
        &self,
        aggregate_id: &str,
        since_version: i64,
    ) -> Result<Vec<Event>, DomainError>;

    /// Highest stored version for the aggregate, or 0.
    async fn current_version(&self, aggregate_id: &str) -> Result<i64, DomainError>;

    /// Saves a snapshot, replacing any previous one for the aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), DomainError>;

    /// Returns the latest snapshot for the aggregate, if any.
    async fn get_snapshot(&self, aggregate_id: &str) -> Result<Option<Snapshot>, DomainError>;

    /// Returns `true` when the store's snapshot interval has been reached
    /// for the aggregate and no snapshot was saved since.
    async fn snapshot_due(&self, _aggregate_id: &str) -> Result<bool, DomainError> {
        Ok(false)
    }
}

/// Persists an aggregate's uncommitted events.
///
/// The append is guarded by the version the aggregate had before its
/// uncommitted events; uncommitted events are cleared only after the store
/// accepted them. If the store reports a snapshot is due, one is taken from
/// the aggregate's current state. A failing snapshot is logged, not
/// returned, since the events are already durable.
///
/// # Errors
///
/// Returns any `DomainError` raised by the append.
#[instrument(skip_all, fields(aggregate_id = %aggregate.aggregate_id()))]
pub async fn commit<A>(
    store: &dyn EventStore,
    aggregate: &mut A,
    clock: &dyn Clock,
) -> Result<Vec<Event>, DomainError>
where
    A: AggregateRoot + ?Sized,
{
    let pending = aggregate.uncommitted_events().to_vec();
    if pending.is_empty() {
        return Ok(Vec::new());
    }
    let pending_count = i64::try_from(pending.len())
        .map_err(|_| DomainError::Validation("too many uncommitted events".into()))?;
    let expected_version = aggregate.version() - pending_count;

    let stored = store
        .append_expected(aggregate.aggregate_id(), expected_version, pending)
        .await?;
    aggregate.clear_uncommitted_events();
    debug!(count = stored.len(), "committed events");

    if store.snapshot_due(aggregate.aggregate_id()).await? {
        match aggregate.snapshot(clock) {
            Ok(snapshot) => {
                let version = snapshot.version;
                if let Err(e) = store.save_snapshot(snapshot).await {
                    warn!(error = %e, "failed to save snapshot");
                } else {
                    debug!(version, "saved snapshot");
                }
            }
            Err(e) => warn!(error = %e, "failed to materialize snapshot"),
        }
    }

    Ok(stored)
}

/// Rebuilds an aggregate from the store.
///
/// When a snapshot exists the aggregate is seeded from it and only events
/// after the snapshot's version are replayed; otherwise the full history
/// is replayed.
///
/// # Errors
///
/// Returns any `DomainError` raised by the store or by restoring the
/// snapshot.
#[instrument(skip_all, fields(aggregate_id = %aggregate.aggregate_id()))]
pub async fn hydrate<A>(store: &dyn EventStore, aggregate: &mut A) -> Result<(), DomainError>
where
    A: AggregateRoot + ?Sized,
{
    let aggregate_id = aggregate.aggregate_id().to_owned();
    if let Some(snapshot) = store.get_snapshot(&aggregate_id).await? {
        aggregate.restore_snapshot(&snapshot)?;
        let events = store.get_events(&aggregate_id, snapshot.version).await?;
        debug!(
            snapshot_version = snapshot.version,
            replayed = events.len(),
            "hydrated from snapshot"
        );
        aggregate.replay(&events);
    } else {
        let events = store.get_events(&aggregate_id, 0).await?;
        debug!(replayed = events.len(), "hydrated from full history");
        aggregate.load_from_events(&events);
    }
    Ok(())
}
