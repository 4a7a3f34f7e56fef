//! Process-local implementation of the `EventStore` trait.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use keel_core::error::DomainError;
use keel_core::event::Event;
use keel_core::repository::EventStore;
use keel_core::snapshot::Snapshot;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::EventSourcingConfig;

/// Counters describing the store's contents and activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventStoreStats {
    /// Events currently held across all aggregates.
    pub total_events: usize,
    /// Aggregates with at least one event.
    pub total_aggregates: usize,
    /// Snapshots currently held.
    pub total_snapshots: usize,
    /// Events appended since the store was created.
    pub events_appended: u64,
    /// Snapshots saved since the store was created.
    pub snapshots_saved: u64,
}

#[derive(Debug, Default)]
struct Streams {
    events: HashMap<String, Vec<Event>>,
    snapshots: HashMap<String, Snapshot>,
    snapshot_due: HashSet<String>,
}

/// Event store backed by in-process maps.
///
/// The store performs no per-aggregate locking beyond keeping each append
/// atomic; callers that append to the same aggregate concurrently should use
/// [`EventStore::append_expected`].
#[derive(Debug)]
pub struct InMemoryEventStore {
    config: EventSourcingConfig,
    connected: AtomicBool,
    streams: RwLock<Streams>,
    events_appended: AtomicU64,
    snapshots_saved: AtomicU64,
}

impl InMemoryEventStore {
    /// Creates a connected, empty store.
    #[must_use]
    pub fn new(config: EventSourcingConfig) -> Self {
        info!(
            snapshot_interval = config.snapshot_interval,
            enable_snapshots = config.enable_snapshots,
            max_events = config.max_events,
            "in-memory event store connected"
        );
        Self {
            config,
            connected: AtomicBool::new(true),
            streams: RwLock::new(Streams::default()),
            events_appended: AtomicU64::new(0),
            snapshots_saved: AtomicU64::new(0),
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &EventSourcingConfig {
        &self.config
    }

    /// Disconnects the store. Every later operation fails with
    /// `DomainError::NotConnected` until [`reopen`](Self::reopen).
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        info!("in-memory event store closed");
    }

    /// Reconnects a closed store. Stored data is kept.
    pub fn reopen(&self) {
        self.connected.store(true, Ordering::SeqCst);
        info!("in-memory event store reopened");
    }

    /// Returns `true` while the store accepts operations.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the store's counters.
    #[must_use]
    pub fn stats(&self) -> EventStoreStats {
        let streams = self.read();
        EventStoreStats {
            total_events: streams.events.values().map(Vec::len).sum(),
            total_aggregates: streams.events.len(),
            total_snapshots: streams.snapshots.len(),
            events_appended: self.events_appended.load(Ordering::Relaxed),
            snapshots_saved: self.snapshots_saved.load(Ordering::Relaxed),
        }
    }

    /// Drops every stored event and snapshot.
    pub fn clear(&self) {
        *self.write() = Streams::default();
        debug!("in-memory event store cleared");
    }

    fn ensure_connected(&self) -> Result<(), DomainError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DomainError::NotConnected)
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Streams> {
        self.streams.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Streams> {
        self.streams.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn append_inner(
        &self,
        aggregate_id: &str,
        expected_version: Option<i64>,
        events: Vec<Event>,
    ) -> Result<Vec<Event>, DomainError> {
        self.ensure_connected()?;
        let mut streams = self.write();

        let (stored_count, current_version) = streams
            .events
            .get(aggregate_id)
            .map_or((0, 0), |stream| {
                (stream.len(), stream.last().map_or(0, |e| e.version))
            });

        if let Some(expected) = expected_version {
            if expected != current_version {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.to_owned(),
                    expected,
                    actual: current_version,
                });
            }
        }

        if events.is_empty() {
            return Ok(Vec::new());
        }

        if stored_count + events.len() > self.config.max_events {
            return Err(DomainError::Validation(format!(
                "aggregate {aggregate_id} would exceed {} events",
                self.config.max_events
            )));
        }

        let mut version = current_version;
        let stored: Vec<Event> = events
            .into_iter()
            .map(|event| {
                version += 1;
                event.sequenced(aggregate_id, version)
            })
            .collect();

        streams
            .events
            .entry(aggregate_id.to_owned())
            .or_default()
            .extend(stored.iter().cloned());

        if self
            .config
            .crosses_snapshot_point(current_version, version)
        {
            debug!(aggregate_id, version, "snapshot interval reached");
            streams.snapshot_due.insert(aggregate_id.to_owned());
        }

        self.events_appended
            .fetch_add(stored.len() as u64, Ordering::Relaxed);
        Ok(stored)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(EventSourcingConfig::memory())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn append(
        &self,
        aggregate_id: &str,
        events: Vec<Event>,
    ) -> Result<Vec<Event>, DomainError> {
        self.append_inner(aggregate_id, None, events)
    }

    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn append_expected(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: Vec<Event>,
    ) -> Result<Vec<Event>, DomainError> {
        self.append_inner(aggregate_id, Some(expected_version), events)
    }

    async fn get_events(
        &self,
        aggregate_id: &str,
        since_version: i64,
    ) -> Result<Vec<Event>, DomainError> {
        self.ensure_connected()?;
        Ok(self
            .read()
            .events
            .get(aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.version > since_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn current_version(&self, aggregate_id: &str) -> Result<i64, DomainError> {
        self.ensure_connected()?;
        Ok(self
            .read()
            .events
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map_or(0, |e| e.version))
    }

    #[instrument(skip(self, snapshot), fields(aggregate_id = %snapshot.aggregate_id, version = snapshot.version))]
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), DomainError> {
        self.ensure_connected()?;
        let mut streams = self.write();
        streams.snapshot_due.remove(&snapshot.aggregate_id);
        streams
            .snapshots
            .insert(snapshot.aggregate_id.clone(), snapshot);
        self.snapshots_saved.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: &str) -> Result<Option<Snapshot>, DomainError> {
        self.ensure_connected()?;
        Ok(self.read().snapshots.get(aggregate_id).cloned())
    }

    async fn snapshot_due(&self, aggregate_id: &str) -> Result<bool, DomainError> {
        self.ensure_connected()?;
        Ok(self.read().snapshot_due.contains(aggregate_id))
    }
}
