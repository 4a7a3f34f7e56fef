//! Shared application state.

use std::sync::Arc;

use keel_core::clock::SharedClock;
use keel_core::repository::EventStore;
use keel_cqrs::{CommandBus, CqrsConfig, QueryBus};
use keel_event_store::InMemoryEventStore;
use keel_orders::application::command_handlers::register_command_handlers;
use keel_orders::application::inventory::Inventory;
use keel_orders::application::payments::PaymentLedger;
use keel_orders::application::placement_saga::order_placement_saga;
use keel_orders::application::query_handlers::register_query_handlers;
use keel_orders::application::read_model::OrdersReadModel;
use keel_saga::SagaOrchestrator;

use crate::config::AppConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Time source for commands, queries and events.
    pub clock: SharedClock,
    /// The event store backing every aggregate.
    pub event_store: Arc<InMemoryEventStore>,
    /// Write side.
    pub command_bus: Arc<CommandBus>,
    /// Read side.
    pub query_bus: Arc<QueryBus>,
    /// Saga registry and history.
    pub orchestrator: Arc<SagaOrchestrator>,
    /// Projection served by the query handlers.
    pub read_model: Arc<OrdersReadModel>,
    /// Stock levels.
    pub inventory: Arc<Inventory>,
    /// Payments taken by the placement saga.
    pub payments: Arc<PaymentLedger>,
}

impl AppState {
    /// Wires the Orders context: event store, buses, handlers and the
    /// placement saga.
    #[must_use]
    pub fn new(config: &AppConfig, clock: SharedClock) -> Self {
        let event_store = Arc::new(InMemoryEventStore::new(config.event_sourcing()));
        let store: Arc<dyn EventStore> = Arc::clone(&event_store) as Arc<dyn EventStore>;
        let read_model = Arc::new(OrdersReadModel::new());
        let inventory = Arc::new(Inventory::default_catalog());
        let payments = Arc::new(PaymentLedger::new());

        let command_bus = Arc::new(CommandBus::new(CqrsConfig::default()));
        register_command_handlers(&command_bus, &store, &read_model, &clock);
        let query_bus = Arc::new(QueryBus::new(CqrsConfig::default()));
        register_query_handlers(&query_bus, &read_model);

        let orchestrator = Arc::new(SagaOrchestrator::new(config.saga(), Arc::clone(&clock)));
        orchestrator.register(order_placement_saga(
            &inventory,
            &payments,
            &command_bus,
            &clock,
        ));

        Self {
            clock,
            event_store,
            command_bus,
            query_bus,
            orchestrator,
            read_model,
            inventory,
            payments,
        }
    }
}
