//! Read-side dispatch.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, instrument, warn};

use crate::command_bus::panic_message;
use crate::config::CqrsConfig;
use crate::query::Query;
use crate::result::QueryResult;
use crate::stats::{BusStats, Counters};

type ErasedHandler =
    Arc<dyn Fn(Box<dyn Any + Send>) -> BoxFuture<'static, QueryResult> + Send + Sync>;

/// Routes each query type to exactly one handler.
///
/// Same registration rules as [`CommandBus`](crate::CommandBus), without
/// the validation step. `Ok` values convert into a [`QueryResult`] (a raw
/// JSON value becomes found data, `None` becomes not found).
pub struct QueryBus {
    config: CqrsConfig,
    handlers: RwLock<HashMap<&'static str, ErasedHandler>>,
    counters: Counters,
}

impl QueryBus {
    /// Creates a bus with no handlers.
    #[must_use]
    pub fn new(config: CqrsConfig) -> Self {
        Self {
            config,
            handlers: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Registers the handler for `Q`, replacing any earlier one.
    pub fn register<Q, F, Fut, R, E>(&self, handler: F)
    where
        Q: Query,
        F: Fn(Q) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Into<QueryResult> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |query: Box<dyn Any + Send>| {
            match query.downcast::<Q>() {
                Ok(query) => {
                    let pending = handler(*query);
                    async move {
                        match pending.await {
                            Ok(value) => value.into(),
                            Err(e) => QueryResult::fail(e.to_string()),
                        }
                    }
                    .boxed()
                }
                Err(_) => futures::future::ready(QueryResult::fail(format!(
                    "handler for {} received a different query type",
                    Q::QUERY_TYPE
                )))
                .boxed(),
            }
        });

        let replaced = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Q::QUERY_TYPE, erased)
            .is_some();
        debug!(query_type = Q::QUERY_TYPE, replaced, "query handler registered");
    }

    /// Runs the handler for `query`.
    ///
    /// Never fails: a missing handler or a handler error or panic becomes a
    /// failed result.
    #[instrument(skip_all, fields(query_type = Q::QUERY_TYPE, query_id = %query.id()))]
    pub async fn execute<Q: Query>(&self, query: Q) -> QueryResult {
        Counters::bump(&self.counters.processed);

        let Some(handler) = self.handler(Q::QUERY_TYPE) else {
            Counters::bump(&self.counters.errors);
            warn!("no handler registered");
            return QueryResult::fail(format!(
                "No handler registered for query: {}",
                Q::QUERY_TYPE
            ));
        };

        let invocation = async move { handler(Box::new(query)).await };
        let result = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => QueryResult::fail(panic_message(panic.as_ref())),
        };

        if let Some(error) = result.error() {
            Counters::bump(&self.counters.errors);
            warn!(%error, "query failed");
        } else {
            debug!(found = result.found(), "query executed");
        }
        result
    }

    /// Returns `true` if a handler is registered for the type tag.
    #[must_use]
    pub fn has_handler(&self, query_type: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(query_type)
    }

    /// Number of registered query types.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns the query-side counters.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            queries_processed: Counters::load(&self.counters.processed),
            query_errors: Counters::load(&self.counters.errors),
            ..BusStats::default()
        }
    }

    /// Returns the bus configuration.
    #[must_use]
    pub fn config(&self) -> &CqrsConfig {
        &self.config
    }

    fn handler(&self, query_type: &str) -> Option<ErasedHandler> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(query_type)
            .cloned()
    }
}

impl Default for QueryBus {
    fn default() -> Self {
        Self::new(CqrsConfig::default())
    }
}

impl fmt::Debug for QueryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut types: Vec<&str> = handlers.keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("QueryBus")
            .field("handlers", &types)
            .finish_non_exhaustive()
    }
}
