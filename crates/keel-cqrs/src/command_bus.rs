//! Write-side dispatch.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, instrument, warn};

use crate::command::Command;
use crate::config::CqrsConfig;
use crate::result::CommandResult;
use crate::stats::{BusStats, Counters};

type ErasedHandler =
    Arc<dyn Fn(Box<dyn Any + Send>) -> BoxFuture<'static, CommandResult> + Send + Sync>;

/// Routes each command type to exactly one handler.
///
/// Handlers are async closures taking the concrete command by value and
/// returning `Result<R, E>`: `Ok` values convert into a [`CommandResult`]
/// (a raw JSON value becomes a success, a `CommandResult` passes through)
/// and `Err` values become failed results carrying `E`'s message.
pub struct CommandBus {
    config: CqrsConfig,
    handlers: RwLock<HashMap<&'static str, ErasedHandler>>,
    counters: Counters,
}

impl CommandBus {
    /// Creates a bus with no handlers.
    #[must_use]
    pub fn new(config: CqrsConfig) -> Self {
        Self {
            config,
            handlers: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Registers the handler for `C`, replacing any earlier one.
    pub fn register<C, F, Fut, R, E>(&self, handler: F)
    where
        C: Command,
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Into<CommandResult> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |command: Box<dyn Any + Send>| {
            match command.downcast::<C>() {
                Ok(command) => {
                    let pending = handler(*command);
                    async move {
                        match pending.await {
                            Ok(value) => value.into(),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                    .boxed()
                }
                Err(_) => futures::future::ready(CommandResult::fail(format!(
                    "handler for {} received a different command type",
                    C::COMMAND_TYPE
                )))
                .boxed(),
            }
        });

        let replaced = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(C::COMMAND_TYPE, erased)
            .is_some();
        debug!(
            command_type = C::COMMAND_TYPE,
            replaced, "command handler registered"
        );
    }

    /// Validates `command` and runs its handler.
    ///
    /// Never fails: validation errors become rejected results, a missing
    /// handler or a handler error or panic becomes a failed result.
    #[instrument(skip_all, fields(command_type = C::COMMAND_TYPE, command_id = %command.id()))]
    pub async fn dispatch<C: Command>(&self, command: C) -> CommandResult {
        Counters::bump(&self.counters.processed);

        if let Err(e) = command.validate() {
            Counters::bump(&self.counters.rejected);
            debug!(reason = %e, "command rejected by validation");
            return CommandResult::rejected(e.to_string());
        }

        let Some(handler) = self.handler(C::COMMAND_TYPE) else {
            Counters::bump(&self.counters.errors);
            warn!("no handler registered");
            return CommandResult::fail(format!(
                "No handler registered for command: {}",
                C::COMMAND_TYPE
            ));
        };

        let invocation = async move { handler(Box::new(command)).await };
        let result = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => CommandResult::fail(panic_message(panic.as_ref())),
        };

        match &result {
            CommandResult::Success(_) => debug!("command succeeded"),
            CommandResult::Failed(error) => {
                Counters::bump(&self.counters.errors);
                warn!(%error, "command failed");
            }
            CommandResult::Rejected(reason) => {
                Counters::bump(&self.counters.rejected);
                debug!(%reason, "command rejected by handler");
            }
        }
        result
    }

    /// Returns `true` if a handler is registered for the type tag.
    #[must_use]
    pub fn has_handler(&self, command_type: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(command_type)
    }

    /// Number of registered command types.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns the command-side counters.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            commands_processed: Counters::load(&self.counters.processed),
            command_errors: Counters::load(&self.counters.errors),
            commands_rejected: Counters::load(&self.counters.rejected),
            ..BusStats::default()
        }
    }

    /// Returns the bus configuration.
    #[must_use]
    pub fn config(&self) -> &CqrsConfig {
        &self.config
    }

    fn handler(&self, command_type: &str) -> Option<ErasedHandler> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(command_type)
            .cloned()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new(CqrsConfig::default())
    }
}

impl fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut types: Vec<&str> = handlers.keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("CommandBus")
            .field("handlers", &types)
            .finish_non_exhaustive()
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_owned()
    }
}
