//! # Coordinator Contract
//!
//! The public surface distributed resources coordinate through: the
//! [`Coordinator`] trait (status lifecycle plus an owned event bus) and the
//! [`CoordinatorLogger`] bridge that turns ordinary structured-log calls into
//! distributed [`LogEvent`]s.
//!
//! The status operations are the extension point for concrete backends:
//! network-, database-, or memory-backed coordinators implement
//! `set`/`get`/`wait_for` against their own storage and must dispatch a
//! [`StatusEvent`](crate::events::StatusEvent) for every successful write, no
//! later than the write's resolution. Everything else, bus delegation and
//! logger construction, is provided here.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use crate::bus::{BusEvent, EventBus, ListenerGuard, ListenerId};
use crate::error::CoordinatorError;
use crate::events::{LogEvent, ServiceStatus};
use crate::logger::{combine_loggers, LogContext, LogRecord, LogSeverity, Logger, LoggerExt};

/// Rejects empty resource or service identifiers before any backend call.
pub fn validate_identifiers(resource_id: &str, service: &str) -> Result<(), CoordinatorError> {
    if resource_id.trim().is_empty() {
        return Err(CoordinatorError::InvalidArgument {
            field: "resource_id",
        });
    }
    if service.trim().is_empty() {
        return Err(CoordinatorError::InvalidArgument { field: "service" });
    }
    Ok(())
}

/// # Coordinator
///
/// A coordinator owns exactly one [`EventBus`] for its lifetime and exposes
/// the service-status lifecycle over it.
///
/// ## Contract for implementations
///
/// * `set_service_status` durably records the new status, then makes the
///   matching status event observable via dispatch before resolving.
///   Read-your-writes: a subsequent `get_service_status` returns the written
///   value until the next successful write for the same pair.
/// * `get_service_status` returns `None` only for pairs that have never been
///   written; `Stopped` is a recorded state, not the default.
/// * `wait_for_service_status` resolves immediately on a current match,
///   otherwise suspends until the expected status is observed. Backends with
///   an event stream should build on [`crate::wait::wait_until`], which
///   closes the race between the initial check and the subscription and
///   deregisters its listener on cancellation.
/// * Backend failures surface as
///   [`CoordinatorError::BackendUnavailable`]; they are never swallowed or
///   retried here.
///
/// Per (resource, service) pair the observable state machine is
/// `unknown → running | stopped` and `running ⇄ stopped`; a pair never
/// returns to `unknown`.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// The event bus this coordinator owns and dispatches on.
    fn bus(&self) -> &Arc<EventBus>;

    /// Identity string external collaborators address this coordinator by.
    fn url(&self) -> &str;

    async fn set_service_status(
        &self,
        resource_id: &str,
        service: &str,
        status: ServiceStatus,
    ) -> Result<(), CoordinatorError>;

    async fn get_service_status(
        &self,
        resource_id: &str,
        service: &str,
    ) -> Result<Option<ServiceStatus>, CoordinatorError>;

    async fn wait_for_service_status(
        &self,
        resource_id: &str,
        service: &str,
        expected: ServiceStatus,
    ) -> Result<(), CoordinatorError>;

    /// Delegates to the owned bus. The coordinator *is* the event source
    /// client code subscribes to.
    fn add_event_listener<E, F>(&self, listener: F) -> ListenerId
    where
        E: BusEvent,
        F: Fn(&E) + Send + Sync + 'static,
        Self: Sized,
    {
        self.bus().add_event_listener(listener)
    }

    fn remove_event_listener<E: BusEvent>(&self, id: ListenerId) -> bool
    where
        Self: Sized,
    {
        self.bus().remove_event_listener::<E>(id)
    }

    fn subscribe<E, F>(&self, listener: F) -> ListenerGuard<E>
    where
        E: BusEvent,
        F: Fn(&E) + Send + Sync + 'static,
        Self: Sized,
    {
        ListenerGuard::subscribe(self.bus(), listener)
    }

    fn dispatch_event<E: BusEvent>(&self, event: &E) -> bool
    where
        Self: Sized,
    {
        self.bus().dispatch(event)
    }

    /// Builds a logger whose calls become distributed log events on this
    /// coordinator's bus.
    ///
    /// The bridge is scoped with an empty area prefix and the resource id as
    /// scope metadata. Any extra loggers are fanned out to after the bridge,
    /// order-preserving, each isolated from the others' failures.
    fn create_logger(
        &self,
        resource_id: Option<&str>,
        extra_loggers: Vec<Arc<dyn Logger>>,
    ) -> Arc<dyn Logger> {
        let bridge: Arc<dyn Logger> = Arc::new(CoordinatorLogger::new(
            resource_id.map(str::to_owned),
            Arc::clone(self.bus()),
        ));
        let scoped = bridge.create_scope("", resource_id);

        if extra_loggers.is_empty() {
            return scoped;
        }

        let mut all = Vec::with_capacity(extra_loggers.len() + 1);
        all.push(scoped);
        all.extend(extra_loggers);
        combine_loggers(all)
    }
}

/// # CoordinatorLogger
///
/// The log-to-event bridge. Each `log` call becomes exactly one [`LogEvent`]
/// dispatched on the owning bus, bound to the resource id fixed at
/// construction (or to the coordinator itself when none was given).
///
/// Records entering through this bridge are by definition meant to leave the
/// local process, so `should_distribute` is always set. A missing context is
/// replaced with an empty one and a missing timestamp is stamped with the
/// current time; a caller-supplied timestamp is preserved.
pub struct CoordinatorLogger {
    resource_id: Option<String>,
    bus: Arc<EventBus>,
}

impl CoordinatorLogger {
    pub fn new(resource_id: Option<String>, bus: Arc<EventBus>) -> Self {
        Self { resource_id, bus }
    }
}

impl Logger for CoordinatorLogger {
    fn log(
        &self,
        severity: LogSeverity,
        area: &str,
        message: &str,
        object: Option<Value>,
        context: Option<LogContext>,
    ) {
        let mut context = context.unwrap_or_default();
        if context.timestamp.is_none() {
            context.timestamp = Some(Utc::now());
        }
        let record = LogRecord {
            severity,
            area: area.to_string(),
            message: message.to_string(),
            object,
            context,
        };
        self.bus
            .dispatch(&LogEvent::distributed(self.resource_id.clone(), record));
    }
}
