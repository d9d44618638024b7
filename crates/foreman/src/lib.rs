//! # Foreman Coordination Substrate
//!
//! Foreman is the coordination layer distributed resources (workers, nodes,
//! services) use to publish structured log records and to report and query
//! the lifecycle status of named services, over a single typed
//! publish/subscribe channel.
//!
//! ## Core pieces
//!
//! * [`EventBus`]: a typed publish/subscribe bus closed over exactly two
//!   event kinds, `log` and `status`, with synchronous in-order dispatch and
//!   per-listener failure isolation.
//! * [`LogEvent`] / [`StatusEvent`]: immutable event values; a log event
//!   carries a structured record and a distribution flag, a status event
//!   announces a `running`/`stopped` transition for a (resource, service)
//!   pair.
//! * [`Coordinator`]: the contract concrete backends implement
//!   (`set`/`get`/`wait_for` service status plus a `url` identity), with bus
//!   delegation and logger construction provided.
//! * [`CoordinatorLogger`]: the bridge that turns ordinary [`Logger`] calls
//!   into distributed log events.
//! * [`wait::wait_until`]: race-free, cancellation-safe status waiting for
//!   backends with an event stream.
//!
//! The crate defines the contract and the in-process event distribution
//! layer only; durable storage and transport belong to concrete backends
//! such as `foreman-memory`.

pub mod bus;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logger;
pub mod wait;

pub use bus::{BusEvent, EventBus, ListenerGuard, ListenerId};
pub use coordinator::{validate_identifiers, Coordinator, CoordinatorLogger};
pub use error::CoordinatorError;
pub use events::{LogEvent, ServiceStatus, StatusEvent};
pub use logger::{
    combine_loggers, LogContext, LogRecord, LogSeverity, Logger, LoggerExt, MultiLogger,
    ScopedLogger, TracingLogger,
};
