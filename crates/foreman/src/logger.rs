//! # Structured Logger Capability
//!
//! The generic logging surface the coordinator builds on: a record model
//! ([`LogRecord`] with severity, area, message, optional payload and
//! context), the dyn-safe [`Logger`] trait, scope wrapping, and
//! order-preserving fan-out to several sinks via [`combine_loggers`].
//!
//! Any collaborator that can consume `(severity, area, message, object,
//! context)` tuples can implement [`Logger`]; [`TracingLogger`] ships as the
//! bridge into the `tracing` ecosystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Severity of a log record, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogSeverity::Trace => "trace",
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warn => "warn",
            LogSeverity::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Contextual metadata attached to a log record.
///
/// A record that has passed through the coordinator's log bridge always
/// carries a timestamp; the free-form fields hold scope metadata and anything
/// the caller attaches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A structured log record. Created per log call, never mutated, discarded
/// after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: LogSeverity,
    pub area: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    pub context: LogContext,
}

impl LogRecord {
    /// Convenience constructor for a record with no payload and an empty
    /// context.
    pub fn message(
        severity: LogSeverity,
        area: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            area: area.into(),
            message: message.into(),
            object: None,
            context: LogContext::new(),
        }
    }
}

/// # Logger
///
/// The generic structured-logger capability. Implementations receive every
/// call synchronously; anything that needs to do asynchronous work must
/// schedule it without blocking the caller.
pub trait Logger: Send + Sync {
    fn log(
        &self,
        severity: LogSeverity,
        area: &str,
        message: &str,
        object: Option<Value>,
        context: Option<LogContext>,
    );
}

/// A logger wrapper that prefixes the area and stamps scope metadata onto
/// every record before forwarding it.
///
/// With an empty prefix the area passes through untouched; a bound resource
/// id is recorded under the `scope` context field unless the caller already
/// set one.
pub struct ScopedLogger {
    inner: Arc<dyn Logger>,
    prefix: String,
    resource_id: Option<String>,
}

impl ScopedLogger {
    pub fn new(
        inner: Arc<dyn Logger>,
        prefix: impl Into<String>,
        resource_id: Option<String>,
    ) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
            resource_id,
        }
    }
}

impl Logger for ScopedLogger {
    fn log(
        &self,
        severity: LogSeverity,
        area: &str,
        message: &str,
        object: Option<Value>,
        context: Option<LogContext>,
    ) {
        let area = if self.prefix.is_empty() {
            area.to_string()
        } else {
            format!("{}:{}", self.prefix, area)
        };
        let mut context = context.unwrap_or_default();
        if let Some(id) = &self.resource_id {
            context
                .fields
                .entry("scope".to_string())
                .or_insert_with(|| Value::String(id.clone()));
        }
        self.inner.log(severity, &area, message, object, Some(context));
    }
}

/// Scope-construction surface for boxed loggers.
///
/// Mirrors the capability contract: any logger can be narrowed to a scope
/// that prefixes areas and tags records with a resource id.
pub trait LoggerExt {
    fn create_scope(&self, prefix: &str, resource_id: Option<&str>) -> Arc<dyn Logger>;
}

impl LoggerExt for Arc<dyn Logger> {
    fn create_scope(&self, prefix: &str, resource_id: Option<&str>) -> Arc<dyn Logger> {
        Arc::new(ScopedLogger::new(
            Arc::clone(self),
            prefix,
            resource_id.map(str::to_owned),
        ))
    }
}

/// Order-preserving fan-out to several loggers.
///
/// Every sink is invoked for every call, in the order supplied. A sink that
/// panics is logged and skipped; it never suppresses the remaining sinks.
pub struct MultiLogger {
    sinks: Vec<Arc<dyn Logger>>,
}

impl MultiLogger {
    pub fn new(sinks: Vec<Arc<dyn Logger>>) -> Self {
        Self { sinks }
    }
}

impl Logger for MultiLogger {
    fn log(
        &self,
        severity: LogSeverity,
        area: &str,
        message: &str,
        object: Option<Value>,
        context: Option<LogContext>,
    ) {
        for sink in &self.sinks {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                sink.log(severity, area, message, object.clone(), context.clone())
            }));
            if outcome.is_err() {
                error!(area, "log sink panicked; continuing with remaining sinks");
            }
        }
    }
}

/// Combines several loggers into one that fans every call out to all of them.
///
/// A single logger is returned as-is rather than wrapped.
pub fn combine_loggers(mut loggers: Vec<Arc<dyn Logger>>) -> Arc<dyn Logger> {
    if loggers.len() == 1 {
        match loggers.pop() {
            Some(only) => only,
            None => Arc::new(MultiLogger::new(Vec::new())),
        }
    } else {
        Arc::new(MultiLogger::new(loggers))
    }
}

/// A [`Logger`] that forwards records to the `tracing` macros, so coordinator
/// logs join whatever subscriber the host process installed.
///
/// The context timestamp is dropped on this path; `tracing` stamps its own.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(
        &self,
        severity: LogSeverity,
        area: &str,
        message: &str,
        object: Option<Value>,
        _context: Option<LogContext>,
    ) {
        match severity {
            LogSeverity::Trace => tracing::trace!(area, ?object, "{}", message),
            LogSeverity::Debug => tracing::debug!(area, ?object, "{}", message),
            LogSeverity::Info => tracing::info!(area, ?object, "{}", message),
            LogSeverity::Warn => tracing::warn!(area, ?object, "{}", message),
            LogSeverity::Error => tracing::error!(area, ?object, "{}", message),
        }
    }
}
