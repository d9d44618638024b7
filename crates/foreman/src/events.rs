//! # Coordination Events
//!
//! This module defines the two event kinds that travel over the coordinator's
//! event bus: [`LogEvent`] for structured log records and [`StatusEvent`] for
//! service lifecycle transitions.
//!
//! Events are immutable once constructed. Two events with identical fields are
//! still distinct occurrences; neither type implements equality, and listeners
//! must not rely on deduplication.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::logger::LogRecord;

/// Lifecycle status of a named service on a resource.
///
/// This is a closed two-state set: a service that has never been reported is
/// *unknown*, which the status API models as `None` rather than a third
/// variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Running => write!(f, "running"),
            ServiceStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Error returned when parsing a string that is not a valid service status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown service status: {0:?}")]
pub struct ParseStatusError(String);

impl FromStr for ServiceStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ServiceStatus::Running),
            "stopped" => Ok(ServiceStatus::Stopped),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// # LogEvent
///
/// A structured log record in flight on the event bus.
///
/// Carries an optional resource identifier (absent means the log pertains to
/// the coordinator itself rather than a specific resource), the record, and a
/// `should_distribute` flag telling bridge listeners whether the record is
/// meant to leave the local process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    resource_id: Option<String>,
    record: LogRecord,
    should_distribute: bool,
}

impl LogEvent {
    /// Creates a local log event. `should_distribute` defaults to `false`.
    pub fn new(resource_id: Option<String>, record: LogRecord) -> Self {
        Self {
            resource_id,
            record,
            should_distribute: false,
        }
    }

    /// Creates a log event marked for distribution beyond the local process.
    pub fn distributed(resource_id: Option<String>, record: LogRecord) -> Self {
        Self {
            resource_id,
            record,
            should_distribute: true,
        }
    }

    /// The resource this log pertains to, or `None` for the coordinator itself.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn record(&self) -> &LogRecord {
        &self.record
    }

    /// Whether bridge listeners should forward this record out of the process.
    pub fn should_distribute(&self) -> bool {
        self.should_distribute
    }
}

/// # StatusEvent
///
/// Announces that a service on a resource transitioned to a new status.
///
/// A concrete coordinator backend dispatches one of these for every
/// successful status write, no later than the write's resolution, so that
/// local and remote listeners observe consistent state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    resource_id: String,
    service: String,
    status: ServiceStatus,
}

impl StatusEvent {
    pub fn new(
        resource_id: impl Into<String>,
        service: impl Into<String>,
        status: ServiceStatus,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            service: service.into(),
            status,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }
}
