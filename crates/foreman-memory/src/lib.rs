//! # In-Memory Coordinator
//!
//! [`MemoryCoordinator`] implements the full `foreman` coordination contract
//! against a process-local table. It is the reference backend: the
//! integration tests drive every contract property through it, and it is
//! suitable wherever coordination does not need to cross a process boundary.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use foreman::{
    validate_identifiers, Coordinator, CoordinatorError, EventBus, ServiceStatus, StatusEvent,
};

/// A coordinator backed by an in-process status table.
///
/// Status writes dispatch their [`StatusEvent`] while still holding the
/// table lock, so listeners observe events for a pair in exactly the order
/// the writes landed. Listeners therefore must not call back into the status
/// API synchronously; like all bus listeners they are expected to hand off
/// and return.
pub struct MemoryCoordinator {
    bus: Arc<EventBus>,
    table: Mutex<HashMap<(String, String), ServiceStatus>>,
    url: String,
}

impl MemoryCoordinator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            bus: Arc::new(EventBus::new()),
            table: Mutex::new(HashMap::new()),
            url: url.into(),
        }
    }
}

impl Default for MemoryCoordinator {
    fn default() -> Self {
        Self::new("memory://local")
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn set_service_status(
        &self,
        resource_id: &str,
        service: &str,
        status: ServiceStatus,
    ) -> Result<(), CoordinatorError> {
        validate_identifiers(resource_id, service)?;
        let event = StatusEvent::new(resource_id, service, status);
        {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.insert((resource_id.to_string(), service.to_string()), status);
            self.bus.dispatch(&event);
        }
        debug!(resource_id, service, %status, "service status recorded");
        Ok(())
    }

    async fn get_service_status(
        &self,
        resource_id: &str,
        service: &str,
    ) -> Result<Option<ServiceStatus>, CoordinatorError> {
        validate_identifiers(resource_id, service)?;
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(table
            .get(&(resource_id.to_string(), service.to_string()))
            .copied())
    }

    async fn wait_for_service_status(
        &self,
        resource_id: &str,
        service: &str,
        expected: ServiceStatus,
    ) -> Result<(), CoordinatorError> {
        validate_identifiers(resource_id, service)?;
        foreman::wait::wait_until(&self.bus, resource_id, service, expected, || {
            self.get_service_status(resource_id, service)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn never_written_pair_reads_as_unknown() {
        let coordinator = MemoryCoordinator::default();
        assert_eq!(
            coordinator
                .get_service_status("node-1", "worker")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn empty_identifiers_never_reach_the_table() {
        let coordinator = MemoryCoordinator::default();
        assert_eq!(
            coordinator
                .set_service_status("", "worker", ServiceStatus::Running)
                .await,
            Err(CoordinatorError::InvalidArgument {
                field: "resource_id"
            })
        );
        assert_eq!(
            coordinator.get_service_status("node-1", "").await,
            Err(CoordinatorError::InvalidArgument { field: "service" })
        );
        assert!(coordinator.table.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn url_is_the_configured_identity() {
        let coordinator = MemoryCoordinator::new("memory://cluster-a");
        assert_eq!(coordinator.url(), "memory://cluster-a");
    }
}
