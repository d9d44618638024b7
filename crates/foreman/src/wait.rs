//! # Status Waiting
//!
//! Shared machinery for `wait_for_service_status`: subscribe to the bus,
//! probe the backend, then suspend until the expected status event arrives.
//!
//! Subscribing *before* the probe is what makes this race-free: a
//! transition that lands between the probe and the suspension is already
//! sitting in the waiter's channel. Dropping the returned future drops the
//! subscription guard, so an abandoned wait never leaves a dangling listener.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bus::{EventBus, ListenerGuard};
use crate::error::CoordinatorError;
use crate::events::{ServiceStatus, StatusEvent};

/// Resolves once the (resource, service) pair reaches `expected`.
///
/// `probe` is the backend's current-status lookup; it runs once, after the
/// status subscription is in place. Resolves immediately when the probe
/// already matches. Tolerates any number of non-matching transitions while
/// pending, and resolves exactly once per waiter. No timeout is imposed;
/// callers needing a bound should wrap this in their own cancellation.
pub async fn wait_until<F, Fut>(
    bus: &Arc<EventBus>,
    resource_id: &str,
    service: &str,
    expected: ServiceStatus,
    probe: F,
) -> Result<(), CoordinatorError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<ServiceStatus>, CoordinatorError>>,
{
    let (matched_tx, mut matched_rx) = mpsc::unbounded_channel();
    let resource = resource_id.to_string();
    let service_name = service.to_string();
    let _guard = ListenerGuard::subscribe(bus, move |event: &StatusEvent| {
        if event.resource_id() == resource
            && event.service() == service_name
            && event.status() == expected
        {
            // Unbounded send: a sync listener may fire again before the
            // waiter wakes, and only the first receive matters.
            let _ = matched_tx.send(());
        }
    });

    if probe().await? == Some(expected) {
        return Ok(());
    }

    debug!(resource_id, service, %expected, "waiting for service status");
    if matched_rx.recv().await.is_none() {
        // The sender lives in the listener we still hold a guard for, so the
        // channel cannot close while we wait. Surface it rather than hang.
        return Err(CoordinatorError::backend_unavailable(
            "status event stream closed while waiting",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[test_log::test(tokio::test)]
    async fn resolves_immediately_when_probe_matches() {
        let bus = Arc::new(EventBus::new());
        let result = timeout(
            Duration::from_millis(100),
            wait_until(&bus, "node-1", "worker", ServiceStatus::Running, || async {
                Ok(Some(ServiceStatus::Running))
            }),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(bus.listener_count::<StatusEvent>(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn event_between_subscription_and_probe_is_not_missed() {
        let bus = Arc::new(EventBus::new());
        let dispatch_bus = bus.clone();
        // The probe reports a stale miss but dispatches the matching event
        // first, mimicking a transition racing the initial check.
        let result = timeout(
            Duration::from_millis(100),
            wait_until(&bus, "node-1", "worker", ServiceStatus::Running, || {
                let bus = dispatch_bus.clone();
                async move {
                    bus.dispatch(&StatusEvent::new("node-1", "worker", ServiceStatus::Running));
                    Ok(None)
                }
            }),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test_log::test(tokio::test)]
    async fn probe_error_propagates() {
        let bus = Arc::new(EventBus::new());
        let result = wait_until(&bus, "node-1", "worker", ServiceStatus::Running, || async {
            Err(CoordinatorError::backend_unavailable("store offline"))
        })
        .await;
        assert!(matches!(
            result,
            Err(CoordinatorError::BackendUnavailable { .. })
        ));
        assert_eq!(bus.listener_count::<StatusEvent>(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn ignores_events_for_other_pairs() {
        let bus = Arc::new(EventBus::new());
        let fut = wait_until(&bus, "node-1", "worker", ServiceStatus::Running, || async {
            Ok(None)
        });
        tokio::pin!(fut);

        assert!(timeout(Duration::from_millis(50), fut.as_mut())
            .await
            .is_err());

        bus.dispatch(&StatusEvent::new("node-2", "worker", ServiceStatus::Running));
        bus.dispatch(&StatusEvent::new("node-1", "other", ServiceStatus::Running));
        bus.dispatch(&StatusEvent::new("node-1", "worker", ServiceStatus::Stopped));
        assert!(timeout(Duration::from_millis(50), fut.as_mut())
            .await
            .is_err());

        bus.dispatch(&StatusEvent::new("node-1", "worker", ServiceStatus::Running));
        assert!(matches!(
            timeout(Duration::from_millis(100), fut).await,
            Ok(Ok(()))
        ));
    }

    #[test_log::test(tokio::test)]
    async fn dropping_a_pending_wait_removes_its_listener() {
        let bus = Arc::new(EventBus::new());
        {
            let fut = wait_until(&bus, "node-1", "worker", ServiceStatus::Running, || async {
                Ok(None)
            });
            tokio::pin!(fut);
            assert!(timeout(Duration::from_millis(50), fut.as_mut())
                .await
                .is_err());
            assert_eq!(bus.listener_count::<StatusEvent>(), 1);
        }
        assert_eq!(bus.listener_count::<StatusEvent>(), 0);
    }
}
