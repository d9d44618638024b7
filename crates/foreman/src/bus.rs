//! # Typed Event Bus
//!
//! A publish/subscribe primitive restricted to exactly two event kinds:
//! [`LogEvent`] and [`StatusEvent`]. The kind set is closed at the type level
//! through the sealed [`BusEvent`] trait, so registering a listener for an
//! unsupported kind is a compile error and a `log` listener can never observe
//! a `status` event.
//!
//! Dispatch is synchronous: every listener registered for the event's kind at
//! the moment of dispatch runs, in registration order, before
//! [`EventBus::dispatch`] returns. The listener list is snapshotted first, so
//! listeners may remove themselves (or anyone else) mid-dispatch without
//! corrupting iteration. A panicking listener is contained and logged; it
//! never fails the dispatch call or suppresses later listeners.

use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

use crate::events::{LogEvent, StatusEvent};

mod private {
    pub trait Sealed {}
    impl Sealed for crate::events::LogEvent {}
    impl Sealed for crate::events::StatusEvent {}
}

/// An event kind the bus knows how to route. Implemented exactly by
/// [`LogEvent`] and [`StatusEvent`]; the trait is sealed.
pub trait BusEvent: private::Sealed + Send + Sync + 'static {
    /// Kind name used in diagnostics (`"log"` or `"status"`).
    fn kind() -> &'static str;

    #[doc(hidden)]
    fn registry(bus: &EventBus) -> &ListenerRegistry<Self>
    where
        Self: Sized;
}

impl BusEvent for LogEvent {
    fn kind() -> &'static str {
        "log"
    }

    fn registry(bus: &EventBus) -> &ListenerRegistry<LogEvent> {
        &bus.log
    }
}

impl BusEvent for StatusEvent {
    fn kind() -> &'static str {
        "status"
    }

    fn registry(bus: &EventBus) -> &ListenerRegistry<StatusEvent> {
        &bus.status
    }
}

/// Token identifying a registered listener, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Listener list for one event kind. Kept behind a mutex; dispatch snapshots
/// the list before invoking anything so no user code runs under the lock.
#[doc(hidden)]
pub struct ListenerRegistry<E> {
    entries: Mutex<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> ListenerRegistry<E> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, id: ListenerId, listener: Listener<E>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn snapshot(&self) -> Vec<(ListenerId, Listener<E>)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// # EventBus
///
/// The coordinator-owned publish/subscribe channel. One registry per event
/// kind; see the module docs for dispatch semantics.
pub struct EventBus {
    log: ListenerRegistry<LogEvent>,
    status: ListenerRegistry<StatusEvent>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            log: ListenerRegistry::new(),
            status: ListenerRegistry::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a listener for the event kind `E`. Listeners run
    /// synchronously during dispatch and must not block; anything needing
    /// asynchronous work should schedule it and return.
    pub fn add_event_listener<E, F>(&self, listener: F) -> ListenerId
    where
        E: BusEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        E::registry(self).add(id, Arc::new(listener));
        id
    }

    /// Removes a previously registered listener. Returns `false` if the id
    /// was already removed or never belonged to kind `E`.
    pub fn remove_event_listener<E: BusEvent>(&self, id: ListenerId) -> bool {
        E::registry(self).remove(id)
    }

    /// Synchronously delivers `event` to every listener currently registered
    /// for its kind, in registration order.
    ///
    /// Always returns `true`: no listener can cancel an event at this layer.
    /// The return value exists for event-target contract parity.
    pub fn dispatch<E: BusEvent>(&self, event: &E) -> bool {
        for (id, listener) in E::registry(self).snapshot() {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(
                    kind = E::kind(),
                    listener = id.0,
                    "event listener panicked during dispatch"
                );
            }
        }
        true
    }

    /// Number of listeners currently registered for kind `E`.
    pub fn listener_count<E: BusEvent>(&self) -> usize {
        E::registry(self).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII registration token: removes its listener from the bus on drop.
pub struct ListenerGuard<E: BusEvent> {
    bus: Arc<EventBus>,
    id: ListenerId,
    _kind: PhantomData<fn(&E)>,
}

impl<E: BusEvent> ListenerGuard<E> {
    /// Registers `listener` on `bus` and ties its lifetime to the returned
    /// guard. This is the cancellation-safety primitive status waiting
    /// builds on.
    pub fn subscribe<F>(bus: &Arc<EventBus>, listener: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = bus.add_event_listener(listener);
        Self {
            bus: Arc::clone(bus),
            id,
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<E: BusEvent> Drop for ListenerGuard<E> {
    fn drop(&mut self) {
        self.bus.remove_event_listener::<E>(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ServiceStatus;
    use crate::logger::{LogRecord, LogSeverity};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn log_event() -> LogEvent {
        LogEvent::new(None, LogRecord::message(LogSeverity::Info, "test", "hello"))
    }

    #[test]
    fn listener_fires_exactly_once_per_dispatch() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = hits.clone();
        bus.add_event_listener(move |_: &LogEvent| {
            hits_in.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.dispatch(&log_event()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listener_never_fires() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = hits.clone();
        let id = bus.add_event_listener(move |_: &LogEvent| {
            hits_in.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.remove_event_listener::<LogEvent>(id));
        bus.dispatch(&log_event());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order_in = order.clone();
            bus.add_event_listener(move |_: &LogEvent| {
                order_in.lock().unwrap().push(tag);
            });
        }

        bus.dispatch(&log_event());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn log_listener_does_not_observe_status_events() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = hits.clone();
        bus.add_event_listener(move |_: &LogEvent| {
            hits_in.fetch_add(1, Ordering::SeqCst);
        });

        bus.dispatch(&StatusEvent::new("node-1", "worker", ServiceStatus::Running));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_does_not_suppress_later_listeners() {
        let bus = EventBus::new();
        bus.add_event_listener(|_: &LogEvent| {
            panic!("listener failure");
        });
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = hits.clone();
        bus.add_event_listener(move |_: &LogEvent| {
            hits_in.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.dispatch(&log_event()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_remove_itself_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let bus_in = bus.clone();
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let slot_in = slot.clone();
        let id = bus.add_event_listener(move |_: &LogEvent| {
            if let Some(id) = *slot_in.lock().unwrap() {
                bus_in.remove_event_listener::<LogEvent>(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        let hits_in = hits.clone();
        bus.add_event_listener(move |_: &LogEvent| {
            hits_in.fetch_add(1, Ordering::SeqCst);
        });

        // First dispatch: self-removing listener runs and drops itself, the
        // second listener still fires from the snapshot.
        bus.dispatch(&log_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count::<LogEvent>(), 1);

        bus.dispatch(&log_event());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn guard_drop_deregisters_listener() {
        let bus = Arc::new(EventBus::new());
        {
            let _guard = ListenerGuard::subscribe(&bus, |_: &StatusEvent| {});
            assert_eq!(bus.listener_count::<StatusEvent>(), 1);
        }
        assert_eq!(bus.listener_count::<StatusEvent>(), 0);
    }
}
