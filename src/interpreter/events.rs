//! State-changed and machine-done notifications.

use crate::core::State;
use crate::effects::ServiceError;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Payload of a state-changed notification.
#[derive(Clone)]
pub struct StateChange {
    /// State that was entered
    pub state: Arc<State>,
    /// State that was left, `None` on the first entry of a run
    pub previous: Option<Arc<State>>,
    /// Event that caused the transition, `None` on the first entry of a run
    pub event: Option<String>,
    /// Error carried by the event when it was routed to an error target
    pub error: Option<ServiceError>,
}

impl StateChange {
    /// Id of the entered state.
    pub fn state_id(&self) -> &str {
        self.state.id()
    }

    /// Id of the state that was left, if any.
    pub fn previous_id(&self) -> Option<&str> {
        self.previous.as_deref().map(State::id)
    }
}

impl fmt::Debug for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateChange")
            .field("state", &self.state_id())
            .field("previous", &self.previous_id())
            .field("event", &self.event)
            .field("error", &self.error.as_ref().map(ToString::to_string))
            .finish()
    }
}

pub(crate) type StateChangedHandler = Arc<dyn Fn(&StateChange) + Send + Sync>;
pub(crate) type MachineDoneHandler = Arc<dyn Fn() + Send + Sync>;

/// Registered notification handlers, invoked synchronously in order.
#[derive(Default)]
pub(crate) struct Observers {
    state_changed: RwLock<Vec<StateChangedHandler>>,
    machine_done: RwLock<Vec<MachineDoneHandler>>,
}

impl Observers {
    pub(crate) fn add_state_changed(&self, handler: StateChangedHandler) {
        self.state_changed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    pub(crate) fn add_machine_done(&self, handler: MachineDoneHandler) {
        self.machine_done
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    pub(crate) fn notify_state_changed(&self, change: &StateChange) {
        // snapshot so handlers may register further handlers
        let handlers = self
            .state_changed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler(change);
        }
    }

    pub(crate) fn notify_machine_done(&self) {
        let handlers = self
            .machine_done
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn every_state_changed_handler_is_notified() {
        let observers = Observers::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let seen = Arc::clone(&seen);
            observers.add_state_changed(Arc::new(move |change: &StateChange| {
                seen.lock()
                    .unwrap()
                    .push(format!("{}:{}", name, change.state_id()));
            }));
        }

        observers.notify_state_changed(&StateChange {
            state: Arc::new(State::new("idle")),
            previous: None,
            event: None,
            error: None,
        });

        assert_eq!(*seen.lock().unwrap(), vec!["first:idle", "second:idle"]);
    }

    #[test]
    fn machine_done_fans_out() {
        let observers = Observers::default();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            observers.add_machine_done(Arc::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        observers.notify_machine_done();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn change_exposes_previous_id() {
        let change = StateChange {
            state: Arc::new(State::new("b")),
            previous: Some(Arc::new(State::new("a"))),
            event: Some("GO".to_string()),
            error: None,
        };

        assert_eq!(change.previous_id(), Some("a"));
        assert!(format!("{:?}", change).contains("GO"));
    }
}
