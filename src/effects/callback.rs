//! The event callback handed to services.

use super::{BoxError, ServiceError};
use crate::core::{State, StateMode};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// An event raised by a service that won the race to leave the state.
#[derive(Clone, Debug)]
pub struct Decision {
    /// Event id that was raised
    pub event: String,
    /// Error carried by the event, if any
    pub error: Option<ServiceError>,
}

impl Decision {
    pub(crate) fn new(event: impl Into<String>, error: Option<ServiceError>) -> Self {
        Self {
            event: event.into(),
            error,
        }
    }
}

/// Handle through which services raise events for one state entry.
///
/// Every service of an entry shares the same commit flag: the first call
/// that matches a transition, a final state or carries an error takes
/// effect, and every later call is a no-op returning `false`.
///
/// Cloning is cheap. The entry stays alive while any clone exists, so a
/// service may hand a clone to a detached task and raise an event later.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<CallbackInner>,
}

struct CallbackInner {
    state: Arc<State>,
    committed: AtomicBool,
    scope: CancellationToken,
    decisions: UnboundedSender<Decision>,
}

impl Callback {
    pub(crate) fn new(
        state: Arc<State>,
        scope: CancellationToken,
        decisions: UnboundedSender<Decision>,
    ) -> Self {
        Self {
            inner: Arc::new(CallbackInner {
                state,
                committed: AtomicBool::new(false),
                scope,
                decisions,
            }),
        }
    }

    /// Raise an event. Returns `true` if it moved the machine.
    pub fn raise(&self, event_id: &str) -> bool {
        self.commit(event_id, None)
    }

    /// Raise an event carrying an error.
    ///
    /// Routed like any event when the state has a transition for it;
    /// otherwise the error ends the run.
    pub fn raise_error(&self, event_id: &str, error: impl Into<BoxError>) -> bool {
        self.commit(event_id, Some(ServiceError::from(error.into())))
    }

    /// Whether an event already took effect for this state entry.
    pub fn has_fired(&self) -> bool {
        self.inner.committed.load(Ordering::Acquire)
    }

    /// Token cancelled when the state entry is torn down or the run stops.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.scope.clone()
    }

    /// Id of the state this callback belongs to.
    pub fn state_id(&self) -> &str {
        self.inner.state.id()
    }

    fn takes_effect(&self, event_id: &str, has_error: bool) -> bool {
        let state = &self.inner.state;
        has_error || state.mode() == StateMode::Final || state.target_of(event_id).is_some()
    }

    fn commit(&self, event_id: &str, error: Option<ServiceError>) -> bool {
        let state_id = self.inner.state.id();

        if !self.takes_effect(event_id, error.is_some()) {
            warn!(
                state = %state_id,
                event = %event_id,
                "No transition registered for event, ignoring"
            );
            return false;
        }

        if self
            .inner
            .committed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(state = %state_id, event = %event_id, "State already transitioning, ignoring event");
            return false;
        }

        if self
            .inner
            .decisions
            .send(Decision::new(event_id, error))
            .is_err()
        {
            debug!(state = %state_id, event = %event_id, "State entry already finished, ignoring event");
            return false;
        }

        debug!(state = %state_id, event = %event_id, "Event accepted");
        true
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("state", &self.inner.state.id())
            .field("fired", &self.has_fired())
            .finish()
    }
}
