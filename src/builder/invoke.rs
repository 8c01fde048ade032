//! Cancelable async actions and nested machines as services.

use super::generated_event_id;
use crate::core::{State, StateMachine};
use crate::effects::{Callback, Service, ServiceResult};
use crate::interpreter::{Interpreter, InterpreterError, RunOutcome};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl State {
    /// Run an async action as a service and route its outcome.
    ///
    /// On success the machine moves to `on_done`, on failure to `on_error`.
    /// A missing `on_done` means success causes no transition; a missing
    /// `on_error` makes a failure end the run with
    /// [`InterpreterError::ServiceFailed`].
    ///
    /// Each invocation gets its own [`CancellationToken`], cancelled when the
    /// state is left through any other path or the run is stopped. A
    /// cancelled action raises nothing, whatever it returns.
    ///
    /// # Example
    ///
    /// ```rust
    /// use netstate::{BoxError, State};
    /// use std::time::Duration;
    ///
    /// let fetching = State::new("fetching").with_invoke_async(
    ///     |cancel| async move {
    ///         tokio::select! {
    ///             _ = tokio::time::sleep(Duration::from_millis(10)) => Ok::<(), BoxError>(()),
    ///             _ = cancel.cancelled() => Ok(()),
    ///         }
    ///     },
    ///     Some("ready"),
    ///     Some("failed"),
    /// );
    /// assert_eq!(fetching.services().len(), 1);
    /// ```
    pub fn with_invoke_async<F, Fut>(
        mut self,
        action: F,
        on_done: Option<&str>,
        on_error: Option<&str>,
    ) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let done_event = generated_event_id();
        let error_event = generated_event_id();

        self.insert_generated_transition(&done_event, on_done);
        self.insert_generated_transition(&error_event, on_error);

        self.push_service(Service::new(move |callback: Callback| {
            // fresh scope per invocation, cancelled with the state entry
            let token = callback.cancellation_token().child_token();
            let invocation = action(token.clone());
            let done_event = done_event.clone();
            let error_event = error_event.clone();

            async move {
                match invocation.await {
                    Ok(()) => {
                        if !token.is_cancelled() {
                            callback.raise(&done_event);
                        }
                    }
                    Err(error) => {
                        debug!(state = %callback.state_id(), error = %error, "Service action failed");
                        if !token.is_cancelled() {
                            callback.raise_error(&error_event, error);
                        }
                    }
                }
            }
        }));

        self
    }

    /// Run another state machine as a service.
    ///
    /// The child gets a private interpreter per invocation. Reaching a final
    /// state moves this machine to `on_done`; a child failure, or a child
    /// that settles in a non-final state, is routed to `on_error`. If this
    /// state is left through another path, the child is force-stopped.
    pub fn with_invoke_machine(
        self,
        machine: impl Into<Arc<StateMachine>>,
        on_done: Option<&str>,
        on_error: Option<&str>,
    ) -> Self {
        let machine = machine.into();
        self.with_invoke_async(
            move |cancel| run_child(Arc::clone(&machine), cancel),
            on_done,
            on_error,
        )
    }
}

async fn run_child(machine: Arc<StateMachine>, cancel: CancellationToken) -> ServiceResult {
    let child = Interpreter::new(machine);

    let stopper = child.clone();
    let hook = tokio::spawn(async move {
        cancel.cancelled().await;
        debug!(machine = %stopper.machine().id(), "Stopping nested machine");
        stopper.force_stop();
    });

    let outcome = child.run().await;
    hook.abort();

    match outcome? {
        RunOutcome::Done | RunOutcome::Stopped => Ok(()),
        RunOutcome::Settled { state_id } => Err(InterpreterError::ChildMachineIncomplete {
            machine: child.machine().id().to_string(),
            state: state_id,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::BoxError;

    #[test]
    fn routes_are_registered_only_for_given_targets() {
        let state = State::new("work").with_invoke_async(
            |_cancel| async { Ok::<(), BoxError>(()) },
            Some("done"),
            None,
        );

        assert_eq!(state.services().len(), 1);
        assert_eq!(state.transitions().len(), 1);
        assert!(state.transitions().values().any(|target| target == "done"));
    }

    #[test]
    fn generated_events_never_collide() {
        let state = State::new("work")
            .with_invoke_async(|_c| async { Ok::<(), BoxError>(()) }, Some("a"), Some("b"))
            .with_invoke_async(|_c| async { Ok::<(), BoxError>(()) }, Some("a"), Some("b"));

        assert_eq!(state.transitions().len(), 4);
        assert!(state.cleanup().is_empty());
    }

    #[test]
    fn nested_machine_registers_one_service() {
        let child = StateMachine::new("child", "child", "only")
            .unwrap()
            .with_states([State::new("only").as_final_state()]);

        let state = State::new("host").with_invoke_machine(child, Some("next"), Some("failed"));

        assert_eq!(state.services().len(), 1);
        assert_eq!(state.transitions().len(), 2);
    }
}
