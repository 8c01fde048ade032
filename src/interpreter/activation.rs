//! One entry into a state: enter actions, concurrent work, the winning
//! event and teardown.

use super::InterpreterError;
use crate::core::{State, StateMode, TRANSIENT_EVENT};
use crate::effects::{Callback, Decision, ServiceError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What the interpreter should do after a state entry finished.
#[derive(Debug)]
pub(crate) enum Step {
    /// Enter `target` next
    Transition {
        target: String,
        event: String,
        error: Option<ServiceError>,
    },
    /// A final state completed; the machine is done
    Done,
    /// A normal state ran out of work without raising an event
    Settled,
    /// The run was force-stopped
    Stopped,
}

enum Ended {
    Decided(Decision),
    Settled,
    Stopped,
    Panicked,
}

pub(crate) struct Activation {
    state: Arc<State>,
    run: CancellationToken,
    scope: CancellationToken,
}

impl Activation {
    pub(crate) fn new(state: Arc<State>, run: &CancellationToken) -> Self {
        Self {
            state,
            run: run.clone(),
            scope: run.child_token(),
        }
    }

    pub(crate) async fn run(self) -> Result<Step, InterpreterError> {
        debug!(state = %self.state.id(), mode = ?self.state.mode(), "Entering state");

        self.state.enter_actions().invoke();
        let mut cleanup = CleanupGuard::new(&self);

        if self.state.mode() == StateMode::Transient {
            let mut tasks = JoinSet::new();
            self.teardown(&mut tasks, &mut cleanup).await;
            self.state.exit_actions().invoke();
            return self.resolve(Decision::new(TRANSIENT_EVENT, None));
        }

        let (decisions, mut inbox) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        {
            let callback = Callback::new(Arc::clone(&self.state), self.scope.clone(), decisions);
            for service in self.state.services() {
                tasks.spawn(service.invoke(callback.clone()));
            }
            for activity in self.state.activities() {
                tasks.spawn(activity.run());
            }
        }

        let mut callbacks_open = true;
        let ended = loop {
            if !callbacks_open && tasks.is_empty() {
                break Ended::Settled;
            }

            tokio::select! {
                biased;

                _ = self.run.cancelled() => break Ended::Stopped,

                decision = inbox.recv(), if callbacks_open => match decision {
                    Some(decision) => break Ended::Decided(decision),
                    None => callbacks_open = false,
                },

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            break Ended::Panicked;
                        }
                    }
                }
            }
        };

        self.teardown(&mut tasks, &mut cleanup).await;

        match ended {
            Ended::Decided(decision) => {
                self.state.exit_actions().invoke();
                self.resolve(decision)
            }
            Ended::Settled if self.state.mode() == StateMode::Final => {
                debug!(state = %self.state.id(), "Final state finished its work");
                self.state.exit_actions().invoke();
                Ok(Step::Done)
            }
            Ended::Settled => {
                debug!(state = %self.state.id(), "State settled without raising an event");
                Ok(Step::Settled)
            }
            Ended::Stopped => {
                debug!(state = %self.state.id(), "Run stopped while in state");
                Ok(Step::Stopped)
            }
            Ended::Panicked => Err(InterpreterError::TaskPanicked {
                state: self.state.id().to_string(),
            }),
        }
    }

    /// Cancel in-flight work, run the cleanup chain and wait for all tasks
    /// to be gone.
    async fn teardown(&self, tasks: &mut JoinSet<()>, cleanup: &mut CleanupGuard) {
        cleanup.run();

        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    warn!(state = %self.state.id(), "Task panicked while state was being left");
                }
            }
        }
    }

    fn resolve(&self, decision: Decision) -> Result<Step, InterpreterError> {
        let Decision { event, error } = decision;

        if self.state.mode() == StateMode::Final {
            return match error {
                Some(source) => Err(InterpreterError::ServiceFailed {
                    state: self.state.id().to_string(),
                    source,
                }),
                None => Ok(Step::Done),
            };
        }

        match (self.state.target_of(&event), error) {
            (Some(target), error) => Ok(Step::Transition {
                target: target.to_string(),
                event,
                error,
            }),
            (None, Some(source)) => Err(InterpreterError::ServiceFailed {
                state: self.state.id().to_string(),
                source,
            }),
            (None, None) => {
                warn!(state = %self.state.id(), event = %event, "Transition has no target state");
                Ok(Step::Settled)
            }
        }
    }
}

/// Cancels the entry's scope and runs the cleanup chain exactly once, either
/// during teardown or when the activation is dropped mid-flight, as happens
/// to a nested machine whose host state is left.
struct CleanupGuard {
    state: Arc<State>,
    scope: CancellationToken,
    armed: bool,
}

impl CleanupGuard {
    fn new(activation: &Activation) -> Self {
        Self {
            state: Arc::clone(&activation.state),
            scope: activation.scope.clone(),
            armed: true,
        }
    }

    fn run(&mut self) {
        if std::mem::take(&mut self.armed) {
            self.scope.cancel();
            self.state.cleanup().invoke();
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn Fn() + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::clone(&log);
        let make = move |entry: &'static str| -> Box<dyn Fn() + Send + Sync> {
            let log = Arc::clone(&handle);
            Box::new(move || log.lock().unwrap().push(entry))
        };
        (log, make)
    }

    #[tokio::test]
    async fn cleanup_runs_before_exit_actions() {
        let (log, make) = recorder();
        let state = State::new("a")
            .with_action_on_enter(make("enter"))
            .with_action_on_exit(make("exit"))
            .with_invoke_and_cleanup(
                |callback| async move {
                    callback.raise("GO");
                },
                make("cleanup"),
            )
            .with_transition("GO", "b")
            .unwrap();

        let run = CancellationToken::new();
        let step = Activation::new(Arc::new(state), &run).run().await.unwrap();

        assert!(matches!(step, Step::Transition { ref target, .. } if target == "b"));
        assert_eq!(*log.lock().unwrap(), vec!["enter", "cleanup", "exit"]);
    }

    #[tokio::test]
    async fn stopped_run_skips_exit_actions() {
        let (log, make) = recorder();
        let state = State::new("a")
            .with_action_on_exit(make("exit"))
            .with_invoke_and_cleanup(
                |callback| async move {
                    callback.cancellation_token().cancelled().await;
                },
                make("cleanup"),
            );

        let run = CancellationToken::new();
        run.cancel();
        let step = Activation::new(Arc::new(state), &run).run().await.unwrap();

        assert!(matches!(step, Step::Stopped));
        assert_eq!(*log.lock().unwrap(), vec!["cleanup"]);
    }

    #[tokio::test]
    async fn dropped_activation_still_cleans_up() {
        let (log, make) = recorder();
        let state = State::new("a").with_invoke_and_cleanup(
            |callback| async move {
                callback.cancellation_token().cancelled().await;
            },
            make("cleanup"),
        );

        let run = CancellationToken::new();
        let activation = Activation::new(Arc::new(state), &run).run();
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), activation).await;

        assert!(timed_out.is_err());
        assert_eq!(*log.lock().unwrap(), vec!["cleanup"]);
    }

    #[tokio::test]
    async fn transient_state_resolves_reserved_event() {
        let state = State::new("a").as_transient_state("b").unwrap();

        let step = Activation::new(Arc::new(state), &CancellationToken::new())
            .run()
            .await
            .unwrap();

        match step {
            Step::Transition { target, event, error } => {
                assert_eq!(target, "b");
                assert_eq!(event, TRANSIENT_EVENT);
                assert!(error.is_none());
            }
            other => panic!("Expected transition, got {:?}", other),
        }
    }
}
