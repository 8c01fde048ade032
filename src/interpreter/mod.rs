//! Execution engine for state machines.
//!
//! An [`Interpreter`] is bound to one [`StateMachine`] and drives it from the
//! initial state until a final state completes, the run is stopped, or an
//! unrecoverable error occurs.
//!
//! # Run protocol
//!
//! For every state entered the interpreter:
//! 1. notifies state-changed observers
//! 2. runs the enter actions in order
//! 3. launches every service and activity concurrently
//! 4. waits for the first event that takes effect
//! 5. cancels remaining work, runs the cleanup chain, then the exit actions
//! 6. moves to the target state
//!
//! Transient states skip 3 and 4. Final states complete the machine instead
//! of moving on.
//!
//! # Example
//!
//! ```rust
//! use netstate::{Interpreter, RunOutcome, State, StateMachine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let machine = StateMachine::new("greeter", "Greeter", "hello")?.with_states([
//!     State::new("hello")
//!         .with_invoke(|callback| async move {
//!             callback.raise("DONE");
//!         })
//!         .with_transition("DONE", "bye")?,
//!     State::new("bye").as_final_state(),
//! ]);
//!
//! let interpreter = Interpreter::new(machine);
//! interpreter.on_state_changed(|change| println!("now in {}", change.state_id()));
//!
//! assert_eq!(interpreter.run().await?, RunOutcome::Done);
//! # Ok(())
//! # }
//! ```

mod activation;
mod error;
mod events;

pub use error::InterpreterError;
pub use events::StateChange;

use crate::core::{State, StateHistory, StateMachine, StateTransition};
use crate::effects::ServiceError;
use activation::{Activation, Step};
use chrono::Utc;
use events::Observers;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Number of transitions an interpreter keeps unless told otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// How a run ended without error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// A final state completed and `MachineDone` was emitted
    Done,
    /// The run was force-stopped
    Stopped,
    /// A normal state ran out of work without transitioning
    Settled { state_id: String },
}

/// Lifecycle status of an interpreter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Never started
    #[default]
    Idle,
    /// A run is in progress
    Running,
    /// Last run completed through a final state
    Done,
    /// Last run ended with an error
    Faulted,
    /// Last run was force-stopped
    Stopped,
    /// Last run settled in a non-final state
    Settled,
}

/// Runs a [`StateMachine`].
///
/// Cloning yields another handle to the same interpreter; use a clone to
/// stop a run from another task.
#[derive(Clone)]
pub struct Interpreter {
    inner: Arc<Inner>,
}

struct Inner {
    machine: Arc<StateMachine>,
    run: Mutex<RunSlot>,
    observers: Observers,
    history: Mutex<RunHistory>,
}

#[derive(Default)]
struct RunSlot {
    token: Option<CancellationToken>,
    status: RunStatus,
}

/// Most recent transitions of a run, oldest dropped first.
struct RunHistory {
    entries: VecDeque<StateTransition>,
    limit: usize,
}

impl RunHistory {
    fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    fn push(&mut self, transition: StateTransition) {
        if self.limit == 0 {
            return;
        }
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        let excess = self.entries.len().saturating_sub(limit);
        self.entries.drain(..excess);
    }
}

impl Interpreter {
    /// Bind a new interpreter to a machine.
    pub fn new(machine: impl Into<Arc<StateMachine>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                machine: machine.into(),
                run: Mutex::new(RunSlot::default()),
                observers: Observers::default(),
                history: Mutex::new(RunHistory::with_limit(DEFAULT_HISTORY_LIMIT)),
            }),
        }
    }

    /// Keep at most `limit` transitions in [`history`](Self::history).
    ///
    /// Older transitions are dropped first; a limit of zero disables
    /// recording. Defaults to [`DEFAULT_HISTORY_LIMIT`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use netstate::{Interpreter, State, StateMachine};
    ///
    /// let machine = StateMachine::new("m", "m", "a")
    ///     .unwrap()
    ///     .with_states([State::new("a").as_final_state()]);
    ///
    /// let interpreter = Interpreter::new(machine).with_history_limit(64);
    /// assert!(interpreter.history().is_empty());
    /// ```
    pub fn with_history_limit(self, limit: usize) -> Self {
        self.lock_history().set_limit(limit);
        self
    }

    /// The machine this interpreter runs.
    pub fn machine(&self) -> &StateMachine {
        &self.inner.machine
    }

    /// Register a handler called every time a state is entered.
    pub fn on_state_changed<F>(&self, handler: F)
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.inner.observers.add_state_changed(Arc::new(handler));
    }

    /// Register a handler called once when a run completes through a final state.
    pub fn on_machine_done<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.observers.add_machine_done(Arc::new(handler));
    }

    /// Lifecycle status: running, or how the last run ended.
    pub fn status(&self) -> RunStatus {
        self.lock_slot().status
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.lock_slot().token.is_some()
    }

    /// Snapshot of the most recent transitions of the current or last run.
    pub fn history(&self) -> StateHistory {
        self.lock_history().entries.iter().cloned().collect()
    }

    /// Run the machine and wait until the run ends.
    pub async fn run(&self) -> Result<RunOutcome, InterpreterError> {
        let (token, initial) = self.begin()?;
        self.execute(token, initial).await
    }

    /// Start the machine in the background.
    ///
    /// Start checks happen before this returns; the handle resolves to the
    /// run result.
    ///
    /// # Panics
    ///
    /// Panics if called outside the context of a tokio runtime.
    pub fn start(&self) -> Result<JoinHandle<Result<RunOutcome, InterpreterError>>, InterpreterError> {
        let (token, initial) = self.begin()?;
        let interpreter = self.clone();
        Ok(tokio::spawn(async move {
            interpreter.execute(token, initial).await
        }))
    }

    /// Stop the current run. A no-op when idle.
    ///
    /// The active state's work is cancelled and its cleanup chain runs; exit
    /// actions do not run and no further notifications are emitted.
    pub fn force_stop(&self) {
        if let Some(token) = &self.lock_slot().token {
            info!(machine = %self.inner.machine.id(), "Force stopping state machine");
            token.cancel();
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, RunSlot> {
        self.inner
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, RunHistory> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<(CancellationToken, Arc<State>), InterpreterError> {
        let machine = &self.inner.machine;
        let mut slot = self.lock_slot();

        if slot.token.is_some() {
            return Err(InterpreterError::AlreadyRunning {
                machine: machine.id().to_string(),
            });
        }

        if machine.states().is_none() {
            return Err(InterpreterError::MissingStates {
                machine: machine.id().to_string(),
            });
        }

        let initial = machine.find_state(machine.initial_state_id()).ok_or_else(|| {
            InterpreterError::InitialStateNotFound {
                machine: machine.id().to_string(),
                state: machine.initial_state_id().to_string(),
            }
        })?;

        let token = CancellationToken::new();
        slot.token = Some(token.clone());
        slot.status = RunStatus::Running;
        self.lock_history().entries.clear();

        Ok((token, initial))
    }

    async fn execute(
        &self,
        token: CancellationToken,
        initial: Arc<State>,
    ) -> Result<RunOutcome, InterpreterError> {
        let mut guard = RunGuard::new(Arc::clone(&self.inner));
        let machine_id = self.inner.machine.id().to_string();

        info!(machine = %machine_id, initial = %initial.id(), "Starting state machine");
        let result = self.drive(&token, initial).await;

        match &result {
            Ok(outcome) => {
                info!(machine = %machine_id, outcome = ?outcome, "State machine finished");
                guard.finish(match outcome {
                    RunOutcome::Done => RunStatus::Done,
                    RunOutcome::Stopped => RunStatus::Stopped,
                    RunOutcome::Settled { .. } => RunStatus::Settled,
                });
            }
            Err(err) => {
                error!(machine = %machine_id, error = %err, "State machine failed");
                guard.finish(RunStatus::Faulted);
            }
        }

        result
    }

    async fn drive(
        &self,
        token: &CancellationToken,
        initial: Arc<State>,
    ) -> Result<RunOutcome, InterpreterError> {
        let machine = &self.inner.machine;
        let mut current = initial;
        let mut previous: Option<Arc<State>> = None;
        let mut cause: Option<(String, Option<ServiceError>)> = None;

        loop {
            if token.is_cancelled() {
                return Ok(RunOutcome::Stopped);
            }

            let (event, error) = match cause.take() {
                Some((event, error)) => (Some(event), error),
                None => (None, None),
            };
            self.inner.observers.notify_state_changed(&StateChange {
                state: Arc::clone(&current),
                previous: previous.take(),
                event,
                error,
            });

            match Activation::new(Arc::clone(&current), token).run().await? {
                Step::Transition {
                    target,
                    event,
                    error,
                } => {
                    let next = machine.find_state(&target).ok_or_else(|| {
                        InterpreterError::DanglingTransition {
                            from: current.id().to_string(),
                            event: event.clone(),
                            target: target.clone(),
                        }
                    })?;

                    debug!(from = %current.id(), to = %next.id(), event = %event, "Transition");
                    self.record(current.id(), next.id(), &event);

                    cause = Some((event, error));
                    previous = Some(std::mem::replace(&mut current, next));
                }
                Step::Done => {
                    self.inner.observers.notify_machine_done();
                    return Ok(RunOutcome::Done);
                }
                Step::Settled => {
                    return Ok(RunOutcome::Settled {
                        state_id: current.id().to_string(),
                    });
                }
                Step::Stopped => return Ok(RunOutcome::Stopped),
            }
        }
    }

    fn record(&self, from: &str, to: &str, event: &str) {
        self.lock_history().push(StateTransition {
            from: from.to_string(),
            to: to.to_string(),
            event: event.to_string(),
            timestamp: Utc::now(),
        });
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("machine", &self.inner.machine.id())
            .field("status", &self.status())
            .finish()
    }
}

/// Releases the run slot when a run ends, including when its future is
/// dropped mid-run.
struct RunGuard {
    inner: Arc<Inner>,
    status: RunStatus,
}

impl RunGuard {
    fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            status: RunStatus::Stopped,
        }
    }

    fn finish(&mut self, status: RunStatus) {
        self.status = status;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut slot = self
            .inner
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slot.token = None;
        slot.status = self.status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with(states: Vec<State>) -> StateMachine {
        StateMachine::new("machine1", "machine 1", "state1")
            .unwrap()
            .with_states(states)
    }

    #[tokio::test]
    async fn run_without_states_fails() {
        let machine = StateMachine::new("machine1", "machine 1", "state1").unwrap();
        let interpreter = Interpreter::new(machine);

        let result = interpreter.run().await;

        assert!(matches!(result, Err(InterpreterError::MissingStates { .. })));
        assert_eq!(interpreter.status(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn run_with_unknown_initial_state_fails() {
        let interpreter = Interpreter::new(machine_with(vec![State::new("other")]));

        let result = interpreter.run().await;

        match result {
            Err(InterpreterError::InitialStateNotFound { machine, state }) => {
                assert_eq!(machine, "machine1");
                assert_eq!(state, "state1");
            }
            other => panic!("Expected InitialStateNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn final_initial_state_completes() {
        let interpreter = Interpreter::new(machine_with(vec![State::new("state1").as_final_state()]));

        let outcome = interpreter.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(interpreter.status(), RunStatus::Done);
        assert!(!interpreter.is_running());
    }

    #[tokio::test]
    async fn normal_state_without_work_settles() {
        let interpreter = Interpreter::new(machine_with(vec![State::new("state1")]));

        let outcome = interpreter.run().await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Settled {
                state_id: "state1".to_string()
            }
        );
        assert_eq!(interpreter.status(), RunStatus::Settled);
    }

    #[tokio::test]
    async fn interpreter_can_run_again_after_finishing() {
        let interpreter = Interpreter::new(machine_with(vec![State::new("state1").as_final_state()]));

        assert_eq!(interpreter.run().await.unwrap(), RunOutcome::Done);
        assert_eq!(interpreter.run().await.unwrap(), RunOutcome::Done);
    }

    #[tokio::test]
    async fn force_stop_when_idle_is_a_no_op() {
        let interpreter = Interpreter::new(machine_with(vec![State::new("state1")]));
        interpreter.force_stop();
        assert_eq!(interpreter.status(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn history_records_each_transition() {
        let interpreter = Interpreter::new(machine_with(vec![
            State::new("state1").as_transient_state("state2").unwrap(),
            State::new("state2").as_transient_state("state3").unwrap(),
            State::new("state3").as_final_state(),
        ]));

        interpreter.run().await.unwrap();

        let history = interpreter.history();
        assert_eq!(history.get_path(), vec!["state1", "state2", "state3"]);
        assert!(history.transitions().iter().all(|t| t.event.is_empty()));
    }

    fn step(to: &str) -> StateTransition {
        StateTransition {
            from: "a".to_string(),
            to: to.to_string(),
            event: "NEXT".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn run_history_drops_oldest_at_limit() {
        let mut history = RunHistory::with_limit(2);
        for to in ["b", "c", "d"] {
            history.push(step(to));
        }

        let kept: Vec<&str> = history.entries.iter().map(|t| t.to.as_str()).collect();
        assert_eq!(kept, vec!["c", "d"]);
    }

    #[test]
    fn zero_limit_records_nothing() {
        let mut history = RunHistory::with_limit(0);
        history.push(step("b"));
        assert!(history.entries.is_empty());
    }

    #[test]
    fn lowering_limit_trims_existing_entries() {
        let mut history = RunHistory::with_limit(8);
        for to in ["b", "c", "d", "e"] {
            history.push(step(to));
        }

        history.set_limit(1);

        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.entries[0].to, "e");
    }

    #[tokio::test]
    async fn dangling_target_is_fatal() {
        let interpreter = Interpreter::new(machine_with(vec![State::new("state1")
            .as_transient_state("nowhere")
            .unwrap()]));

        let result = interpreter.run().await;

        match result {
            Err(InterpreterError::DanglingTransition { from, target, .. }) => {
                assert_eq!(from, "state1");
                assert_eq!(target, "nowhere");
            }
            other => panic!("Expected DanglingTransition, got {:?}", other),
        }
        assert_eq!(interpreter.status(), RunStatus::Faulted);
    }

    #[tokio::test]
    async fn panicking_service_is_fatal() {
        let interpreter = Interpreter::new(machine_with(vec![State::new("state1")
            .with_invoke(|_callback| async {
                let fail = true;
                if fail {
                    panic!("service blew up");
                }
            })]));

        let result = interpreter.run().await;

        assert!(matches!(result, Err(InterpreterError::TaskPanicked { .. })));
    }
}
