//! Errors raised when starting or running a machine.

use crate::effects::ServiceError;
use thiserror::Error;

/// Errors that can occur while starting or running a state machine.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("State machine '{machine}' is already running")]
    AlreadyRunning { machine: String },

    #[error("States are not defined for state machine '{machine}'")]
    MissingStates { machine: String },

    #[error("Initial state '{state}' of state machine '{machine}' was not found")]
    InitialStateNotFound { machine: String, state: String },

    #[error("State '{from}' transitions on '{event}' to '{target}', but no state with that id is registered")]
    DanglingTransition {
        from: String,
        event: String,
        target: String,
    },

    #[error("Service of state '{state}' failed without an error route")]
    ServiceFailed {
        state: String,
        #[source]
        source: ServiceError,
    },

    #[error("A service or activity of state '{state}' panicked")]
    TaskPanicked { state: String },

    #[error("Nested state machine '{machine}' stopped in non-final state '{state}'")]
    ChildMachineIncomplete { machine: String, state: String },
}
