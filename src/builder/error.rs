//! Build errors for states and state machines.

use thiserror::Error;

/// Errors that can occur while configuring states and machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("State machine id must not be empty")]
    EmptyMachineId,

    #[error("State machine name must not be empty")]
    EmptyMachineName,

    #[error("Initial state id must not be empty")]
    EmptyInitialStateId,

    #[error("State '{state}' already has a transition for event '{event}'")]
    DuplicateTransition { state: String, event: String },
}
