//! Static checks over a machine's state graph.
//!
//! The interpreter only discovers a dangling transition when it is taken.
//! [`validate_graph`] walks the whole graph up front and reports every
//! problem at once instead of stopping at the first.

use crate::core::StateMachine;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Problems found in a machine definition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphIssue {
    #[error("States are not defined for state machine '{machine}'")]
    MissingStates { machine: String },

    #[error("Initial state '{state}' of state machine '{machine}' was not found")]
    InitialStateNotFound { machine: String, state: String },

    #[error("State '{state}' transitions on '{event}' to unknown state '{target}'")]
    DanglingTransition {
        state: String,
        event: String,
        target: String,
    },
}

pub type GraphValidation = Validation<(), NonEmptyVec<GraphIssue>>;

/// Check that a machine can be started and that every transition lands on a
/// registered state.
///
/// # Example
///
/// ```rust
/// use netstate::{validation::GraphIssue, State, StateMachine};
/// use stillwater::validation::Validation;
///
/// let machine = StateMachine::new("m", "m", "a")
///     .unwrap()
///     .with_states([State::new("a").with_transition("GO", "b").unwrap()]);
///
/// match machine.validate() {
///     Validation::Failure(issues) => {
///         assert!(issues
///             .iter()
///             .any(|issue| matches!(issue, GraphIssue::DanglingTransition { .. })));
///     }
///     Validation::Success(_) => panic!("b is missing"),
/// }
/// ```
pub fn validate_graph(machine: &StateMachine) -> GraphValidation {
    let Some(states) = machine.states() else {
        return Validation::fail(GraphIssue::MissingStates {
            machine: machine.id().to_string(),
        });
    };

    let mut checks: Vec<GraphValidation> = Vec::new();

    checks.push(if machine.find_state(machine.initial_state_id()).is_some() {
        Validation::success(())
    } else {
        Validation::fail(GraphIssue::InitialStateNotFound {
            machine: machine.id().to_string(),
            state: machine.initial_state_id().to_string(),
        })
    });

    for state in states {
        let mut routes: Vec<(&String, &String)> = state
            .transitions()
            .iter()
            .filter(|(_, target)| !target.is_empty())
            .collect();
        routes.sort();

        for (event, target) in routes {
            if machine.find_state(target).is_none() {
                checks.push(Validation::fail(GraphIssue::DanglingTransition {
                    state: state.id().to_string(),
                    event: event.clone(),
                    target: target.clone(),
                }));
            }
        }
    }

    Validation::all_vec(checks).map(|_| ())
}
