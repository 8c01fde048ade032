//! State machine descriptor: identity, initial state and the state graph.

use super::State;
use crate::builder::BuildError;
use crate::validation::{self, GraphValidation};
use std::sync::Arc;

/// Immutable description of a state machine, run by an
/// [`Interpreter`](crate::interpreter::Interpreter).
///
/// Id, name and initial state id are validated when the machine is
/// created. The states themselves are only checked when a run starts, so
/// they may be bound after construction.
///
/// # Example
///
/// ```rust
/// use netstate::{State, StateMachine};
///
/// let machine = StateMachine::new("light", "Traffic light", "red")
///     .unwrap()
///     .with_states([
///         State::new("red").with_transition("NEXT", "green").unwrap(),
///         State::new("green").as_final_state(),
///     ]);
///
/// assert_eq!(machine.initial_state_id(), "red");
/// assert!(machine.find_state("green").is_some());
/// ```
#[derive(Debug)]
pub struct StateMachine {
    id: String,
    name: String,
    initial_state_id: String,
    states: Option<Vec<Arc<State>>>,
}

impl StateMachine {
    /// Create a machine descriptor without states.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        initial_state_id: impl Into<String>,
    ) -> Result<Self, BuildError> {
        let id = id.into();
        let name = name.into();
        let initial_state_id = initial_state_id.into();

        if id.is_empty() {
            return Err(BuildError::EmptyMachineId);
        }
        if name.is_empty() {
            return Err(BuildError::EmptyMachineName);
        }
        if initial_state_id.is_empty() {
            return Err(BuildError::EmptyInitialStateId);
        }

        Ok(Self {
            id,
            name,
            initial_state_id,
            states: None,
        })
    }

    /// Bind the states of the machine, replacing any previous ones.
    pub fn with_states(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.set_states(states);
        self
    }

    /// Bind the states of the machine, replacing any previous ones.
    pub fn set_states(&mut self, states: impl IntoIterator<Item = State>) {
        self.states = Some(states.into_iter().map(Arc::new).collect());
    }

    /// Remove all states; a run will then fail to start.
    pub fn clear_states(&mut self) {
        self.states = None;
    }

    /// Machine id, used in errors and logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable machine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the state a run starts in.
    pub fn initial_state_id(&self) -> &str {
        &self.initial_state_id
    }

    /// The bound states, or `None` if no states were set.
    pub fn states(&self) -> Option<&[Arc<State>]> {
        self.states.as_deref()
    }

    /// Find a state by id. The first match wins.
    pub fn find_state(&self, state_id: &str) -> Option<Arc<State>> {
        self.states
            .as_ref()?
            .iter()
            .find(|state| state.id() == state_id)
            .cloned()
    }

    /// Check that the initial state and every transition target exist,
    /// reporting all problems at once.
    ///
    /// This never runs implicitly; the interpreter only checks what it needs
    /// to start.
    pub fn validate(&self) -> GraphValidation {
        validation::validate_graph(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_id_is_rejected() {
        let result = StateMachine::new("", "machine 1", "state1");
        assert!(matches!(result, Err(BuildError::EmptyMachineId)));
    }

    #[test]
    fn empty_name_is_rejected() {
        let result = StateMachine::new("machine1", "", "state1");
        assert!(matches!(result, Err(BuildError::EmptyMachineName)));
    }

    #[test]
    fn empty_initial_state_is_rejected() {
        let result = StateMachine::new("machine1", "machine 1", "");
        assert!(matches!(result, Err(BuildError::EmptyInitialStateId)));
    }

    #[test]
    fn states_can_be_bound_late() {
        let mut machine = StateMachine::new("machine1", "machine 1", "state1").unwrap();
        assert!(machine.states().is_none());

        machine.set_states([State::new("state1")]);
        assert_eq!(machine.states().map(<[_]>::len), Some(1));

        machine.clear_states();
        assert!(machine.states().is_none());
    }

    #[test]
    fn find_state_returns_first_match() {
        let machine = StateMachine::new("machine1", "machine 1", "a")
            .unwrap()
            .with_states([
                State::new("a"),
                State::new("b").as_final_state(),
                State::new("b"),
            ]);

        let found = machine.find_state("b").unwrap();
        assert_eq!(found.mode(), crate::core::StateMode::Final);
        assert!(machine.find_state("missing").is_none());
    }
}
