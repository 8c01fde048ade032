//! A single node of the state graph and its fluent configuration.

use crate::builder::BuildError;
use crate::effects::{ActionChain, Activity, Callback, Service};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

/// Event id used by transient states to leave immediately.
pub const TRANSIENT_EVENT: &str = "";

/// How a state behaves once its enter actions have run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMode {
    /// Run services and activities until one of them raises a transition.
    #[default]
    Normal,
    /// Leave through the reserved empty event right after the enter actions.
    Transient,
    /// Running out of work, or any event, completes the machine.
    Final,
}

/// One state of a state machine.
///
/// A state is configured with a fluent API before being handed to a
/// [`StateMachine`](super::StateMachine). Once the interpreter runs, the
/// configuration is read-only.
///
/// # Example
///
/// ```rust
/// use netstate::{State, StateMode};
///
/// let green = State::new("green")
///     .with_action_on_enter(|| println!("go"))
///     .with_transition("TIMER", "yellow")
///     .unwrap();
///
/// assert_eq!(green.id(), "green");
/// assert_eq!(green.mode(), StateMode::Normal);
/// assert_eq!(green.target_of("TIMER"), Some("yellow"));
/// ```
pub struct State {
    id: String,
    mode: StateMode,
    transitions: HashMap<String, String>,
    enter_actions: ActionChain,
    exit_actions: ActionChain,
    services: Vec<Service>,
    activities: Vec<Activity>,
    cleanup: ActionChain,
}

impl State {
    /// Create a normal state with the given id. Ids must be unique per machine.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: StateMode::Normal,
            transitions: HashMap::new(),
            enter_actions: ActionChain::new(),
            exit_actions: ActionChain::new(),
            services: Vec::new(),
            activities: Vec::new(),
            cleanup: ActionChain::new(),
        }
    }

    /// Unique id of the state within its machine.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the state is normal, transient or final.
    pub fn mode(&self) -> StateMode {
        self.mode
    }

    /// Registered transitions, event id to target state id.
    pub fn transitions(&self) -> &HashMap<String, String> {
        &self.transitions
    }

    /// Target state id for an event, if one is registered and non-empty.
    pub fn target_of(&self, event_id: &str) -> Option<&str> {
        self.transitions
            .get(event_id)
            .map(String::as_str)
            .filter(|target| !target.is_empty())
    }

    /// Actions run, in order, each time the state is entered.
    pub fn enter_actions(&self) -> &ActionChain {
        &self.enter_actions
    }

    /// Actions run, in order, after the cleanup chain when the state is left.
    pub fn exit_actions(&self) -> &ActionChain {
        &self.exit_actions
    }

    /// Services started on every entry; each may raise an event.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Activities started on every entry; they cannot raise events.
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    /// Combined cleanup of all services and activities, run once per exit.
    pub fn cleanup(&self) -> &ActionChain {
        &self.cleanup
    }

    /// Register a transition to `target_state_id` when `event_id` is raised.
    ///
    /// Fails if the state already has a transition for `event_id`.
    pub fn with_transition(
        mut self,
        event_id: impl Into<String>,
        target_state_id: impl Into<String>,
    ) -> Result<Self, BuildError> {
        self.insert_transition(event_id.into(), target_state_id.into())?;
        Ok(self)
    }

    /// Append an action run on every entry, before services start.
    pub fn with_action_on_enter<F>(mut self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.enter_actions.push(action);
        self
    }

    /// Append an action run on every exit, after the cleanup chain.
    pub fn with_action_on_exit<F>(mut self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.exit_actions.push(action);
        self
    }

    /// Run a background activity while the state is active.
    ///
    /// Activities cannot raise events; they are stopped when the state exits.
    pub fn with_activity<F, Fut>(mut self, activity: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.activities.push(Activity::new(activity));
        self
    }

    /// Run a background activity and call `cleanup` when the state exits.
    pub fn with_activity_and_cleanup<F, Fut, C>(self, activity: F, cleanup: C) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        let mut state = self.with_activity(activity);
        state.cleanup.push(cleanup);
        state
    }

    /// Invoke a service that may raise events through its [`Callback`].
    pub fn with_invoke<F, Fut>(mut self, service: F) -> Self
    where
        F: Fn(Callback) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.services.push(Service::new(service));
        self
    }

    /// Invoke a service and call `cleanup` when the state exits.
    pub fn with_invoke_and_cleanup<F, Fut, C>(self, service: F, cleanup: C) -> Self
    where
        F: Fn(Callback) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        let mut state = self.with_invoke(service);
        state.cleanup.push(cleanup);
        state
    }

    /// Make this a transient state leaving for `target_state_id` right after entry.
    ///
    /// Services and activities of a transient state never run.
    pub fn as_transient_state(
        mut self,
        target_state_id: impl Into<String>,
    ) -> Result<Self, BuildError> {
        self.mode = StateMode::Transient;
        self.insert_transition(TRANSIENT_EVENT.to_string(), target_state_id.into())?;
        Ok(self)
    }

    /// Make this a final state: finishing it completes the machine.
    pub fn as_final_state(mut self) -> Self {
        self.mode = StateMode::Final;
        self
    }

    fn insert_transition(&mut self, event_id: String, target: String) -> Result<(), BuildError> {
        match self.transitions.entry(event_id) {
            Entry::Occupied(entry) => Err(BuildError::DuplicateTransition {
                state: self.id.clone(),
                event: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(target);
                Ok(())
            }
        }
    }

    /// Register a transition under a generated, collision-free event id.
    pub(crate) fn insert_generated_transition(&mut self, event_id: &str, target: Option<&str>) {
        if let Some(target) = target {
            self.transitions
                .insert(event_id.to_string(), target.to_string());
        }
    }

    pub(crate) fn push_service(&mut self, service: Service) {
        self.services.push(service);
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("transitions", &self.transitions)
            .field("enter_actions", &self.enter_actions.len())
            .field("exit_actions", &self.exit_actions.len())
            .field("services", &self.services.len())
            .field("activities", &self.activities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_normal_and_empty() {
        let state = State::new("idle");

        assert_eq!(state.id(), "idle");
        assert_eq!(state.mode(), StateMode::Normal);
        assert!(state.transitions().is_empty());
        assert!(state.services().is_empty());
        assert!(state.activities().is_empty());
        assert!(state.cleanup().is_empty());
    }

    #[test]
    fn duplicate_transition_is_rejected() {
        let result = State::new("idle")
            .with_transition("GO", "a")
            .unwrap()
            .with_transition("GO", "b");

        match result {
            Err(BuildError::DuplicateTransition { state, event }) => {
                assert_eq!(state, "idle");
                assert_eq!(event, "GO");
            }
            other => panic!("Expected DuplicateTransition, got {:?}", other),
        }
    }

    #[test]
    fn empty_target_is_not_a_route() {
        let state = State::new("idle").with_transition("NOWHERE", "").unwrap();

        assert!(state.transitions().contains_key("NOWHERE"));
        assert_eq!(state.target_of("NOWHERE"), None);
    }

    #[test]
    fn transient_state_registers_reserved_event() {
        let state = State::new("check").as_transient_state("next").unwrap();

        assert_eq!(state.mode(), StateMode::Transient);
        assert_eq!(state.target_of(TRANSIENT_EVENT), Some("next"));
    }

    #[test]
    fn transient_state_conflicts_with_empty_event_transition() {
        let result = State::new("check")
            .with_transition("", "elsewhere")
            .unwrap()
            .as_transient_state("next");

        assert!(matches!(
            result,
            Err(BuildError::DuplicateTransition { .. })
        ));
    }

    #[test]
    fn cleanups_are_chained_for_services_and_activities() {
        let state = State::new("busy")
            .with_invoke_and_cleanup(|_cb| async {}, || {})
            .with_activity_and_cleanup(|| async {}, || {})
            .with_invoke(|_cb| async {})
            .with_activity(|| async {});

        assert_eq!(state.services().len(), 2);
        assert_eq!(state.activities().len(), 2);
        assert_eq!(state.cleanup().len(), 2);
    }

    #[test]
    fn final_state_mode_is_set() {
        let state = State::new("done").as_final_state();
        assert_eq!(state.mode(), StateMode::Final);
    }

    #[test]
    fn state_mode_serializes_correctly() {
        let json = serde_json::to_string(&StateMode::Transient).unwrap();
        assert_eq!(json, "\"transient\"");
        let mode: StateMode = serde_json::from_str(&json).unwrap();
        assert_eq!(mode, StateMode::Transient);
    }
}
