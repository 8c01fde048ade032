//! Transition history of an interpreter run.
//!
//! History values are immutable: recording a transition returns a new
//! history and leaves the original untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of one transition taken by the interpreter.
///
/// # Example
///
/// ```rust
/// use netstate::StateTransition;
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: "red".to_string(),
///     to: "green".to_string(),
///     event: "TIMER".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.to, "green");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Id of the state that was left
    pub from: String,
    /// Id of the state that was entered
    pub to: String,
    /// Event that caused the transition
    pub event: String,
    /// When the transition was taken
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of transitions.
///
/// # Example
///
/// ```rust
/// use netstate::{StateHistory, StateTransition};
/// use chrono::Utc;
///
/// let step = |from: &str, to: &str| StateTransition {
///     from: from.to_string(),
///     to: to.to_string(),
///     event: "NEXT".to_string(),
///     timestamp: Utc::now(),
/// };
///
/// let history = StateHistory::new()
///     .record(step("red", "green"))
///     .record(step("green", "yellow"));
///
/// assert_eq!(history.get_path(), vec!["red", "green", "yellow"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: Vec<StateTransition>,
}

impl StateHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transition to a copy of this history.
    pub fn record(&self, transition: StateTransition) -> Self {
        let transitions = self
            .transitions
            .iter()
            .cloned()
            .chain(std::iter::once(transition))
            .collect();
        Self { transitions }
    }

    /// Ids of the states traversed: the first `from`, then every `to`.
    pub fn get_path(&self) -> Vec<&str> {
        self.transitions
            .first()
            .map(|first| first.from.as_str())
            .into_iter()
            .chain(self.transitions.iter().map(|t| t.to.as_str()))
            .collect()
    }

    /// Time between the first and last transition, `None` if empty.
    pub fn duration(&self) -> Option<Duration> {
        let first = self.transitions.first()?;
        let last = self.transitions.last()?;
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// The most recent transition.
    pub fn last(&self) -> Option<&StateTransition> {
        self.transitions.last()
    }

    /// All recorded transitions, oldest first.
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Number of recorded transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Whether no transition was recorded.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

impl FromIterator<StateTransition> for StateHistory {
    fn from_iter<I: IntoIterator<Item = StateTransition>>(iter: I) -> Self {
        Self {
            transitions: iter.into_iter().collect(),
        }
    }
}
