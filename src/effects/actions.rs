//! Ordered chains of synchronous actions.

use std::fmt;
use std::sync::Arc;

/// A zero-argument synchronous action.
pub type Action = Arc<dyn Fn() + Send + Sync>;

/// Ordered list of actions invoked one after another.
///
/// Used for enter actions, exit actions and the cleanup chain of a state.
/// Each action fully completes before the next one starts.
///
/// # Example
///
/// ```rust
/// use netstate::effects::ActionChain;
/// use std::sync::{Arc, Mutex};
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let mut chain = ActionChain::new();
///
/// let first = Arc::clone(&log);
/// chain.push(move || first.lock().unwrap().push(1));
/// let second = Arc::clone(&log);
/// chain.push(move || second.lock().unwrap().push(2));
///
/// chain.invoke();
/// assert_eq!(*log.lock().unwrap(), vec![1, 2]);
/// ```
#[derive(Clone, Default)]
pub struct ActionChain {
    actions: Vec<Action>,
}

impl ActionChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Append an action to the end of the chain.
    pub fn push<F>(&mut self, action: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.actions.push(Arc::new(action));
    }

    /// Number of actions in the chain.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the chain has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in registration order.
    pub fn invoke(&self) {
        for action in &self.actions {
            action();
        }
    }
}

impl fmt::Debug for ActionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionChain")
            .field("len", &self.actions.len())
            .finish()
    }
}
