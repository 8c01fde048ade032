//! NetState: an async hierarchical state machine engine
//!
//! A machine is a graph of named [`State`]s joined by event-labelled
//! transitions. Entering a state runs its enter actions, then starts its
//! services and activities concurrently. The first service to raise an
//! event with a registered transition wins; everything else running in the
//! state is cancelled before the exit actions run and the machine moves on.
//!
//! # Core Concepts
//!
//! - **State**: actions, services, activities, transitions and a mode
//!   (normal, transient or final)
//! - **Services**: async tasks handed a [`Callback`] that can raise events
//! - **Activities**: async tasks with no say in transitions
//! - **Interpreter**: drives one machine from its initial state to completion
//! - **History**: immutable record of the transitions a run took
//!
//! # Example
//!
//! ```rust
//! use netstate::{Interpreter, RunOutcome, State, StateMachine};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let machine = StateMachine::new("light", "Traffic light", "red")?.with_states([
//!     State::new("red").with_timeout(Duration::from_millis(5), "green"),
//!     State::new("green")
//!         .with_invoke(|callback| async move {
//!             callback.raise("SHUTDOWN");
//!         })
//!         .with_transition("SHUTDOWN", "off")?,
//!     State::new("off").as_final_state(),
//! ]);
//!
//! let interpreter = Interpreter::new(machine);
//! assert_eq!(interpreter.run().await?, RunOutcome::Done);
//! assert_eq!(interpreter.history().get_path(), vec!["red", "green", "off"]);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod effects;
pub mod interpreter;
pub mod validation;

// Re-export commonly used types
pub use crate::builder::BuildError;
pub use crate::core::{State, StateHistory, StateMachine, StateMode, StateTransition, TRANSIENT_EVENT};
pub use crate::effects::{BoxError, Callback, ServiceError, ServiceResult};
pub use crate::interpreter::{
    Interpreter, InterpreterError, RunOutcome, RunStatus, StateChange, DEFAULT_HISTORY_LIMIT,
};
pub use crate::validation::{GraphIssue, GraphValidation};
pub use tokio_util::sync::CancellationToken;
