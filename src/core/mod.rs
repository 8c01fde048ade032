//! Core state graph types.
//!
//! This module holds the declarative side of a machine:
//! - [`State`]: a node with actions, services, activities and transitions
//! - [`StateMachine`]: the validated descriptor tying states together
//! - [`StateHistory`]: immutable record of transitions taken during a run
//!
//! Nothing here executes; running a machine is the job of the
//! [`Interpreter`](crate::interpreter::Interpreter).

mod history;
mod machine;
mod state;

pub use history::{StateHistory, StateTransition};
pub use machine::StateMachine;
pub use state::{State, StateMode, TRANSIENT_EVENT};
