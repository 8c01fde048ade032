//! Builder API for declaring what a state does.
//!
//! The basic fluent methods live on [`State`](crate::core::State) itself.
//! This module adds the higher-level invocation forms built on top of raw
//! services:
//!
//! - `with_invoke_async`: a cancelable async action routed to done/error states
//! - `with_invoke_machine`: a nested state machine run as a service
//! - `with_timeout`: a delayed transition cancelled when the state exits
//!
//! Each of them registers transitions under generated event ids, so they
//! never collide with user events.

pub mod error;
mod invoke;
mod timeout;

pub use error::BuildError;

use uuid::Uuid;

/// Private event id for a builder-registered transition.
fn generated_event_id() -> String {
    Uuid::new_v4().to_string()
}
