//! Side-effecting pieces of a state: action chains, services and activities.
//!
//! This module is the "imperative shell" around the state graph. Everything
//! here is executed by the [`Interpreter`](crate::interpreter::Interpreter):
//!
//! - **Actions**: synchronous callables run in registration order on enter/exit
//! - **Services**: concurrent tasks handed a [`Callback`] that can move the machine
//! - **Activities**: concurrent tasks that cannot affect transitions
//!
//! # Synchronous actions
//!
//! Enter and exit actions are plain `Fn()` values and are never awaited. An
//! action that spawns asynchronous work returns immediately and that work
//! proceeds independently of the state's lifecycle.

mod actions;
mod callback;
mod service;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use actions::{Action, ActionChain};
pub use callback::{Callback, Decision};
pub use service::{Activity, Service};

/// Error type returned by fallible services.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A service error once it has been raised to the machine.
///
/// Shared so it can be handed to every state-change observer and still be
/// returned from the run.
pub type ServiceError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a cancelable async service action.
pub type ServiceResult = Result<(), BoxError>;

/// Boxed future driven by the interpreter for services and activities.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
