//! Services and activities launched while a state is active.

use super::{BoxFuture, Callback};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type ServiceFn = dyn Fn(Callback) -> BoxFuture + Send + Sync;
type ActivityFn = dyn Fn() -> BoxFuture + Send + Sync;

/// A unit of concurrent work that may move the machine to another state.
///
/// The service factory is invoked once per state entry and receives a fresh
/// [`Callback`] bound to that entry.
#[derive(Clone)]
pub struct Service {
    invoke: Arc<ServiceFn>,
}

impl Service {
    /// Wrap an async closure as a service.
    pub fn new<F, Fut>(service: F) -> Self
    where
        F: Fn(Callback) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            invoke: Arc::new(move |callback: Callback| -> BoxFuture {
                Box::pin(service(callback))
            }),
        }
    }

    /// Create the future for one invocation.
    pub(crate) fn invoke(&self, callback: Callback) -> BoxFuture {
        (self.invoke)(callback)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Service")
    }
}

/// A unit of concurrent work with no influence on transitions.
#[derive(Clone)]
pub struct Activity {
    run: Arc<ActivityFn>,
}

impl Activity {
    /// Wrap an async closure as an activity.
    pub fn new<F, Fut>(activity: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            run: Arc::new(move || -> BoxFuture { Box::pin(activity()) }),
        }
    }

    pub(crate) fn run(&self) -> BoxFuture {
        (self.run)()
    }
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Activity")
    }
}
