//! Delayed transitions.

use crate::core::State;
use crate::effects::ServiceResult;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

impl State {
    /// Move to `target_state_id` once `delay` has elapsed in this state.
    ///
    /// The timer is cancelled when the state is left through any other
    /// transition, so it never fires late.
    ///
    /// # Example
    ///
    /// ```rust
    /// use netstate::State;
    /// use std::time::Duration;
    ///
    /// let red = State::new("red").with_timeout(Duration::from_secs(5), "green");
    /// assert_eq!(red.services().len(), 1);
    /// ```
    pub fn with_timeout(self, delay: Duration, target_state_id: &str) -> Self {
        self.with_invoke_async(
            move |cancel| sleep_unless_cancelled(delay, cancel),
            Some(target_state_id),
            None,
        )
    }
}

async fn sleep_unless_cancelled(delay: Duration, cancel: CancellationToken) -> ServiceResult {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = cancel.cancelled() => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_registers_service_and_route() {
        let state = State::new("red").with_timeout(Duration::from_millis(100), "green");

        assert_eq!(state.services().len(), 1);
        assert_eq!(state.transitions().len(), 1);
        assert!(state.transitions().values().any(|target| target == "green"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_sleep_returns_early() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = tokio::time::Instant::now();
        sleep_unless_cancelled(Duration::from_secs(60), cancel)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
