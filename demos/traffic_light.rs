//! Traffic Light State Machine
//!
//! This example demonstrates a cyclic machine driven by timers.
//!
//! Key concepts:
//! - Delayed transitions with `with_timeout`
//! - A service deciding when to leave the cycle
//! - Observers for state changes and completion
//!
//! Run with: cargo run --example traffic_light
//! Set RUST_LOG=netstate=debug to watch the interpreter.

use netstate::{Interpreter, State, StateMachine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CYCLES: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netstate=info")))
        .try_init();

    println!("=== Traffic Light State Machine ===\n");

    let cycles = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cycles);
    let remaining = Arc::clone(&cycles);

    let machine = StateMachine::new("traffic-light", "Traffic light", "red")?.with_states([
        State::new("red")
            .with_action_on_enter(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .with_invoke(move |callback| {
                let finished = remaining.load(Ordering::SeqCst) > CYCLES;
                async move {
                    if finished {
                        callback.raise("SHUTDOWN");
                    }
                }
            })
            .with_transition("SHUTDOWN", "off")?
            .with_timeout(Duration::from_millis(300), "green"),
        State::new("green").with_timeout(Duration::from_millis(300), "yellow"),
        State::new("yellow").with_timeout(Duration::from_millis(100), "red"),
        State::new("off").as_final_state(),
    ]);

    let interpreter = Interpreter::new(machine);
    interpreter.on_state_changed(|change| {
        println!("  {:>6} -> {}", change.previous_id().unwrap_or("start"), change.state_id());
    });
    interpreter.on_machine_done(|| println!("\nLight switched off"));

    let outcome = interpreter.run().await?;

    println!("Outcome: {:?}", outcome);
    println!("Transitions taken: {}", interpreter.history().len());
    println!("\n=== Example Complete ===");
    Ok(())
}
