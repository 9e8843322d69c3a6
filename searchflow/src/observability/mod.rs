//! Logging setup and run lifecycle events.

mod run_events;
mod subscriber;

pub use run_events::RunEvents;
pub use subscriber::{init_tracing, SpanTimer};
