//! Job poller: repeatedly queries a job's status until it is terminal or
//! the caller cancels.
//!
//! ```text
//! Polling ──terminal status──▶ Terminal   (on_terminal(Ok), once)
//!    │
//!    ├──transport exhausted──▶ Terminal   (on_terminal(Err), once)
//!    │
//!    └──────cancel()─────────▶ Cancelled  (no further callbacks)
//! ```
//!
//! `start_polling` runs on a background task and reports through
//! callbacks, for views. `wait_for_terminal` is the awaitable form used
//! by pipeline steps and the CLI.

mod config;
mod handle;
mod runner;

pub use config::{BackoffPolicy, PollConfig};
pub use handle::{PollHandle, PollerState};
pub use runner::{
    start_polling, wait_for_terminal, wait_for_terminal_with, PollError, PollOutcome, PollUpdate,
};
