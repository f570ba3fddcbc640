//! Cover Studio Core - Backend job orchestration for the Cover Studio client
//!
//! This crate contains all orchestration logic with zero UI dependencies.
//! Source separation, voice-conversion training and inference all run on
//! a remote HTTP backend; this crate submits the jobs, polls them to
//! completion and chains dependent calls into pipelines. A view layer
//! (the CLI, or any other front end) drives it and renders the results.

pub mod client;
pub mod config;
pub mod identity;
pub mod logging;
pub mod pipeline;
pub mod poller;
pub mod presenter;
pub mod status;
pub mod upload;
pub mod workflows;

#[cfg(test)]
pub(crate) mod testing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
