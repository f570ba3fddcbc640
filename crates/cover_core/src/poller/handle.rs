//! Poller state machine and the caller's handle.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a poll.
///
/// `Polling` moves to exactly one of the other two and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Polling,
    Cancelled,
    Terminal,
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollerState::Polling => f.write_str("polling"),
            PollerState::Cancelled => f.write_str("cancelled"),
            PollerState::Terminal => f.write_str("terminal"),
        }
    }
}

/// State shared between the handle and the polling task.
///
/// Callbacks run while the lock is held and only in `Polling`, so a
/// `cancel()` that returns has either waited for a running callback or
/// prevented the next one. The lock is reentrant so a callback may cancel
/// its own poll.
pub(crate) struct PollShared {
    state: ReentrantMutex<Cell<PollerState>>,
}

impl PollShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: ReentrantMutex::new(Cell::new(PollerState::Polling)),
        })
    }

    pub(crate) fn state(&self) -> PollerState {
        self.state.lock().get()
    }

    /// Run `f` if still polling. Returns false if the poll is over.
    pub(crate) fn dispatch(&self, f: impl FnOnce()) -> bool {
        let guard = self.state.lock();
        if guard.get() != PollerState::Polling {
            return false;
        }
        f();
        true
    }

    /// Move to `Terminal` and run `f`, once.
    pub(crate) fn finish(&self, f: impl FnOnce()) -> bool {
        let guard = self.state.lock();
        if guard.get() != PollerState::Polling {
            return false;
        }
        guard.set(PollerState::Terminal);
        f();
        true
    }

    /// Move to `Cancelled` unless already finished.
    pub(crate) fn cancel(&self) -> PollerState {
        let guard = self.state.lock();
        if guard.get() == PollerState::Polling {
            guard.set(PollerState::Cancelled);
        }
        guard.get()
    }
}

/// Handle to a running poll.
///
/// The poll lives as long as its handle: dropping the handle cancels it.
/// Use `detach()` to let it run on until a terminal status.
pub struct PollHandle {
    shared: Arc<PollShared>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    detached: bool,
}

impl PollHandle {
    pub(crate) fn new(
        shared: Arc<PollShared>,
        token: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            shared,
            token,
            task: Some(task),
            detached: false,
        }
    }

    /// Stop polling. Idempotent.
    ///
    /// Once this returns no callback fires, including for a response
    /// already in flight. A poll that already reached a terminal status
    /// stays `Terminal`.
    pub fn cancel(&self) {
        let state = self.shared.cancel();
        self.token.cancel();
        tracing::debug!("Poll cancel requested, state is {}", state);
    }

    pub fn state(&self) -> PollerState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == PollerState::Polling
    }

    /// A token that cancels this poll when cancelled.
    ///
    /// Cancelling the token stops the task but does not by itself change
    /// the state; prefer `cancel()`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the polling task to exit.
    pub async fn finished(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Release the handle without stopping the poll. Callbacks keep firing
    /// until a terminal status.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if !self.detached {
            self.cancel();
        }
    }
}

impl fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollHandle")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_runs_once() {
        let shared = PollShared::new();
        let mut runs = 0;
        assert!(shared.finish(|| runs += 1));
        assert!(!shared.finish(|| runs += 1));
        assert_eq!(runs, 1);
        assert_eq!(shared.state(), PollerState::Terminal);
    }

    #[test]
    fn cancel_blocks_later_dispatch() {
        let shared = PollShared::new();
        assert_eq!(shared.cancel(), PollerState::Cancelled);
        assert_eq!(shared.cancel(), PollerState::Cancelled);
        assert!(!shared.dispatch(|| panic!("must not run")));
        assert!(!shared.finish(|| panic!("must not run")));
    }

    #[test]
    fn cancel_after_terminal_keeps_terminal() {
        let shared = PollShared::new();
        shared.finish(|| {});
        assert_eq!(shared.cancel(), PollerState::Terminal);
    }

    #[test]
    fn callback_may_cancel_its_own_poll() {
        let shared = PollShared::new();
        let inner = Arc::clone(&shared);
        assert!(shared.dispatch(|| {
            inner.cancel();
        }));
        assert_eq!(shared.state(), PollerState::Cancelled);
    }
}
