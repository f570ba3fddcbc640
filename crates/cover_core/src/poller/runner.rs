//! The polling loop.

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::PollConfig;
use super::handle::{PollHandle, PollShared};
use crate::client::{TransportError, TransportResult};
use crate::status::JobStatus;

/// Non-terminal observation delivered to `on_update`.
#[derive(Debug)]
pub enum PollUpdate {
    /// The job is still pending.
    Status(JobStatus),
    /// The status query itself failed. The job may still be running.
    TransportError {
        error: TransportError,
        consecutive: u32,
    },
}

impl PollUpdate {
    pub fn status(&self) -> Option<&JobStatus> {
        match self {
            PollUpdate::Status(status) => Some(status),
            PollUpdate::TransportError { .. } => None,
        }
    }
}

/// Errors from `wait_for_terminal`.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Polling cancelled")]
    Cancelled,

    #[error("Status query failed {consecutive} times in a row: {source}")]
    TransportExhausted {
        consecutive: u32,
        #[source]
        source: TransportError,
    },
}

/// How a poll ended: a terminal job status, or no status at all.
pub type PollOutcome = Result<JobStatus, PollError>;

enum LoopExit {
    Terminal(JobStatus),
    Exhausted { consecutive: u32, error: TransportError },
    Cancelled,
}

impl LoopExit {
    fn into_outcome(self) -> PollOutcome {
        match self {
            LoopExit::Terminal(status) => Ok(status),
            LoopExit::Exhausted { consecutive, error } => Err(PollError::TransportExhausted {
                consecutive,
                source: error,
            }),
            LoopExit::Cancelled => Err(PollError::Cancelled),
        }
    }
}

/// Query, sleep, repeat until terminal, cancelled or out of retries.
///
/// `on_update` returns false when the update could not be delivered,
/// which ends the loop.
async fn run_loop<Q, Fut>(
    mut query: Q,
    config: &PollConfig,
    token: &CancellationToken,
    mut on_update: impl FnMut(PollUpdate) -> bool,
) -> LoopExit
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = TransportResult<JobStatus>>,
{
    let mut interval = config.interval;
    let mut consecutive_errors: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return LoopExit::Cancelled,
            _ = tokio::time::sleep(interval) => {}
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return LoopExit::Cancelled,
            result = query() => result,
        };

        match result {
            Ok(status) if status.is_terminal() => return LoopExit::Terminal(status),
            Ok(status) => {
                consecutive_errors = 0;
                debug!("Poll: {}", status);
                if !on_update(PollUpdate::Status(status)) {
                    return LoopExit::Cancelled;
                }
                interval = config.backoff.next(interval);
            }
            Err(error) => {
                consecutive_errors += 1;
                warn!("Status query failed ({} in a row): {}", consecutive_errors, error);
                if config
                    .max_transport_errors
                    .is_some_and(|max| consecutive_errors >= max)
                {
                    return LoopExit::Exhausted {
                        consecutive: consecutive_errors,
                        error,
                    };
                }
                let update = PollUpdate::TransportError {
                    error,
                    consecutive: consecutive_errors,
                };
                if !on_update(update) {
                    return LoopExit::Cancelled;
                }
            }
        }
    }
}

/// Poll `query` on a background task.
///
/// The first query fires one interval after the call. Pending statuses
/// and query failures go to `on_update`; the first terminal status goes to
/// `on_terminal` as `Ok` and ends the poll. When `max_transport_errors` is
/// set and reached, `on_terminal` receives `PollError::TransportExhausted`:
/// the job's own outcome is unknown, not failed.
///
/// Must be called within a tokio runtime.
pub fn start_polling<Q, Fut, U, T>(
    query: Q,
    config: PollConfig,
    mut on_update: U,
    on_terminal: T,
) -> PollHandle
where
    Q: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TransportResult<JobStatus>> + Send + 'static,
    U: FnMut(PollUpdate) + Send + 'static,
    T: FnOnce(PollOutcome) + Send + 'static,
{
    let shared = PollShared::new();
    let token = CancellationToken::new();

    let task = {
        let shared = shared.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let exit = run_loop(query, &config, &token, |update| {
                shared.dispatch(|| on_update(update))
            })
            .await;

            if matches!(exit, LoopExit::Cancelled) {
                debug!("Poll stopped by cancel");
                return;
            }
            let outcome = exit.into_outcome();
            shared.finish(|| on_terminal(outcome));
        })
    };

    PollHandle::new(shared, token, task)
}

/// Poll `query` until a terminal status and return it.
///
/// A `Failed` status is returned as `Ok`; `Err` means no terminal status
/// was observed.
pub async fn wait_for_terminal<Q, Fut>(
    query: Q,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<JobStatus, PollError>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = TransportResult<JobStatus>>,
{
    wait_for_terminal_with(query, config, cancel, |_| {}).await
}

/// `wait_for_terminal` that also reports each non-terminal observation.
pub async fn wait_for_terminal_with<Q, Fut>(
    query: Q,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_update: impl FnMut(PollUpdate),
) -> Result<JobStatus, PollError>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = TransportResult<JobStatus>>,
{
    run_loop(query, config, cancel, |update| {
        on_update(update);
        true
    })
    .await
    .into_outcome()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollingSettings;
    use crate::poller::{BackoffPolicy, PollerState};
    use crate::status::{ArtifactSet, SLOT_VOCAL};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{oneshot, Notify};
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_millis(30_000);

    type Script = Arc<Mutex<VecDeque<TransportResult<JobStatus>>>>;

    fn script(responses: Vec<TransportResult<JobStatus>>) -> Script {
        Arc::new(Mutex::new(responses.into()))
    }

    fn scripted_query(
        script: Script,
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut() -> futures_util::future::Ready<TransportResult<JobStatus>> + Send + 'static
    {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let next = script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(JobStatus::pending()));
            futures_util::future::ready(next)
        }
    }

    fn done() -> JobStatus {
        JobStatus::completed(ArtifactSet::new().with(SLOT_VOCAL, "https://host/v.wav"))
    }

    #[tokio::test(start_paused = true)]
    async fn pending_pending_completed_delivers_two_updates_then_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = scripted_query(
            script(vec![Ok(JobStatus::pending()), Ok(JobStatus::pending()), Ok(done())]),
            calls.clone(),
        );
        let updates = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = oneshot::channel();

        let start = Instant::now();
        let sink = updates.clone();
        let handle = start_polling(
            query,
            PollConfig::fixed(INTERVAL),
            move |update| sink.lock().push(update),
            move |status| {
                let _ = tx.send(status);
            },
        );

        let terminal = rx.await.unwrap().unwrap();
        assert_eq!(terminal, done());
        assert_eq!(start.elapsed(), INTERVAL * 3);
        assert_eq!(updates.lock().len(), 2);
        assert!(updates.lock().iter().all(|u| u.status().is_some()));
        assert_eq!(handle.state(), PollerState::Terminal);

        handle.finished().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_query_waits_one_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = start_polling(
            scripted_query(script(vec![]), calls.clone()),
            PollConfig::fixed(INTERVAL),
            |_| {},
            |_| {},
        );

        tokio::time::sleep(INTERVAL - Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_in_flight_query_suppresses_callbacks() {
        let release = Arc::new(Notify::new());
        let started = Arc::new(AtomicUsize::new(0));
        let query = {
            let release = release.clone();
            let started = started.clone();
            move || {
                let release = release.clone();
                started.fetch_add(1, Ordering::SeqCst);
                async move {
                    release.notified().await;
                    Ok::<_, TransportError>(JobStatus::completed(ArtifactSet::new()))
                }
            }
        };
        let fired = Arc::new(AtomicUsize::new(0));
        let on_update = {
            let fired = fired.clone();
            move |_: PollUpdate| {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        };
        let on_terminal = {
            let fired = fired.clone();
            move |_: PollOutcome| {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        };

        let handle = start_polling(query, PollConfig::fixed(INTERVAL), on_update, on_terminal);

        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        handle.cancel();
        release.notify_waiters();
        tokio::time::sleep(INTERVAL * 4).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), PollerState::Cancelled);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        handle.finished().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = start_polling(
            scripted_query(script(vec![]), calls.clone()),
            PollConfig::fixed(INTERVAL),
            |_| {},
            |_| {},
        );

        handle.cancel();
        handle.cancel();
        assert_eq!(handle.state(), PollerState::Cancelled);
        assert!(!handle.is_active());

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        handle.finished().await;
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_fires_at_most_once_and_polling_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminals = Arc::new(AtomicUsize::new(0));
        let counter = terminals.clone();
        let handle = start_polling(
            scripted_query(
                script(vec![Ok(JobStatus::failed("boom")), Ok(done())]),
                calls.clone(),
            ),
            PollConfig::fixed(INTERVAL),
            |_| {},
            move |outcome| {
                assert!(matches!(outcome, Ok(JobStatus::Failed { .. })));
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(INTERVAL * 5).await;
        handle.cancel();
        assert_eq!(terminals.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), PollerState::Terminal);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_reported_and_polling_continues() {
        let calls = Arc::new(AtomicUsize::new(0));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = oneshot::channel();
        let sink = updates.clone();
        let _handle = start_polling(
            scripted_query(
                script(vec![
                    Err(TransportError::unreachable("down")),
                    Ok(JobStatus::pending()),
                    Ok(done()),
                ]),
                calls.clone(),
            ),
            PollConfig::fixed(INTERVAL).with_max_transport_errors(3),
            move |update| sink.lock().push(update),
            move |status| {
                let _ = tx.send(status);
            },
        );

        assert_eq!(rx.await.unwrap().unwrap(), done());
        let updates = updates.lock();
        assert!(matches!(
            updates[0],
            PollUpdate::TransportError { consecutive: 1, .. }
        ));
        assert!(updates[1].status().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transport_errors_are_not_a_job_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        let errors: Vec<_> = (0..5)
            .map(|_| Err(TransportError::unreachable("down")))
            .collect();
        let _handle = start_polling(
            scripted_query(script(errors), calls.clone()),
            PollConfig::fixed(INTERVAL).with_max_transport_errors(2),
            |_| {},
            move |status| {
                let _ = tx.send(status);
            },
        );

        let outcome = rx.await.unwrap();
        assert!(matches!(
            outcome,
            Err(PollError::TransportExhausted { consecutive: 2, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn outage_at_default_separation_settings_leaves_job_unknown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut responses: Vec<_> = (0..5)
            .map(|_| Err(TransportError::unreachable("blip")))
            .collect();
        responses.push(Ok(done()));
        let (tx, rx) = oneshot::channel();
        let _handle = start_polling(
            scripted_query(script(responses), calls.clone()),
            PollingSettings::default().separation(),
            |_| {},
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );

        match rx.await.unwrap() {
            Err(PollError::TransportExhausted { consecutive, source }) => {
                assert_eq!(consecutive, 5);
                assert!(matches!(source, TransportError::Unreachable(_)));
            }
            other => panic!("expected transport exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = start_polling(
            scripted_query(script(vec![]), calls.clone()),
            PollConfig::fixed(INTERVAL),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );

        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        drop(handle);

        tokio::time::sleep(INTERVAL * 10).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_poll_runs_to_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        start_polling(
            scripted_query(
                script(vec![Ok(JobStatus::pending()), Ok(done())]),
                calls.clone(),
            ),
            PollConfig::fixed(INTERVAL),
            |_| {},
            move |outcome| {
                let _ = tx.send(outcome);
            },
        )
        .detach();

        assert_eq!(rx.await.unwrap().unwrap(), done());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_stretches_intervals() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = scripted_query(
            script(vec![Ok(JobStatus::pending()), Ok(JobStatus::pending()), Ok(done())]),
            calls,
        );
        let config = PollConfig::fixed(Duration::from_secs(10))
            .with_backoff(BackoffPolicy::exponential(2.0, Duration::from_secs(15)));

        let start = Instant::now();
        let status = wait_for_terminal(query, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(status, done());
        // 10s, then 15s (capped from 20s), then 15s
        assert_eq!(start.elapsed(), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_terminal_honours_cancel() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = scripted_query(script(vec![]), calls.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(INTERVAL * 2 + Duration::from_millis(1)).await;
            canceller.cancel();
        });

        let err = wait_for_terminal(query, &PollConfig::fixed(INTERVAL), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_terminal_reports_exhaustion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = scripted_query(
            script(vec![
                Err(TransportError::status(502, "bad gateway")),
                Err(TransportError::status(502, "bad gateway")),
            ]),
            calls,
        );

        let err = wait_for_terminal(
            query,
            &PollConfig::fixed(INTERVAL).with_max_transport_errors(2),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PollError::TransportExhausted { consecutive: 2, .. }
        ));
    }
}
