//! Bounded polling of backend jobs.
//!
//! A queued job is polled at a fixed interval until it reaches a terminal
//! state, the wall-clock budget runs out, or the caller cancels:
//!
//! ```text
//! Queued → Running → Completed
//!                  → Failed
//! (any non-terminal) → Cancelled | TimedOut
//! ```
//!
//! Each guard is evaluated before every status query, so a cancellation or an
//! exhausted budget never lets another request go out. Status queries for a
//! job are strictly sequential.

use std::future::Future;

use medcase_core::{Error, JobHandle, JobStatus, Result};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PollSettings;

/// Poll `query` until the job it reports on is terminal.
///
/// The budget starts at the first call. Between non-terminal replies the loop
/// waits `settings.interval`, cut short at the deadline, and the wait itself
/// races the cancellation token. Settings with a zero interval are rejected
/// before any query is issued.
pub async fn poll_until_terminal<T, F, Fut>(
    job: &JobHandle,
    settings: PollSettings,
    cancel: &CancellationToken,
    mut query: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobStatus<T>>>,
{
    settings.validate(&job.kind.to_string())?;

    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut attempt: u32 = 0;

    loop {
        ensure_may_query(job, settings, cancel, Instant::now(), deadline)?;
        attempt += 1;

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            reply = query() => reply,
        };
        let status = reply.map_err(|e| remap_cancellation(e, cancel))?;

        debug!(
            job_id = %job.job_id,
            job_kind = ?job.kind,
            attempt,
            job_status = status.label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job status received"
        );

        match status {
            JobStatus::Done(payload) => return Ok(payload),
            JobStatus::Failed(message) => return Err(Error::BackendFailed(message)),
            JobStatus::Queued | JobStatus::Running => {}
        }

        let wake_at = std::cmp::min(Instant::now() + settings.interval, deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = sleep_until(wake_at) => {}
        }
    }
}

/// Guard evaluated before each status query.
fn ensure_may_query(
    job: &JobHandle,
    settings: PollSettings,
    cancel: &CancellationToken,
    now: Instant,
    deadline: Instant,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if now >= deadline {
        return Err(Error::TimedOut {
            kind: job.kind,
            timeout_ms: settings.timeout.as_millis() as u64,
        });
    }
    Ok(())
}

/// Transport aborts caused by the caller surface as a single `Cancelled` shape.
pub(crate) fn remap_cancellation(err: Error, cancel: &CancellationToken) -> Error {
    if err.is_cancellation() || cancel.is_cancelled() {
        Error::Cancelled
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcase_core::JobKind;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn job() -> JobHandle {
        JobHandle::new("j1", JobKind::TextExtraction)
    }

    /// Returns scripted statuses and records the (paused) time of every query.
    fn scripted(
        statuses: Vec<JobStatus<&'static str>>,
    ) -> (
        Arc<Mutex<VecDeque<JobStatus<&'static str>>>>,
        Arc<Mutex<Vec<Duration>>>,
    ) {
        (
            Arc::new(Mutex::new(statuses.into())),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_after_queued_and_running() {
        let (script, calls) = scripted(vec![
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Done("R"),
        ]);
        let start = Instant::now();
        let cancel = CancellationToken::new();

        let result = poll_until_terminal(
            &job(),
            PollSettings::from_millis(1000, 120_000),
            &cancel,
            || {
                calls.lock().unwrap().push(start.elapsed());
                let next = script.lock().unwrap().pop_front().unwrap();
                async move { Ok(next) }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "R");
        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(2000)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_is_terminal() {
        let (script, calls) = scripted(vec![
            JobStatus::Running,
            JobStatus::Failed("bad scan".to_string()),
            JobStatus::Done("never"),
        ]);
        let cancel = CancellationToken::new();

        let err = poll_until_terminal(
            &job(),
            PollSettings::from_millis(1000, 120_000),
            &cancel,
            || {
                calls.lock().unwrap().push(Duration::ZERO);
                let next = script.lock().unwrap().pop_front().unwrap();
                async move { Ok(next) }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::BackendFailed(ref m) if m == "bad scan"));
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(script.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_before_fourth_query() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();
        let cancel = CancellationToken::new();

        let err = poll_until_terminal::<(), _, _>(
            &job(),
            PollSettings::from_millis(2000, 5000),
            &cancel,
            || {
                calls.lock().unwrap().push(start.elapsed());
                async { Ok(JobStatus::Running) }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::TimedOut {
                kind: JobKind::TextExtraction,
                timeout_ms: 5000
            }
        ));
        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                Duration::ZERO,
                Duration::from_millis(2000),
                Duration::from_millis(4000)
            ]
        );
        assert!(start.elapsed() < Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_cannot_overrun_by_another_request() {
        let calls = Arc::new(Mutex::new(0u32));
        let cancel = CancellationToken::new();

        let err = poll_until_terminal::<(), _, _>(
            &job(),
            PollSettings::from_millis(1000, 5000),
            &cancel,
            || {
                *calls.lock().unwrap() += 1;
                async {
                    tokio::time::sleep(Duration::from_millis(6000)).await;
                    Ok(JobStatus::Running)
                }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::TimedOut { .. }));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_issues_no_query() {
        let calls = Arc::new(Mutex::new(0u32));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = poll_until_terminal::<(), _, _>(
            &job(),
            PollSettings::from_millis(1000, 5000),
            &cancel,
            || {
                *calls.lock().unwrap() += 1;
                async { Ok(JobStatus::Running) }
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait_is_prompt() {
        let calls = Arc::new(Mutex::new(0u32));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });
        let start = Instant::now();

        let err = poll_until_terminal::<(), _, _>(
            &job(),
            PollSettings::from_millis(10_000, 60_000),
            &cancel,
            || {
                *calls.lock().unwrap() += 1;
                async { Ok(JobStatus::Queued) }
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_query() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = poll_until_terminal::<(), _, _>(
            &job(),
            PollSettings::from_millis(1000, 60_000),
            &cancel,
            || async {
                std::future::pending::<()>().await;
                Ok(JobStatus::Running)
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_rejected_without_query() {
        let calls = Arc::new(Mutex::new(0u32));
        let cancel = CancellationToken::new();

        let err = poll_until_terminal::<(), _, _>(
            &job(),
            PollSettings::from_millis(0, 5000),
            &cancel,
            || {
                *calls.lock().unwrap() += 1;
                async { Ok(JobStatus::Running) }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Config(ref m) if m.contains("OCR processing")));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_transport_error_remapped_only_when_cancelled() {
        let cancel = CancellationToken::new();
        let err = remap_cancellation(Error::Transport("connection reset".into()), &cancel);
        assert!(matches!(err, Error::Transport(_)));

        cancel.cancel();
        let err = remap_cancellation(Error::Transport("operation aborted".into()), &cancel);
        assert!(err.is_cancellation());
    }
}
