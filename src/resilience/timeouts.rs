//! Deadline enforcement for long-running handlers.
//!
//! # Responsibilities
//! - Race a handler against a wall-clock budget
//! - Let the handler finish in the background after the deadline fires
//! - Contain late failures (panics, errors) to the log
//!
//! # Design Decisions
//! - The handler runs on its own task, so the caller can respond without cancelling it
//! - Timed-out requests return 504 Gateway Timeout
//! - A late outcome is reported through `on_late` and never reaches the client

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

/// Why a guarded call produced no result.
#[derive(Debug, Error)]
pub enum DeadlineError {
    #[error("deadline of {0:?} elapsed")]
    Elapsed(Duration),
    #[error("handler task failed: {0}")]
    Failed(#[from] JoinError),
}

/// Run `fut` on a spawned task and wait at most `deadline` for it.
///
/// On expiry the task keeps running; `on_late` receives its eventual outcome.
pub async fn run_with_deadline<F, L>(
    fut: F,
    deadline: Duration,
    on_late: L,
) -> Result<F::Output, DeadlineError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    L: FnOnce(Result<F::Output, JoinError>) + Send + 'static,
{
    let mut handle = tokio::spawn(fut);

    match tokio::time::timeout(deadline, &mut handle).await {
        Ok(outcome) => outcome.map_err(DeadlineError::Failed),
        Err(_) => {
            tokio::spawn(async move {
                on_late(handle.await);
            });
            Err(DeadlineError::Elapsed(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = run_with_deadline(async { 7 }, Duration::from_secs(1), |_| {}).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_elapsed_handler_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let (late_tx, late_rx) = oneshot::channel();

        let result = run_with_deadline(
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                flag.store(true, Ordering::SeqCst);
                "done"
            },
            Duration::from_millis(10),
            move |outcome| {
                let _ = late_tx.send(outcome.ok());
            },
        )
        .await;

        assert!(matches!(result, Err(DeadlineError::Elapsed(_))));
        assert!(!finished.load(Ordering::SeqCst));

        let late = tokio::time::timeout(Duration::from_secs(2), late_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(late, Some("done"));
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let result = run_with_deadline(
            async {
                panic!("handler blew up");
            },
            Duration::from_secs(1),
            |_: Result<(), JoinError>| {},
        )
        .await;
        assert!(matches!(result, Err(DeadlineError::Failed(e)) if e.is_panic()));
    }
}
