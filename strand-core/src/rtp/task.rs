//! Handles on the session's long-lived worker tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{Result, TaskError};

/// A named spawned task whose outcome is read from its join result.
#[derive(Debug)]
pub struct WorkerTask {
    name: &'static str,
    handle: Option<JoinHandle<Result<()>>>,
}

impl WorkerTask {
    pub fn spawn<F>(name: &'static str, fut: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        debug!(task = name, "spawning worker");
        Self {
            name,
            handle: Some(tokio::spawn(fut)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `true` once the task has exited or been joined.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wait up to `timeout` for the task to exit.
    ///
    /// A task still running at the deadline is left detached, never
    /// aborted. Joining twice returns `Ok(())` the second time.
    pub async fn join(&mut self, timeout: Duration) -> std::result::Result<(), TaskError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        let outcome = tokio::time::timeout(timeout, handle).await;
        let name = self.name;
        match outcome {
            Err(_elapsed) => {
                error!(task = name, ?timeout, "worker did not stop in time");
                self.handle = None;
                Err(TaskError::JoinTimeout { name, timeout })
            }
            Ok(joined) => {
                self.handle = None;
                match joined {
                    Ok(Ok(())) => {
                        debug!(task = name, "worker exited");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(TaskError::Failed {
                        name,
                        reason: e.to_string(),
                    }),
                    Err(join_err) => Err(TaskError::Aborted {
                        name,
                        reason: join_err.to_string(),
                    }),
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrandError;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn clean_exit() {
        let mut task = WorkerTask::spawn("ok", async { Ok(()) });
        assert_ok!(task.join(Duration::from_secs(1)).await);
        assert!(task.is_finished());
        assert_ok!(task.join(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn failure_is_reported_by_name() {
        let mut task = WorkerTask::spawn("writer", async { Err(StrandError::ChannelClosed) });
        match task.join(Duration::from_secs(1)).await {
            Err(TaskError::Failed { name, reason }) => {
                assert_eq!(name, "writer");
                assert_eq!(reason, "channel closed");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn panic_is_aborted() {
        let blow_up = true;
        let mut task = WorkerTask::spawn("boom", async move {
            if blow_up {
                panic!("worker blew up");
            }
            Ok(())
        });
        assert!(matches!(
            task.join(Duration::from_secs(1)).await,
            Err(TaskError::Aborted { name: "boom", .. })
        ));
    }

    #[tokio::test]
    async fn slow_task_times_out_without_abort() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut task = WorkerTask::spawn("slow", async move {
            let _ = rx.await;
            Ok(())
        });
        assert!(matches!(
            task.join(Duration::from_millis(20)).await,
            Err(TaskError::JoinTimeout { name: "slow", .. })
        ));
        // The detached task still runs to completion.
        assert!(tx.send(()).is_ok());
    }
}
