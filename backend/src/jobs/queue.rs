use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::{select, sync::watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    cancel: CancellationToken,
    outcome: watch::Receiver<Option<JobOutcome>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Requests cancellation. The job future is dropped at its next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.outcome.borrow().is_none()
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        self.outcome.borrow().clone()
    }

    pub async fn wait(&self) -> JobOutcome {
        let mut outcome = self.outcome.clone();
        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone());
        // the runner only goes away without publishing if the runtime is shutting down
        finished.unwrap_or(JobOutcome::Cancelled)
    }

    /// Runs `callback` exactly once, on a pool thread, when the job finishes.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(JobOutcome) + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move { callback(handle.wait().await) });
    }
}

/// Runs jobs on the tokio worker pool.
///
/// The queue itself puts no limit on how many jobs run at once.
#[derive(Debug, Default)]
pub struct JobQueue {
    next_id: AtomicU64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `job`. `on_submit` runs on the calling thread before the job
    /// starts, so anything it records is visible to the job's completion.
    pub fn submit<F, S>(&self, job: F, on_submit: S) -> JobHandle
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
        S: FnOnce(&JobHandle),
    {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let (tx_outcome, rx_outcome) = watch::channel(None);
        let handle = JobHandle {
            id,
            cancel: cancel.clone(),
            outcome: rx_outcome,
        };

        on_submit(&handle);

        tokio::spawn(async move {
            let mut task = tokio::spawn(job);
            let outcome = select! {
                biased;
                _ = cancel.cancelled() => {
                    task.abort();
                    // make sure the job future is gone before reporting
                    let _ = (&mut task).await;
                    JobOutcome::Cancelled
                }
                joined = &mut task => match joined {
                    Ok(Ok(())) => JobOutcome::Succeeded,
                    Ok(Err(err)) => JobOutcome::Failed(format!("{err:#}")),
                    Err(err) if err.is_cancelled() => JobOutcome::Cancelled,
                    Err(err) => JobOutcome::Failed(format!("job panicked: {err}")),
                },
            };
            tx_outcome.send_replace(Some(outcome));
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use pretty_assertions::assert_eq;
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };
    use tokio::{sync::oneshot, time::sleep};

    #[tokio::test]
    async fn reports_success_and_failure() {
        let queue = JobQueue::new();
        let ok = queue.submit(async { Ok(()) }, |_| {});
        let failed = queue.submit(async { bail!("disk full") }, |_| {});

        assert_eq!(ok.wait().await, JobOutcome::Succeeded);
        assert_eq!(failed.wait().await, JobOutcome::Failed("disk full".to_string()));
        assert!(!ok.is_running());
        assert_ne!(ok.id(), failed.id());
    }

    #[tokio::test]
    async fn on_submit_runs_before_the_job() {
        let queue = JobQueue::new();
        let submitted = Arc::new(AtomicBool::new(false));
        let seen_by_job = Arc::new(AtomicBool::new(false));

        let handle = queue.submit(
            {
                let submitted = submitted.clone();
                let seen_by_job = seen_by_job.clone();
                async move {
                    seen_by_job.store(submitted.load(Ordering::SeqCst), Ordering::SeqCst);
                    Ok(())
                }
            },
            |handle| {
                assert!(handle.is_running());
                submitted.store(true, Ordering::SeqCst);
            },
        );
        handle.wait().await;
        assert!(seen_by_job.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_job() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let queue = JobQueue::new();
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let handle = queue.submit(
            async move {
                let _flag = flag;
                sleep(Duration::from_secs(3600)).await;
                Ok(())
            },
            |_| {},
        );

        sleep(Duration::from_millis(10)).await;
        assert!(handle.is_running());
        handle.cancel();
        assert_eq!(handle.wait().await, JobOutcome::Cancelled);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn on_complete_fires_once_even_after_the_fact() {
        let queue = JobQueue::new();
        let handle = queue.submit(async { Ok(()) }, |_| {});
        handle.wait().await;

        let (tx, rx) = oneshot::channel();
        handle.on_complete(move |outcome| {
            let _ = tx.send(outcome);
        });
        assert_eq!(rx.await.unwrap(), JobOutcome::Succeeded);
    }

    #[tokio::test]
    async fn panics_become_failures() {
        let queue = JobQueue::new();
        let handle = queue.submit(
            async {
                if true {
                    panic!("boom");
                }
                Ok(())
            },
            |_| {},
        );
        assert!(matches!(handle.wait().await, JobOutcome::Failed(_)));
    }
}
