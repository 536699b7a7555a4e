use continuum_data_store::FeatureVector;
use continuum_training::TrainingBackend;
use continuum_wire::{Message, STATUS_OK};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{select, sync::mpsc, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{JobHandle, JobOutcome, JobQueue};
use crate::ProcessState;

#[derive(Debug)]
pub enum JobRequest {
    Retrain {
        msg_id: u32,
        batch: Vec<FeatureVector>,
    },
    Fetch,
}

#[derive(Error, Debug)]
#[error("orchestrator is no longer accepting jobs")]
pub struct OrchestratorClosed;

/// Cheap handle for submitting work to a spawned [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<JobRequest>,
}

impl OrchestratorHandle {
    pub fn retrain(&self, msg_id: u32, batch: Vec<FeatureVector>) -> Result<(), OrchestratorClosed> {
        self.tx
            .send(JobRequest::Retrain { msg_id, batch })
            .map_err(|_| OrchestratorClosed)
    }

    pub fn fetch(&self) -> Result<(), OrchestratorClosed> {
        self.tx.send(JobRequest::Fetch).map_err(|_| OrchestratorClosed)
    }
}

/// Runs retrain and fetch jobs against one backend, keeping at most one
/// retrain alive and reporting its lifecycle to the scheduler.
pub struct Orchestrator {
    backend: Arc<dyn TrainingBackend>,
    queue: JobQueue,
    state: Arc<ProcessState>,
    cancel_grace: Duration,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn TrainingBackend>,
        state: Arc<ProcessState>,
        cancel_grace: Duration,
    ) -> Self {
        Self {
            backend,
            queue: JobQueue::new(),
            state,
            cancel_grace,
        }
    }

    /// Starts a retrain for `msg_id`, cancelling the running one first.
    ///
    /// `RetrainStarted` goes out before the job body runs. `RetrainEnded` follows
    /// once it finishes, whether it succeeded or failed, but never for a
    /// cancelled job.
    pub async fn submit_retrain(&self, msg_id: u32, batch: Vec<FeatureVector>) -> JobHandle {
        if let Some(running) = self.state.running_job() {
            info!(
                msg_id,
                previous_msg_id = self.state.current_msg_id(),
                "Cancelling running retrain"
            );
            running.cancel();
            sleep(self.cancel_grace).await;
        }

        info!(msg_id, vectors = batch.len(), "Starting retrain");
        let backend = self.backend.clone();
        let handle = self.queue.submit(
            async move { backend.retrain(batch).await },
            |job| {
                self.state.begin_job(job.clone(), msg_id);
                if !self.state.notify(Message::RetrainStarted {
                    msg_id,
                    status: STATUS_OK,
                }) {
                    debug!(msg_id, "No connection, RetrainStarted not sent");
                }
            },
        );

        let state = self.state.clone();
        let id = handle.id();
        handle.on_complete(move |outcome| {
            state.finish_job(id);
            match outcome {
                JobOutcome::Succeeded => info!(msg_id, "Retrain finished"),
                JobOutcome::Failed(err) => error!(msg_id, "Retrain failed: {err}"),
                JobOutcome::Cancelled => {
                    info!(msg_id, "Retrain cancelled");
                    return;
                }
            }
            // there is no failure message, so failed jobs end like successful ones
            if !state.notify(Message::RetrainEnded {
                msg_id,
                status: STATUS_OK,
            }) {
                debug!(msg_id, "No connection, RetrainEnded not sent");
            }
        });
        handle
    }

    pub fn submit_fetch(&self) -> JobHandle {
        let backend = self.backend.clone();
        let handle = self
            .queue
            .submit(async move { backend.fetch().await }, |_| debug!("Starting fetch"));
        handle.on_complete(|outcome| match outcome {
            JobOutcome::Succeeded => debug!("Fetch finished"),
            JobOutcome::Failed(err) => error!("Fetch failed: {err}"),
            JobOutcome::Cancelled => warn!("Fetch cancelled"),
        });
        handle
    }

    /// Moves the orchestrator onto its own task so the grace wait never
    /// stalls the caller. On `cancel`, any running retrain is cancelled too.
    pub fn spawn(self, cancel: CancellationToken) -> (OrchestratorHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(async move {
            loop {
                select! {
                    _ = cancel.cancelled() => break,
                    request = rx.recv() => match request {
                        Some(JobRequest::Retrain { msg_id, batch }) => {
                            self.submit_retrain(msg_id, batch).await;
                        }
                        Some(JobRequest::Fetch) => {
                            self.submit_fetch();
                        }
                        None => break,
                    }
                }
            }
            if let Some(running) = self.state.running_job() {
                info!("Shutting down, cancelling running retrain");
                running.cancel();
                running.wait().await;
            }
        });
        (OrchestratorHandle { tx }, join)
    }
}
