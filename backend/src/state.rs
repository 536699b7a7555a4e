use continuum_wire::Message;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

use crate::jobs::{JobHandle, JobId};

/// Context shared by the connection manager and the orchestrator.
///
/// The outbox is the only way anything besides the connection manager reaches
/// the wire. It is absent while no connection exists.
#[derive(Debug, Default)]
pub struct ProcessState {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    current_job: Option<JobHandle>,
    current_msg_id: Option<u32>,
    is_training: bool,
    outbox: Option<mpsc::UnboundedSender<Message>>,
}

impl ProcessState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attach_outbox(&self, outbox: mpsc::UnboundedSender<Message>) {
        self.lock().outbox = Some(outbox);
    }

    pub fn detach_outbox(&self) {
        self.lock().outbox = None;
    }

    pub fn has_outbox(&self) -> bool {
        self.lock().outbox.is_some()
    }

    /// Queues `message` on the active connection. Returns false, dropping the
    /// message, when there is none.
    pub fn notify(&self, message: Message) -> bool {
        let inner = self.lock();
        let Some(outbox) = inner.outbox.as_ref() else {
            trace!("no connection, dropping {:?}", message.message_type());
            return false;
        };
        outbox.send(message).is_ok()
    }

    pub fn begin_job(&self, job: JobHandle, msg_id: u32) {
        let mut inner = self.lock();
        inner.current_job = Some(job);
        inner.current_msg_id = Some(msg_id);
        inner.is_training = true;
    }

    /// Clears the training flag if `id` is still the current job. A job that
    /// was superseded leaves the newer job's state alone.
    pub fn finish_job(&self, id: JobId) -> bool {
        let mut inner = self.lock();
        let is_current = inner.current_job.as_ref().map(JobHandle::id) == Some(id);
        if is_current {
            inner.is_training = false;
        }
        is_current
    }

    /// The current job, if it has not finished yet.
    pub fn running_job(&self) -> Option<JobHandle> {
        self.lock()
            .current_job
            .as_ref()
            .filter(|job| job.is_running())
            .cloned()
    }

    pub fn is_training(&self) -> bool {
        self.lock().is_training
    }

    pub fn current_msg_id(&self) -> Option<u32> {
        self.lock().current_msg_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobQueue;
    use continuum_wire::STATUS_OK;
    use std::future::pending;

    #[test]
    fn notifications_need_an_outbox() {
        let state = ProcessState::new();
        assert!(!state.notify(Message::BackendHeartbeat(None)));

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.attach_outbox(tx);
        assert!(state.notify(Message::RetrainEnded {
            msg_id: 4,
            status: STATUS_OK
        }));
        assert!(matches!(
            rx.try_recv(),
            Ok(Message::RetrainEnded { msg_id: 4, .. })
        ));

        state.detach_outbox();
        assert!(!state.has_outbox());
        assert!(!state.notify(Message::BackendHeartbeat(None)));
    }

    #[tokio::test]
    async fn stale_jobs_do_not_clear_newer_ones() {
        let state = ProcessState::new();
        let queue = JobQueue::new();
        let first = queue.submit(pending(), |job| state.begin_job(job.clone(), 1));
        let second = queue.submit(pending(), |job| state.begin_job(job.clone(), 2));

        assert!(!state.finish_job(first.id()));
        assert!(state.is_training());
        assert_eq!(state.current_msg_id(), Some(2));

        assert!(state.finish_job(second.id()));
        assert!(!state.is_training());
        first.cancel();
        second.cancel();
    }
}
