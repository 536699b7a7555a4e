mod orchestrator;
mod queue;

pub use orchestrator::{JobRequest, Orchestrator, OrchestratorClosed, OrchestratorHandle};
pub use queue::{JobHandle, JobId, JobOutcome, JobQueue};
