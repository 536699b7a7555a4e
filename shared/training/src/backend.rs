use anyhow::Result;
use async_trait::async_trait;
use continuum_data_store::FeatureVector;

/// One training algorithm this process can drive.
///
/// Implementations own their on-disk model state. A retrain future may be
/// dropped at any await point when the job is cancelled, so anything it
/// spawns must die with it.
#[async_trait]
pub trait TrainingBackend: Send + Sync {
    async fn retrain(&self, batch: Vec<FeatureVector>) -> Result<()>;

    /// Loads the most recent committed model, if the backend keeps one.
    async fn fetch(&self) -> Result<()>;
}
