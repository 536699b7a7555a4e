use anyhow::Result;
use async_trait::async_trait;
use continuum_data_store::FeatureVector;
use tracing::info;

use crate::TrainingBackend;

#[derive(Debug, Default)]
pub struct ScikitBackend;

#[async_trait]
impl TrainingBackend for ScikitBackend {
    async fn retrain(&self, batch: Vec<FeatureVector>) -> Result<()> {
        info!("scikit retrain called with {} vectors", batch.len());
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        info!("scikit fetch called");
        Ok(())
    }
}
