use anyhow::Result;
use async_trait::async_trait;
use continuum_data_store::FeatureVector;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::TrainingBackend;

/// Pretends to train, taking longer for bigger batches.
#[derive(Debug, Default)]
pub struct TestBackend;

impl TestBackend {
    pub fn retrain_duration(batch_len: usize) -> Duration {
        Duration::from_millis(100 * batch_len as u64 + 1500)
    }
}

#[async_trait]
impl TrainingBackend for TestBackend {
    async fn retrain(&self, batch: Vec<FeatureVector>) -> Result<()> {
        sleep(Self::retrain_duration(batch.len())).await;
        info!("test retrain finished with data: {batch:?}");
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        info!("test fetch called");
        Ok(())
    }
}
