use anyhow::{anyhow, Result};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

use crate::BatchSource;

/// Database the data frontend writes retrain batches into.
pub const REDIS_RETRAIN_DATA_DB: i64 = 10;

/// Reads batches stored as Redis lists, one list per batch id.
///
/// The underlying connection re-establishes itself after the server drops
/// it. The request that hit the dropped connection still fails.
#[derive(Clone)]
pub struct RedisBatchSource {
    address: String,
    connection: ConnectionManager,
    response_timeout: Duration,
}

impl RedisBatchSource {
    pub async fn connect(
        host: &str,
        port: u16,
        db: i64,
        response_timeout: Duration,
    ) -> Result<Self> {
        let address = format!("redis://{host}:{port}/{db}");
        let client = Client::open(address.as_str())?;
        let connection = timeout(response_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow!("no answer from {address} within {response_timeout:?}"))??;
        info!("Connected to data store at {address}");
        Ok(Self {
            address,
            connection,
            response_timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl BatchSource for RedisBatchSource {
    async fn read_tokens(&mut self, id: &str) -> Result<Vec<String>> {
        let response_timeout = self.response_timeout;
        let tokens: Vec<String> = timeout(response_timeout, self.connection.lrange(id, 0, -1))
            .await
            .map_err(|_| anyhow!("LRANGE {id:?} got no reply within {response_timeout:?}"))??;
        Ok(tokens)
    }
}
