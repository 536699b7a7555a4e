use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{BatchSource, FeatureVector};

/// Token that terminates one feature vector inside a stored batch.
pub const ITEM_DELIMITER: &str = ",";

/// Reads of one batch id before the error is surfaced. A connection that
/// dropped fails the read that noticed it, the next read reconnects.
pub const READ_ATTEMPTS: usize = 2;

#[derive(Error, Debug, PartialEq)]
pub enum DataStoreError {
    #[error("token {token:?} at position {position} is not a number")]
    InvalidToken { token: String, position: usize },
}

/// Splits raw batch tokens into feature vectors.
///
/// Every vector is terminated by [`ITEM_DELIMITER`]. Tokens after the last
/// delimiter belong to a vector that was never finished and are dropped.
pub fn parse_runs(tokens: &[String]) -> Result<Vec<FeatureVector>, DataStoreError> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (position, token) in tokens.iter().enumerate() {
        if token == ITEM_DELIMITER {
            runs.push(std::mem::take(&mut current));
            continue;
        }
        let value = token
            .trim()
            .parse::<f64>()
            .map_err(|_| DataStoreError::InvalidToken {
                token: token.clone(),
                position,
            })?;
        current.push(value);
    }
    if !current.is_empty() {
        trace!("dropping {} unterminated tokens", current.len());
    }
    Ok(runs)
}

/// Reads training batches out of a [`BatchSource`].
///
/// Batches are write-once logs keyed by the ids the scheduler sends, so
/// nothing is cached between calls.
pub struct DataStoreClient<S: BatchSource> {
    source: S,
}

impl<S: BatchSource> DataStoreClient<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn get_batch(&mut self, ids: &[String]) -> Result<Vec<FeatureVector>> {
        let mut batch = Vec::new();
        for id in ids {
            let tokens = self
                .read_tokens(id)
                .await
                .with_context(|| format!("failed to read batch {id:?}"))?;
            let runs =
                parse_runs(&tokens).with_context(|| format!("malformed data in batch {id:?}"))?;
            debug!("batch {id:?} holds {} vectors", runs.len());
            batch.extend(runs);
        }
        Ok(batch)
    }

    async fn read_tokens(&mut self, id: &str) -> Result<Vec<String>> {
        let mut attempt = 1;
        loop {
            match self.source.read_tokens(id).await {
                Ok(tokens) => return Ok(tokens),
                Err(err) if attempt < READ_ATTEMPTS => {
                    warn!("Reading batch {id:?} failed, retrying: {err:#}");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
