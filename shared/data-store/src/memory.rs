use anyhow::Result;
use std::collections::HashMap;

use crate::{BatchSource, ITEM_DELIMITER};

/// Batch source backed by a map, used for local runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryBatchSource {
    batches: HashMap<String, Vec<String>>,
}

impl MemoryBatchSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw tokens under `id`, the way the data frontend pushes them.
    pub fn push_tokens<I, T>(&mut self, id: &str, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.batches
            .entry(id.to_owned())
            .or_default()
            .extend(tokens.into_iter().map(Into::into));
    }

    /// Appends each vector under `id`, terminating every one with the delimiter.
    pub fn push_vectors(&mut self, id: &str, vectors: &[Vec<f64>]) {
        for vector in vectors {
            let tokens = vector
                .iter()
                .map(|v| v.to_string())
                .chain(std::iter::once(ITEM_DELIMITER.to_string()));
            self.push_tokens(id, tokens);
        }
    }
}

impl BatchSource for MemoryBatchSource {
    async fn read_tokens(&mut self, id: &str) -> Result<Vec<String>> {
        Ok(self.batches.get(id).cloned().unwrap_or_default())
    }
}
