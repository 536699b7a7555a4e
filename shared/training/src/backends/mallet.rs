use anyhow::{Context, Result};
use async_trait::async_trait;
use continuum_data_store::FeatureVector;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::whole_number;
use crate::{commit_dir, create_child_dir, execute_command, latest_committed_dir, TrainingBackend};

const DICTIONARY: &str = "dictionary";
const NUM_TOPICS: u32 = 10;
const NUM_ITERATIONS: u32 = 1000;

/// Topic modeling with the MALLET command line tool.
///
/// Expects the tool under `<root>/tool` and a pipe dictionary at
/// `<root>/data/dictionary`. Each result directory holds the imported text,
/// the instance data and the trained model.
#[derive(Debug)]
pub struct MalletBackend {
    bin: PathBuf,
    data_dir: PathBuf,
}

impl MalletBackend {
    pub fn new(root: &Path) -> Self {
        Self {
            bin: root.join("tool").join("bin").join("mallet"),
            data_dir: root.join("data"),
        }
    }
}

/// Decodes every vector as a line of character codes.
pub fn mallet_text(batch: &[FeatureVector]) -> Result<String> {
    let mut text = String::new();
    for (i, vector) in batch.iter().enumerate() {
        for &code in vector {
            let c = whole_number(code)
                .and_then(|code| u32::try_from(code).ok())
                .and_then(char::from_u32)
                .with_context(|| format!("vector {i} holds invalid character code {code}"))?;
            text.push(c);
        }
        text.push('\n');
    }
    Ok(text)
}

#[async_trait]
impl TrainingBackend for MalletBackend {
    async fn retrain(&self, batch: Vec<FeatureVector>) -> Result<()> {
        let text = mallet_text(&batch)?;
        let previous = latest_committed_dir(&self.data_dir).await?;
        let new_dir = create_child_dir(&self.data_dir).await?;
        let text_path = new_dir.join("text");
        let data_path = new_dir.join("data");
        let model_path = new_dir.join("model");
        let dictionary = new_dir.join(DICTIONARY);

        fs::write(&text_path, text).await?;
        fs::copy(self.data_dir.join(DICTIONARY), &dictionary)
            .await
            .context("failed to copy the pipe dictionary")?;

        execute_command(&format!(
            "{bin} import-file --input {input} --output {output} --token-regex '[\\p{{L}}\\p{{P}}]+' \
             --keep-sequence --remove-stopwords --use-pipe-from {dictionary}",
            bin = self.bin.display(),
            input = text_path.display(),
            output = data_path.display(),
            dictionary = dictionary.display(),
        ))
        .await?;

        let base_model = previous
            .map(|dir| format!(" --input-model {}", dir.join("model").display()))
            .unwrap_or_default();
        execute_command(&format!(
            "{bin} train-topics --input {input} --num-topics {NUM_TOPICS} --output-model {model} \
             --num-iterations {NUM_ITERATIONS} --show-topics-interval 1000000{base_model}",
            bin = self.bin.display(),
            input = data_path.display(),
            model = model_path.display(),
        ))
        .await?;

        commit_dir(&new_dir).await?;
        info!("mallet retrain committed {}", new_dir.display());
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        Ok(())
    }
}
