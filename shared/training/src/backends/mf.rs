use anyhow::{Context, Result};
use async_trait::async_trait;
use continuum_data_store::FeatureVector;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::id_pairs;
use crate::{create_child_dir, execute_command, latest_committed_dir, TrainingBackend};

/// Matrix factorization through the FastMF tool, run with `mill`.
///
/// ```text
/// <root>/data/0000000000/{model,lock}   initial base model
/// <root>/data/<secs>/{data,model,log}
/// <root>/src/                           FastMF sources
/// ```
///
/// Retrained models are never committed, so every retrain starts from the
/// initial base model.
#[derive(Debug)]
pub struct MfBackend {
    data_dir: PathBuf,
    code_dir: PathBuf,
}

impl MfBackend {
    pub fn new(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            code_dir: root.join("src"),
        }
    }
}

/// One `user<TAB>item<TAB>1.0<TAB>00000000` line per (user, item) pair.
pub fn mf_ratings(batch: &[FeatureVector]) -> Result<String> {
    Ok(id_pairs(batch)?
        .into_iter()
        .map(|(user, item)| format!("{user}\t{item}\t1.0\t00000000\n"))
        .collect())
}

#[async_trait]
impl TrainingBackend for MfBackend {
    async fn retrain(&self, batch: Vec<FeatureVector>) -> Result<()> {
        let ratings = mf_ratings(&batch)?;
        let base = latest_committed_dir(&self.data_dir)
            .await?
            .with_context(|| format!("no committed base model in {:?}", self.data_dir))?;
        let new_dir = create_child_dir(&self.data_dir).await?;
        fs::write(new_dir.join("data"), ratings).await?;

        let command = format!(
            "cd {cwd} && mill FastMF.run retrain {base}/model {res}/data {res}/model >{res}/log 2>&1",
            cwd = self.code_dir.display(),
            base = base.display(),
            res = new_dir.display(),
        );
        execute_command(&command).await?;
        info!("mf retrain wrote {}", new_dir.display());
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        info!("mf fetch called");
        Ok(())
    }
}
