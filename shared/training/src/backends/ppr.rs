use anyhow::Result;
use async_trait::async_trait;
use continuum_data_store::FeatureVector;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::id_pairs;
use crate::{commit_dir, create_child_dir, execute_command, latest_committed_dir, TrainingBackend};

const SBT_OPTS: &str =
    "-Xmx8G -XX:+UseConcMarkSweepGC -XX:+CMSClassUnloadingEnabled -XX:MaxPermSize=8G";

/// Personalized PageRank, run with `sbt`.
///
/// The first retrain trains from `<root>/data/graph`; later ones continue from
/// the latest committed result.
#[derive(Debug)]
pub struct PprBackend {
    data_dir: PathBuf,
    code_dir: PathBuf,
}

impl PprBackend {
    pub fn new(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            code_dir: root.join("src"),
        }
    }

    fn sbt_task(&self, previous: Option<&Path>, res: &Path) -> String {
        let res = res.display();
        match previous {
            Some(previous) => format!("run retrain {} {res} edges {res}", previous.display()),
            None => format!(
                "run train {} graph 0.0015 0.05 89805 {res} edges {res}",
                self.data_dir.display()
            ),
        }
    }
}

/// One `u v` line per edge.
pub fn ppr_edges(batch: &[FeatureVector]) -> Result<String> {
    Ok(id_pairs(batch)?
        .into_iter()
        .map(|(u, v)| format!("{u} {v}\n"))
        .collect())
}

#[async_trait]
impl TrainingBackend for PprBackend {
    async fn retrain(&self, batch: Vec<FeatureVector>) -> Result<()> {
        let edges = ppr_edges(&batch)?;
        let previous = latest_committed_dir(&self.data_dir).await?;
        let new_dir = create_child_dir(&self.data_dir).await?;
        fs::write(new_dir.join("edges"), edges).await?;

        let command = format!(
            "cd {cwd} && export SBT_OPTS=\"{SBT_OPTS}\" && sbt \"{task}\" >{res}/log 2>&1",
            cwd = self.code_dir.display(),
            task = self.sbt_task(previous.as_deref(), &new_dir),
            res = new_dir.display(),
        );
        execute_command(&command).await?;
        commit_dir(&new_dir).await?;
        info!("ppr retrain committed {}", new_dir.display());
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        info!("ppr fetch called");
        Ok(())
    }
}
