//! Timestamp-named result directories.
//!
//! A backend writes each retrain into a fresh child of its data directory and
//! marks it complete by writing `1` into the marker file. Readers only trust
//! committed directories.

use std::{
    io,
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tokio::fs;

pub const MARKER_FILE: &str = "lock";
const COMMITTED: &str = "1";

/// Returns the lexicographically greatest child of `parent` whose marker file
/// holds exactly `1`. A missing `parent` has no committed children.
pub async fn latest_committed_dir(parent: &Path) -> io::Result<Option<PathBuf>> {
    let mut entries = match fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        children.push(entry.path());
    }
    children.sort();

    for child in children.into_iter().rev() {
        if let Ok(marker) = fs::read_to_string(child.join(MARKER_FILE)).await {
            if marker == COMMITTED {
                return Ok(Some(child));
            }
        }
    }
    Ok(None)
}

/// Creates `parent/<unix seconds>`, including any missing parents.
pub async fn create_child_dir(parent: &Path) -> io::Result<PathBuf> {
    let dir = parent.join(OffsetDateTime::now_utc().unix_timestamp().to_string());
    fs::create_dir_all(&dir).await?;
    Ok(dir)
}

pub async fn commit_dir(dir: &Path) -> io::Result<()> {
    fs::write(dir.join(MARKER_FILE), COMMITTED).await
}
