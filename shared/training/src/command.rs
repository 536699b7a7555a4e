use std::{io, process::Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("command `{command}` exited with code {code:?}, output: {output}")]
    Failed {
        command: String,
        code: Option<i32>,
        output: String,
    },
}

/// Runs `command` through `sh -c` and returns its captured output.
///
/// Output is stdout followed by stderr. The child is killed if the returned
/// future is dropped before it exits.
pub async fn execute_command(command: &str) -> Result<String, CommandError> {
    debug!("running `{command}`");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            command: command.to_owned(),
            source,
        })?;

    let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
    captured.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(CommandError::Failed {
            command: command.to_owned(),
            code: output.status.code(),
            output: captured,
        });
    }
    Ok(captured)
}
