//! Git subprocess plumbing.

use std::path::Path;
use tempo_core::{Result, TempoError};
use tokio::process::Command;
use tracing::trace;

/// Run `git <args>` in `working_dir` and return stdout.
///
/// A spawn failure or non-zero exit becomes a `GitCommandFailed` error
/// carrying the full command string; callers never get partial output.
pub(crate) async fn run_git(working_dir: &Path, args: &[&str]) -> Result<String> {
    trace!(command = %args.join(" "), "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(working_dir)
        .output()
        .await
        .map_err(|err| TempoError::git_command(format!("git {} ({err})", args.join(" "))))?;

    if !output.status.success() {
        return Err(TempoError::git_command(format!("git {}", args.join(" "))));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
