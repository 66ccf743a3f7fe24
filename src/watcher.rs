//! `FileWatcher`: wait for a new file to be moved into the source
//! directory, with a bounded-sleep fallback.
//!
//! Grounded on `original_source/barn-agent/src/files.cpp`
//! (`wait_for_new_file_in_directory`); invokes the same external
//! `inotifywait` tool per spec §6.

use std::path::Path;
use std::time::Duration;

use crate::child::ManagedChild;

/// Fixed timeout baked into the directory-watch tool invocation, bit-exact
/// per spec §6 (`--timeout 3600`). Not the fallback sleep duration — see
/// [`wait_for_new_file`].
const WATCH_TIMEOUT: Duration = Duration::from_secs(3600);

/// Blocks until a file is moved/renamed into `dir`, the watch tool's fixed
/// 3600s timeout elapses, or — if the tool is unavailable — a fallback
/// sleep of `sleep_seconds` elapses (falling back to the same 3600s when
/// `sleep_seconds` is 0, per spec §4.2/§4.8). Returns `true` on any
/// non-error outcome, including the fallback-sleep path. This is the sole
/// long-suspending call in the main loop.
pub async fn wait_for_new_file(dir: &Path, sleep_seconds: u64) -> bool {
    wait_for_new_file_with_timeouts(dir, WATCH_TIMEOUT, fallback_duration(sleep_seconds)).await
}

/// `sleep_seconds`, or the fixed 3600s watch timeout when `sleep_seconds`
/// is 0 (failover/backoff disabled), per spec §4.2/§4.8.
fn fallback_duration(sleep_seconds: u64) -> Duration {
    if sleep_seconds == 0 {
        WATCH_TIMEOUT
    } else {
        Duration::from_secs(sleep_seconds)
    }
}

/// Test seam: same as [`wait_for_new_file`] but with both durations
/// overridable, so tests don't have to wait a full hour for either path.
async fn wait_for_new_file_with_timeouts(
    dir: &Path,
    watch_timeout: Duration,
    fallback_sleep: Duration,
) -> bool {
    let dir_arg = format!("{}/", dir.display());
    let mut command = tokio::process::Command::new("inotifywait");
    command
        .arg("--exclude")
        .arg(r"\.u")
        .arg("--exclude")
        .arg("lock")
        .arg("--exclude")
        .arg("current")
        .arg("--timeout")
        .arg(watch_timeout.as_secs().to_string())
        .arg("-q")
        .arg("-e")
        .arg("moved_to")
        .arg(&dir_arg)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    let managed = match ManagedChild::spawn(&mut command) {
        Ok(managed) => managed,
        Err(err) => {
            tracing::info!("inotifywait unavailable ({err}), sleeping instead");
            tokio::time::sleep(fallback_sleep).await;
            return true;
        }
    };
    match managed.wait_with_output().await {
        Ok(_) => true,
        Err(err) => {
            tracing::info!("inotifywait failed to run ({err}), sleeping instead");
            tokio::time::sleep(fallback_sleep).await;
            true
        }
    }
}
