//! `DirectoryLister`: list the source directory, filter to shippable log
//! files, honor the `STOP_SHIPPING` emergency-stop sentinel.

use std::path::Path;

/// Literal filename of a regular file whose presence in the source
/// directory suppresses all shipping (emergency kill switch).
pub const STOP_SHIPPING: &str = "STOP_SHIPPING";

/// Returns the sorted, ascending list of log file names (entries starting
/// with `@`) in `dir`. Returns an empty list if `STOP_SHIPPING` is present.
///
/// Non-recursive; only entry names are inspected, not their contents.
pub async fn list_log_directory(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|err| anyhow::anyhow!("failed to read log directory {dir:?}: {err}"))?;

    let mut names = Vec::new();
    let mut stop_shipping = false;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| anyhow::anyhow!("failed traversing log directory {dir:?}: {err}"))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == STOP_SHIPPING {
            stop_shipping = true;
            continue;
        }
        if name.starts_with('@') {
            names.push(name);
        }
    }
    if stop_shipping {
        tracing::warn!("{STOP_SHIPPING} found in {dir:?}, disabling log shipping");
        return Ok(Vec::new());
    }
    names.sort();
    Ok(names)
}
