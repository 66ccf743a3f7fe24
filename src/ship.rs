//! `Shipper`: executes one shipping round.
//!
//! Grounded on `original_source/barn-agent/src/barn-agent.cpp`
//! (`ship_candidates`).

use thiserror::Error;

use crate::candidates::{count_missing, tail_intersection};
use crate::channel::Channel;
use crate::metrics::MetricsSink;
use crate::transfer::Transferer;

/// Outcome of a shipping round that made at least some progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShipOutcome {
    pub num_shipped: usize,
    pub num_rotated_during_ship: usize,
    pub num_lost_during_ship: usize,
}

/// Candidates existed but zero files were shipped this round. Carries the
/// (empty-progress) outcome so the caller can still inspect rotation/loss
/// counts if useful for logging.
#[derive(Debug, Error)]
#[error("shipped 0 of {candidates} candidate file(s)")]
pub struct ShipAllFailedError {
    pub candidates: usize,
    pub outcome: ShipOutcome,
}

pub struct Shipper {
    transferer: Transferer,
}

impl Shipper {
    pub fn new(transferer: Transferer) -> Self {
        Self { transferer }
    }

    /// Executes one round given the pre-round `local_listing` (sorted
    /// ascending) and the probe's `missing_on_target` set (sorted
    /// ascending). `metrics` receives `FilesToShip`, `FullDirectoryShip`
    /// (only when non-noise, see DESIGN.md), `NumFilesShipped`,
    /// `LostDuringShip`, `RotatedDuringShip` (the latter two only when
    /// non-zero, per spec §4.5 step 5).
    pub async fn ship(
        &self,
        channel: &Channel,
        local_listing: &[String],
        missing_on_target: &[String],
        metrics: &dyn MetricsSink,
    ) -> Result<ShipOutcome, ShipAllFailedError> {
        let candidates = tail_intersection(local_listing, missing_on_target);
        metrics.send("FilesToShip", candidates.len() as i64);
        if candidates.len() == local_listing.len() && local_listing.len() >= 2 {
            metrics.send("FullDirectoryShip", 1);
        }

        if candidates.is_empty() {
            return Ok(ShipOutcome::default());
        }

        let mut num_shipped = 0usize;
        let mut num_lost_during_ship = 0usize;
        for file_name in &candidates {
            let file_path = channel.source_dir().join(file_name);
            if self.transferer.ship_one(&file_path, &channel.target_uri).await {
                num_shipped += 1;
                continue;
            }
            tracing::error!("rsync failed to transfer {file_name}");
            if !tokio::fs::try_exists(&file_path).await.unwrap_or(true) {
                tracing::error!("couldn't ship {file_name} since it was rotated away meanwhile");
                num_lost_during_ship += 1;
                continue;
            }
            // Still present locally: treat as transient, stop and retry
            // the remainder (including this file) next round.
            break;
        }

        let listing_after = crate::directory::list_log_directory(channel.source_dir())
            .await
            .unwrap_or_else(|err| {
                tracing::warn!("failed to re-list source directory after ship: {err}");
                Vec::new()
            });
        let num_rotated_during_ship = count_missing(&candidates, &listing_after);
        if num_rotated_during_ship != 0 {
            tracing::warn!("producing logs faster than shipping: {num_rotated_during_ship} rotated during this round");
        }

        let outcome = ShipOutcome {
            num_shipped,
            num_rotated_during_ship,
            num_lost_during_ship,
        };
        metrics.send("NumFilesShipped", outcome.num_shipped as i64);
        if outcome.num_lost_during_ship != 0 {
            metrics.send("LostDuringShip", outcome.num_lost_during_ship as i64);
        }
        if outcome.num_rotated_during_ship != 0 {
            metrics.send("RotatedDuringShip", outcome.num_rotated_during_ship as i64);
        }

        if outcome.num_shipped == 0 {
            return Err(ShipAllFailedError {
                candidates: candidates.len(),
                outcome,
            });
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    struct Capture(Arc<Mutex<Vec<(String, i64)>>>);
    impl MetricsSink for Capture {
        fn send(&self, key: &str, value: i64) {
            self.0.lock().unwrap().push((key.to_string(), value));
        }
    }

    fn chan(dir: &std::path::Path) -> Channel {
        Channel {
            source_dir: dir.to_path_buf(),
            target_uri: "rsync://h/n/".to_string(),
        }
    }

    async fn touch(dir: &std::path::Path, name: &str) {
        tokio::fs::File::create(dir.join(name)).await.unwrap();
    }

    #[tokio::test]
    async fn noop_round_reports_zero_and_no_heartbeat_signal() {
        let tmp = tempfile::tempdir().unwrap();
        let shipper = Shipper::new(Transferer::new("true"));
        let log = Arc::new(Mutex::new(Vec::new()));
        let outcome = shipper
            .ship(&chan(tmp.path()), &[], &[], &Capture(log.clone()))
            .await
            .unwrap();
        assert_eq!(outcome, ShipOutcome::default());
        assert!(log.lock().unwrap().contains(&("FilesToShip".to_string(), 0)));
    }

    #[tokio::test]
    async fn ships_all_in_fresh_directory() {
        let tmp = tempfile::tempdir().unwrap();
        for f in ["@t1", "@t2", "@t3"] {
            touch(tmp.path(), f).await;
        }
        let shipper = Shipper::new(Transferer::new("true"));
        let local = vec!["@t1".to_string(), "@t2".to_string(), "@t3".to_string()];
        let log = Arc::new(Mutex::new(Vec::new()));
        let outcome = shipper
            .ship(&chan(tmp.path()), &local, &local, &Capture(log.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.num_shipped, 3);
        let entries = log.lock().unwrap();
        assert!(entries.contains(&("FullDirectoryShip".to_string(), 1)));
        assert!(entries.contains(&("NumFilesShipped".to_string(), 3)));
    }

    #[tokio::test]
    async fn ships_only_newer_than_sink() {
        let tmp = tempfile::tempdir().unwrap();
        for f in ["@t1", "@t2", "@t3", "@t4", "@t5", "@t6"] {
            touch(tmp.path(), f).await;
        }
        let local: Vec<String> = ["@t1", "@t2", "@t3", "@t4", "@t5", "@t6"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let missing: Vec<String> = ["@t1", "@t2", "@t5", "@t6"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let shipper = Shipper::new(Transferer::new("true"));
        let log = Arc::new(Mutex::new(Vec::new()));
        let outcome = shipper
            .ship(&chan(tmp.path()), &local, &missing, &Capture(log.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.num_shipped, 2);
        assert!(log.lock().unwrap().contains(&("FilesToShip".to_string(), 2)));
    }

    #[tokio::test]
    async fn rotation_during_ship_is_lost_when_file_vanished() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "@t2").await;
        // @t1 deliberately not created: simulates it rotating away before
        // ship_one is attempted, with ship_one itself also failing (since
        // "false" never succeeds).
        let local = vec!["@t1".to_string(), "@t2".to_string()];
        let shipper = Shipper::new(Transferer::new("false"));
        let log = Arc::new(Mutex::new(Vec::new()));
        let outcome = shipper
            .ship(&chan(tmp.path()), &local, &local, &Capture(log.clone()))
            .await;
        // all ship_one calls fail (binary is "false"); @t1 is missing so
        // it's recorded lost, then the loop halts on the now-still-present
        // @t2 (transient), leaving num_shipped at 0 -> ShipAllFailedError.
        let err = outcome.unwrap_err();
        assert_eq!(err.outcome.num_lost_during_ship, 1);
        assert_eq!(err.outcome.num_shipped, 0);
    }

    #[tokio::test]
    async fn partial_ship_halts_on_first_still_present_failure() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "@t0").await;
        touch(tmp.path(), "@t1").await;
        let local = vec!["@t0".to_string(), "@t1".to_string()];

        // A stub "rsync" that succeeds for any path except one containing
        // "@t1", mimicking "ship_one succeeds on t0, fails on t1 which is
        // still present locally".
        let script_path = tmp.path().join("fake-rsync.sh");
        tokio::fs::write(
            &script_path,
            "#!/bin/sh\nfor arg in \"$@\"; do case \"$arg\" in *@t1) exit 5 ;; esac; done\nexit 0\n",
        )
        .await
        .unwrap();
        let mut perms = tokio::fs::metadata(&script_path).await.unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        tokio::fs::set_permissions(&script_path, perms).await.unwrap();

        let shipper = Shipper::new(Transferer::new(script_path.to_string_lossy().into_owned()));
        let log = Arc::new(Mutex::new(Vec::new()));
        let outcome = shipper
            .ship(&chan(tmp.path()), &local, &local, &Capture(log.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.num_shipped, 1);
        assert_eq!(outcome.num_lost_during_ship, 0);
    }
}
