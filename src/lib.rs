//! Library surface for `barn-agent`: a host-local daemon that ships rotated
//! log files from a source directory to one or two rsync sinks, with
//! time-based failover and UDP telemetry.
//!
//! Grounded on the teacher's `lib.rs`/`main.rs` split (`rrm`): binaries stay
//! thin, the actual logic lives here so it's independently testable.

pub mod candidates;
pub mod channel;
pub mod child;
pub mod config;
pub mod control;
pub mod directory;
pub mod hostname;
pub mod metrics;
pub mod selector;
pub mod ship;
pub mod transfer;
pub mod watcher;

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber` text logger with the given default
/// filter directive, overridable via `RUST_LOG`. Call once at process
/// startup.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
