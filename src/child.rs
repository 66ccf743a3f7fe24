//! Scoped child-process handles plus a SIGTERM forwarder.
//!
//! The original (`original_source/barn-agent/src/sighandle.cpp`) keeps a
//! single global `child_pid` and forwards SIGTERM to whatever it currently
//! holds. Per the REDESIGN FLAG in spec §9 we replace the single global
//! with a registry of live, independently-owned child handles: spawning a
//! child registers it, dropping the handle (normal completion, or an
//! early return) deregisters it, and a signal-handling task consults the
//! registry instead of one mutable global.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

fn registry() -> &'static Mutex<HashSet<u32>> {
    static REGISTRY: OnceLock<Mutex<HashSet<u32>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Installs a task that forwards SIGTERM to every live managed child, then
/// re-raises SIGTERM against this process so it actually dies by signal
/// (`WIFSIGNALED`), not merely with a matching exit code. Call once at
/// startup.
///
/// Mirrors `sighandle.cpp::kill_child_handler`: forward to the child(ren),
/// reset `SIGTERM`'s disposition to the default action, then re-raise —
/// against a registry instead of a single global pid.
pub fn install_sigterm_forwarder() -> anyhow::Result<()> {
    let mut stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|err| anyhow::anyhow!("failed to install SIGTERM handler: {err}"))?;
    tokio::spawn(async move {
        if stream.recv().await.is_none() {
            return;
        }
        tracing::info!("received SIGTERM, forwarding to live child processes");
        let pids: Vec<u32> = registry().lock().unwrap().iter().copied().collect();
        for pid in pids {
            if let Err(err) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::debug!("failed to signal child {pid}: {err}");
            }
        }
        // Safety: restoring the default disposition for a single, known
        // signal right before re-raising it against ourselves; no other
        // handler state is touched.
        if let Err(err) = unsafe { signal::signal(Signal::SIGTERM, SigHandler::SigDfl) } {
            tracing::warn!("failed to reset SIGTERM disposition to default: {err}");
        }
        if let Err(err) = signal::raise(Signal::SIGTERM) {
            tracing::warn!("failed to re-raise SIGTERM: {err}");
            std::process::exit(143);
        }
    });
    Ok(())
}

/// An owning RAII handle around a spawned child: registers itself while
/// alive, deregisters on drop. No child may outlive the function that
/// launched it — callers must await completion before returning.
pub struct ManagedChild {
    child: Child,
    pid: Option<u32>,
}

impl ManagedChild {
    pub fn spawn(command: &mut Command) -> anyhow::Result<Self> {
        let child = command
            .spawn()
            .map_err(|err| anyhow::anyhow!("failed to spawn child process: {err}"))?;
        let pid = child.id();
        if let Some(pid) = pid {
            registry().lock().unwrap().insert(pid);
        }
        Ok(Self { child, pid })
    }

    pub async fn wait_with_output(mut self) -> std::io::Result<std::process::Output> {
        let output = self.child.wait_with_output().await;
        self.deregister();
        output
    }

    fn deregister(&mut self) {
        if let Some(pid) = self.pid.take() {
            registry().lock().unwrap().remove(&pid);
        }
    }
}

impl Drop for ManagedChild {
    fn drop(&mut self) {
        self.deregister();
    }
}
