//! Cached lookup of the agent host's fully qualified name.
//!
//! The original agent shells out to `hostname -f` once and memoizes the
//! result in a function-local static. We use `gethostname(2)` directly
//! instead of spawning a process; see DESIGN.md for why this is a safe
//! substitution for our use case (composing the rsync target URI).

use std::sync::OnceLock;

static HOSTNAME: OnceLock<String> = OnceLock::new();

/// Returns the cached host name, querying the OS on first use.
pub fn cached() -> &'static str {
    HOSTNAME.get_or_init(|| {
        nix::unistd::gethostname()
            .map(|os| os.to_string_lossy().into_owned())
            .unwrap_or_else(|err| {
                tracing::warn!("failed to resolve host name: {err}, using 'unknown'");
                "unknown".to_string()
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_is_stable_across_calls() {
        assert_eq!(cached(), cached());
    }

    #[test]
    fn cached_is_not_empty() {
        assert!(!cached().is_empty());
    }
}
