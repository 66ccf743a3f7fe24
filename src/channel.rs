//! Channel values: an immutable (source directory, rsync target) pair.

use std::path::{Path, PathBuf};

use crate::hostname;

/// Destination address + module namespace for a single rsync endpoint, as
/// given on the command line (`host:port`-style, no leading `rsync://`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub addr: String,
    pub namespace: String,
}

/// An immutable (source directory, rsync target URI) pair.
///
/// `target_uri` is bit-exact per spec §6:
/// `rsync://<host:port>/<namespace>/<service>@<category>@<fqdn>/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub source_dir: PathBuf,
    pub target_uri: String,
}

impl Channel {
    pub fn new(source_dir: PathBuf, endpoint: &Endpoint, service_name: &str, category: &str) -> Self {
        let target_uri = build_target_uri(
            &endpoint.addr,
            &endpoint.namespace,
            service_name,
            category,
            hostname::cached(),
        );
        Self {
            source_dir,
            target_uri,
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }
}

fn build_target_uri(
    host_addr: &str,
    namespace: &str,
    service_name: &str,
    category: &str,
    fqdn: &str,
) -> String {
    format!("rsync://{host_addr}/{namespace}/{service_name}@{category}@{fqdn}/")
}
