//! Command-line surface and validated configuration.
//!
//! Grounded on `original_source/barn-agent/src/params.cpp`
//! (`parse_command_line`); derive style and verbosity-to-log-level mapping
//! follow `rcp/src/bin/rcp.rs::Args` and `common::config::OutputConfig`.

use clap::Parser;

use crate::channel::Endpoint;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "barn-agent",
    version,
    about = "Ships rotated log files from a host-local directory to one or two rsync sinks, with failover and UDP telemetry"
)]
pub struct Args {
    /// Target barn-hdfs node, `host:port`
    #[arg(short = 'm', long = "target-addr")]
    target_addr: Option<String>,

    /// Optional backup barn-hdfs node, `host:port`; see `--seconds-before-failover`
    #[arg(short = 'b', long = "backup-addr")]
    backup_addr: Option<String>,

    /// Source log directory
    #[arg(short, long)]
    source: Option<std::path::PathBuf>,

    /// Name of the service that owns the log directory
    #[arg(short = 'n', long = "service-name")]
    service_name: Option<String>,

    /// Additional sub-namespace per service
    #[arg(short, long)]
    category: Option<String>,

    /// UDP port to publish metrics on; 0 disables metrics reporting
    #[arg(long = "monitor_port", default_value_t = 0)]
    monitor_port: u16,

    /// How long without a successful ship before failing over to
    /// `--backup-addr`; 0 disables failover. Must be 0 or > 60.
    #[arg(long = "seconds_before_failover", default_value_t = 0)]
    seconds_before_failover: u64,

    /// How long to sleep between actions such as a successful ship and the next one
    #[arg(short = 'i', long = "sleep_seconds", default_value_t = 5)]
    sleep_seconds: u64,

    /// Rsync module name on the destination barn-hdfs node
    #[arg(long = "remote_rsync_namespace", default_value = "barn_logs")]
    remote_rsync_namespace: String,

    /// Rsync module name on the backup barn-hdfs node
    #[arg(long = "remote_rsync_namespace_backup", default_value = "barn_backup_logs")]
    remote_rsync_namespace_backup: String,

    /// Run as a standalone metrics listener on `--monitor_port` instead of
    /// shipping logs; all other options are unused in this mode
    #[arg(long = "monitor_mode")]
    monitor_mode: bool,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Validated, typed configuration. Constructing one enforces every
/// precondition `params.cpp` checks before returning `BarnConf`.
#[derive(Debug, Clone)]
pub enum Config {
    /// `--monitor_mode`: just listen for metrics datagrams.
    Monitor { monitor_port: u16 },
    /// Normal shipping mode.
    Agent(AgentConfig),
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub source_dir: std::path::PathBuf,
    pub service_name: String,
    pub category: String,
    pub primary: Endpoint,
    pub secondary: Option<Endpoint>,
    pub monitor_port: u16,
    pub seconds_before_failover: u64,
    pub sleep_seconds: u64,
}

impl Config {
    /// Mirrors `parse_command_line`'s validation: required options in
    /// non-monitor mode, `monitor_port` required in monitor mode,
    /// `seconds_before_failover` either disabled (0) or `> 60`, and a
    /// backup address required whenever failover is enabled.
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        if args.monitor_mode {
            if args.monitor_port == 0 {
                anyhow::bail!("option 'monitor_port' is required in monitor_mode");
            }
            return Ok(Config::Monitor {
                monitor_port: args.monitor_port,
            });
        }

        let target_addr = args
            .target_addr
            .ok_or_else(|| anyhow::anyhow!("option 'target-addr' is required"))?;
        let source_dir = args
            .source
            .ok_or_else(|| anyhow::anyhow!("option 'source' is required"))?;
        let service_name = args
            .service_name
            .ok_or_else(|| anyhow::anyhow!("option 'service-name' is required"))?;
        let category = args
            .category
            .ok_or_else(|| anyhow::anyhow!("option 'category' is required"))?;

        if args.seconds_before_failover != 0 && args.seconds_before_failover <= 60 {
            anyhow::bail!(
                "seconds_before_failover less than one minute, this would cause failovers too quickly"
            );
        }
        if args.seconds_before_failover > 0 && args.backup_addr.is_none() {
            anyhow::bail!("'seconds_before_failover' is set but 'backup-addr' was not given");
        }
        if args.monitor_port == 0 {
            tracing::warn!("no monitor_port specified, metrics reporting disabled");
        }

        let secondary = args.backup_addr.map(|addr| Endpoint {
            addr,
            namespace: args.remote_rsync_namespace_backup,
        });

        Ok(Config::Agent(AgentConfig {
            source_dir,
            service_name,
            category,
            primary: Endpoint {
                addr: target_addr,
                namespace: args.remote_rsync_namespace,
            },
            secondary,
            monitor_port: args.monitor_port,
            seconds_before_failover: args.seconds_before_failover,
            sleep_seconds: args.sleep_seconds,
        }))
    }
}

/// Verbosity count to a `tracing_subscriber` filter directive, matching
/// `common::config::OutputConfig`'s documented mapping: 0=ERROR, 1=INFO,
/// 2=DEBUG, 3+=TRACE.
pub fn verbosity_to_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
