//! Standalone metrics listener: a thinner alternative to
//! `barn-agent --monitor_mode` for hosts that only run the monitor and
//! none of the shipping agents.
//!
//! Grounded on `original_source/barn-agent/src/localreport.cpp`
//! (`receive_datagrams`).

use clap::Parser;

use barn_agent::config::verbosity_to_filter;
use barn_agent::metrics::{run_receiver, ReportConsumer};

#[derive(Parser, Debug)]
#[command(
    name = "barn-monitor",
    version,
    about = "Listens for barn-agent UDP metric datagrams and logs them"
)]
struct Args {
    /// UDP port to listen on
    #[arg(long = "monitor_port")]
    monitor_port: u16,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

struct LoggingConsumer;

impl ReportConsumer for LoggingConsumer {
    fn report(&mut self, key: &str, value: i64) {
        tracing::info!(metric = key, value, "received metric report");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    barn_agent::init_logging(verbosity_to_filter(args.verbose));
    tracing::info!("barn-monitor listening on udp://127.0.0.1:{}/", args.monitor_port);
    run_receiver(args.monitor_port, LoggingConsumer).await
}
