//! Daemon entry point: parses arguments, wires up the channel selector,
//! installs the SIGTERM forwarder, and runs the control loop forever.
//!
//! Grounded on `original_source/barn-agent/src/barn-agent.cpp::main` and
//! the CLI wiring in `rcp/src/bin/rcp.rs::main`.

use clap::Parser;

use barn_agent::channel::Channel;
use barn_agent::config::{Args, Config};
use barn_agent::control::ControlLoop;
use barn_agent::metrics::{run_receiver, MetricsClient, ReportConsumer};
use barn_agent::selector::{ChannelSelector, Failover, Single};
use barn_agent::transfer::Transferer;

struct LoggingConsumer;

impl ReportConsumer for LoggingConsumer {
    fn report(&mut self, key: &str, value: i64) {
        tracing::info!(metric = key, value, "received metric report");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    barn_agent::init_logging(barn_agent::config::verbosity_to_filter(args.verbose));

    let config = Config::from_args(args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    barn_agent::child::install_sigterm_forwarder()?;

    match config {
        Config::Monitor { monitor_port } => {
            tracing::info!("starting in monitor mode on udp://127.0.0.1:{monitor_port}/");
            run_receiver(monitor_port, LoggingConsumer).await
        }
        Config::Agent(agent) => {
            let primary = Channel::new(
                agent.source_dir.clone(),
                &agent.primary,
                &agent.service_name,
                &agent.category,
            );
            let selector: Box<dyn ChannelSelector> = match agent.secondary {
                Some(secondary_endpoint) if agent.seconds_before_failover > 0 => {
                    let secondary = Channel::new(
                        agent.source_dir.clone(),
                        &secondary_endpoint,
                        &agent.service_name,
                        &agent.category,
                    );
                    Box::new(Failover::new(
                        primary,
                        secondary,
                        agent.seconds_before_failover,
                    ))
                }
                _ => Box::new(Single::new(primary)),
            };

            let transferer = Transferer::default();
            let metrics = MetricsClient::new(agent.monitor_port);
            let mut control_loop =
                ControlLoop::new(selector, transferer, metrics, agent.sleep_seconds);
            tracing::info!(
                source = %agent.source_dir.display(),
                service = %agent.service_name,
                category = %agent.category,
                "barn-agent starting"
            );
            control_loop.run().await
        }
    }
}
