//! `MetricsClient`: fire-and-forget UDP telemetry, plus the monitor-side
//! receiver that parses datagrams back into (key, value) pairs.
//!
//! Grounded on `original_source/barn-agent/src/localreport.cpp`
//! (`send_datagram`/`receive_datagrams`) and `metrics.h`'s
//! `DefaultZeroMetrics` list.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Metric keys published as zero when the agent has nothing to report for
/// them on a given iteration, so that "zero" is distinguishable from
/// "absent" on the monitor side (ganglia-style requirement, preserved
/// verbatim from `metrics.h`).
pub const DEFAULT_ZERO_METRICS: &[&str] = &[
    "FilesToShip",
    "FailedToGetSyncList",
    "FullDirectoryShip",
    "RotatedDuringShip",
    "NumFilesShipped",
    "LostDuringShip",
    "FailedOverAgents",
];

/// Capability contract for sending metrics, so callers (ChannelSelector,
/// Shipper, ControlLoop) don't depend on a concrete UDP client — a trait
/// object stands in for the class-hierarchy substitutability the original
/// used `Metrics`/`NoOpMetrics` for.
pub trait MetricsSink: Send + Sync {
    fn send(&self, key: &str, value: i64);
}

/// Sends `"<key> <value>"` UDP datagrams to `127.0.0.1:port`. A `port` of
/// `0` makes every `send` a no-op, matching `NoOpMetrics` in the source.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    target: Option<SocketAddr>,
}

impl MetricsClient {
    pub fn new(monitor_port: u16) -> Self {
        let target = if monitor_port == 0 {
            None
        } else {
            Some(SocketAddr::from(([127, 0, 0, 1], monitor_port)))
        };
        Self { target }
    }

    /// Publish the full `DEFAULT_ZERO_METRICS` set as zero. Call once per
    /// control-loop iteration before round-specific metrics are sent, so
    /// any metric this round doesn't touch still reads as a reported zero.
    pub fn send_defaults(&self) {
        for key in DEFAULT_ZERO_METRICS {
            self.send(key, 0);
        }
    }
}

impl MetricsSink for MetricsClient {
    fn send(&self, key: &str, value: i64) {
        let Some(target) = self.target else {
            return;
        };
        let payload = format!("{key} {value}");
        // Fire-and-forget: a short-lived socket per send is fine, datagrams
        // are loss-tolerant and idempotent on the monitor side.
        tokio::spawn(async move {
            let socket = match UdpSocket::bind("127.0.0.1:0").await {
                Ok(socket) => socket,
                Err(err) => {
                    tracing::debug!("metrics: failed to bind UDP socket: {err}");
                    return;
                }
            };
            if let Err(err) = socket.send_to(payload.as_bytes(), target).await {
                tracing::debug!("metrics: failed to send {payload:?}: {err}");
            }
        });
    }
}

/// A consumer of parsed `(key, value)` pairs on the monitor side. The
/// actual forwarding to a cluster telemetry system is out of scope for
/// this core (spec §1); callers supply whatever consumer they need.
pub trait ReportConsumer: Send {
    fn report(&mut self, key: &str, value: i64);
}

/// Parses one UDP datagram payload as `"<key> <value>"`. Returns `None`
/// for malformed payloads (unlike the C++ `istringstream >> key >> value`,
/// which would leave `value` as zero on parse failure, we make this
/// explicit and just drop the datagram).
pub fn parse_datagram(payload: &str) -> Option<(&str, i64)> {
    let mut parts = payload.trim_end().splitn(2, ' ');
    let key = parts.next()?;
    let value = parts.next()?.trim().parse::<i64>().ok()?;
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Receives datagrams on `port` in a loop, handing each successfully
/// parsed `(key, value)` pair to `consumer`. Runs until the socket errors.
/// 250-byte buffer per spec §4.7.
pub async fn run_receiver(
    port: u16,
    mut consumer: impl ReportConsumer,
) -> anyhow::Result<()> {
    const BUFFER_SIZE: usize = 250;
    let socket = UdpSocket::bind(SocketAddr::from(([127, 0, 0, 1], port)))
        .await
        .map_err(|err| anyhow::anyhow!("failed to bind monitor UDP port {port}: {err}"))?;
    let mut buf = [0u8; BUFFER_SIZE];
    loop {
        let (len, _from) = socket.recv_from(&mut buf).await?;
        let payload = String::from_utf8_lossy(&buf[..len]);
        match parse_datagram(&payload) {
            Some((key, value)) => consumer.report(key, value),
            None => tracing::debug!("monitor: dropping malformed datagram {payload:?}"),
        }
    }
}
