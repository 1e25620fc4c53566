//! Decorative connection indicator. A timestamp is sent to a line echo server and the round
//! trip time of every echoed line is published.

use std::{fmt::Display, time::Duration};

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::watch,
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::utils::clock::Clock;

pub const DEFAULT_ECHO_ADDRESS: &str = "tcpbin.com:4242";
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkStatus {
    Connecting,
    Connected { latency_ms: Option<i64> },
    Offline,
    Error,
}

impl Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkStatus::Connecting => write!(f, "connecting"),
            NetworkStatus::Connected { latency_ms: None } => write!(f, "connected"),
            NetworkStatus::Connected {
                latency_ms: Some(latency),
            } => write!(f, "{latency} ms"),
            NetworkStatus::Offline => write!(f, "offline"),
            NetworkStatus::Error => write!(f, "connection error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub address: String,
    pub ping_interval: Duration,
    pub reconnect_backoff: Duration,
}

impl MonitorConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}

pub struct LatencyMonitor {
    config: MonitorConfig,
    status: watch::Sender<NetworkStatus>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
}

impl LatencyMonitor {
    pub fn new(
        config: MonitorConfig,
        shutdown: CancellationToken,
        clock: Box<dyn Clock>,
    ) -> (Self, watch::Receiver<NetworkStatus>) {
        let (status, receiver) = watch::channel(NetworkStatus::Connecting);
        (
            Self {
                config,
                status,
                shutdown,
                clock,
            },
            receiver,
        )
    }

    /// Keeps a connection open until shutdown, reconnecting after a fixed backoff whenever it
    /// closes or fails.
    pub async fn run(self) -> Result<()> {
        loop {
            self.publish(NetworkStatus::Connecting);
            let result = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                result = self.session() => result,
            };
            match result {
                Ok(()) => {
                    info!("Echo connection to {} closed", self.config.address);
                    self.publish(NetworkStatus::Offline);
                }
                Err(e) => {
                    warn!("Echo connection to {} failed {e:?}", self.config.address);
                    self.publish(NetworkStatus::Error);
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                _ = self.clock.sleep(self.config.reconnect_backoff) => (),
            }
        }
    }

    async fn session(&self) -> Result<()> {
        let stream = TcpStream::connect(&self.config.address).await?;
        let (reader, mut writer) = stream.into_split();
        let mut lines = LinesStream::new(BufReader::new(reader).lines());
        info!("Connected to echo server {}", self.config.address);
        self.publish(NetworkStatus::Connected { latency_ms: None });

        let mut next_ping = self.clock.instant();
        loop {
            tokio::select! {
                _ = self.clock.sleep_until(next_ping) => {
                    let sent = self.clock.time().timestamp_millis();
                    writer.write_all(format!("{sent}\n").as_bytes()).await?;
                    next_ping += self.config.ping_interval;
                }
                line = lines.next() => {
                    let Some(line) = line else {
                        return Ok(());
                    };
                    let line = line?;
                    match line.trim().parse::<i64>() {
                        Ok(sent) => {
                            let latency_ms = self.clock.time().timestamp_millis() - sent;
                            debug!("Echo latency {latency_ms} ms");
                            self.publish(NetworkStatus::Connected {
                                latency_ms: Some(latency_ms),
                            });
                        }
                        Err(_) => debug!("Ignoring echoed line {line:?}"),
                    }
                }
            }
        }
    }

    fn publish(&self, status: NetworkStatus) {
        self.status.send_replace(status);
    }
}
