use std::{io, time::Duration};

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    select,
    sync::{mpsc, watch},
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    network::{LatencyMonitor, MonitorConfig, NetworkStatus},
    session::{
        runner::{Command, SessionRunner, HELP},
        SessionController,
    },
    storage::KeyValueStore,
    utils::{clock::DefaultClock, shutdown::detect_shutdown},
};

use super::view::TerminalView;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the interactive session until Ctrl-C, `quit` or the end of stdin.
pub async fn run_foreground<S: KeyValueStore>(
    controller: &mut SessionController<S>,
    echo_address: Option<String>,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn(detect_shutdown(shutdown.clone()));

    let network = echo_address.map(|address| {
        let (monitor, receiver) = LatencyMonitor::new(
            MonitorConfig::new(address),
            shutdown.clone(),
            Box::new(DefaultClock),
        );
        tokio::spawn(async move {
            if let Err(e) = monitor.run().await {
                error!("Latency monitor stopped {e:?}");
            }
        });
        receiver
    });

    let (sender, commands) = mpsc::channel(16);
    tokio::spawn(read_commands(sender, shutdown.clone()));

    println!("{HELP}");
    let mut view = TerminalView::new(io::stdout(), true, true);
    let result = SessionRunner::new(controller, &mut view, commands, network, shutdown.clone())
        .run()
        .await;
    println!();
    shutdown.cancel();
    result
}

/// Forwards parsed stdin lines to the session loop. Lines that aren't commands are reported and
/// dropped.
async fn read_commands(sender: mpsc::Sender<Command>, shutdown: CancellationToken) {
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    loop {
        let line = select! {
            _ = shutdown.cancelled() => break,
            line = lines.next() => line,
        };
        match line {
            Some(Ok(line)) => match line.parse::<Command>() {
                Ok(command) => {
                    if sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => println!("{e}, type help for the list of commands"),
            },
            Some(Err(e)) => {
                error!("Failed to read stdin {e:?}");
                break;
            }
            None => {
                info!("Stdin closed");
                break;
            }
        }
    }
}

/// Connects once to the echo endpoint and waits for the first measured latency.
pub async fn ping(address: String) -> Result<NetworkStatus> {
    let shutdown = CancellationToken::new();
    let (monitor, mut receiver) = LatencyMonitor::new(
        MonitorConfig::new(address),
        shutdown.clone(),
        Box::new(DefaultClock),
    );
    let handle = tokio::spawn(monitor.run());

    let status = tokio::time::timeout(PING_TIMEOUT, first_answer(&mut receiver))
        .await
        .unwrap_or(Ok(NetworkStatus::Offline));
    shutdown.cancel();
    handle.await??;
    status
}

async fn first_answer(receiver: &mut watch::Receiver<NetworkStatus>) -> Result<NetworkStatus> {
    let status = receiver
        .wait_for(|status| {
            matches!(
                status,
                NetworkStatus::Connected {
                    latency_ms: Some(_)
                } | NetworkStatus::Error
                    | NetworkStatus::Offline
            )
        })
        .await?;
    Ok(status.clone())
}
