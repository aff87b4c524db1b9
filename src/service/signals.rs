use anyhow::Result;
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

/// Control messages the daemon loop understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Shutdown,
    Reload,
}

impl SignalType {
    pub fn from_signal(signal: i32) -> Option<Self> {
        match signal {
            SIGTERM | SIGINT => Some(SignalType::Shutdown),
            SIGHUP => Some(SignalType::Reload),
            _ => None,
        }
    }
}

/// Turns SIGTERM/SIGINT into [`SignalType::Shutdown`] and SIGHUP into [`SignalType::Reload`]
pub struct SignalHandler {
    signal_sender: mpsc::UnboundedSender<SignalType>,
}

impl SignalHandler {
    pub fn new(signal_sender: mpsc::UnboundedSender<SignalType>) -> Self {
        Self { signal_sender }
    }

    /// Listen on a background task until shutdown is requested
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.listen_for_signals().await {
                error!("Signal handler error: {}", e);
            }
        })
    }

    pub async fn listen_for_signals(&self) -> Result<()> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP])?;
        info!("Signal handler initialized, listening for SIGTERM, SIGINT, SIGHUP");

        while let Some(signal) = signals.next().await {
            let Some(signal_type) = SignalType::from_signal(signal) else {
                warn!("Received unexpected signal: {}", signal);
                continue;
            };

            match signal_type {
                SignalType::Shutdown => info!(
                    "Received shutdown signal ({}), initiating graceful shutdown",
                    signal
                ),
                SignalType::Reload => info!("Received SIGHUP, reloading configuration"),
            }

            if let Err(e) = self.signal_sender.send(signal_type) {
                warn!("Daemon no longer listening for {:?}: {}", e.0, e);
                break;
            }

            if signal_type == SignalType::Shutdown {
                break;
            }
        }

        Ok(())
    }
}
