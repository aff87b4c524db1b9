use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::signals::SignalType;
use crate::audio::{ChangeCoordinator, CoordinatorSignal, PassOutcome};
use crate::config::{Config, ConfigLoader};
use crate::notifications::{NotificationManager, NotificationSender};
use crate::system::{DeviceCatalog, DeviceEvent, EventCallback, FileSystemInterface};

const MIN_CHECK_INTERVAL_MS: u64 = 100;

/// Runs the coordinator until told to stop, feeding it device events in
/// arrival order and reloading configuration when the file changes.
pub struct ServiceManager<F: FileSystemInterface> {
    loader: ConfigLoader<F>,
    config: Config,
    last_modified: Option<SystemTime>,
}

impl<F: FileSystemInterface> ServiceManager<F> {
    pub fn new(loader: ConfigLoader<F>, config: Config) -> Self {
        let last_modified = loader.modified_time();
        Self {
            loader,
            config,
            last_modified,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.config.general.check_interval_ms.max(MIN_CHECK_INTERVAL_MS))
    }

    /// Main loop. Returns after a shutdown request, with every listener removed.
    pub async fn run<C, T>(
        &mut self,
        catalog: C,
        mut notifications: NotificationManager<T>,
        mut control: mpsc::UnboundedReceiver<SignalType>,
    ) -> Result<()>
    where
        C: DeviceCatalog,
        T: NotificationSender,
    {
        info!("Starting AirPods Sanity daemon");

        // Callbacks may arrive on the audio system's thread; the channel
        // serializes them onto this task
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<DeviceEvent>();
        let callback: EventCallback = Arc::new(move |event| {
            if event_tx.send(event).is_err() {
                debug!("Dropping {:?}, daemon loop has exited", event);
            }
        });

        let mut coordinator =
            ChangeCoordinator::new(catalog, self.config.preferences.clone(), callback);
        let mut signals = coordinator.signals();
        coordinator.start()?;

        let mut ticker = tokio::time::interval(self.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Daemon started, waiting for device events");

        loop {
            tokio::select! {
                biased;

                message = control.recv() => match message {
                    Some(SignalType::Shutdown) => {
                        info!("Shutdown requested, stopping daemon");
                        break;
                    }
                    Some(SignalType::Reload) => {
                        self.reload(&mut coordinator, &mut notifications);
                    }
                    None => {
                        warn!("Control channel closed, stopping daemon");
                        break;
                    }
                },

                Some(event) = event_rx.recv() => {
                    log_outcome(event, &coordinator.handle_event(event));
                }

                signal = signals.recv() => match signal {
                    Ok(signal) => present(&notifications, &signal),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Skipped {} coordinator signals", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },

                _ = ticker.tick() => {
                    if self.config_changed() {
                        info!("Configuration file changed, reloading");
                        self.reload(&mut coordinator, &mut notifications);
                    }
                }
            }
        }

        coordinator.shutdown();
        info!("Daemon stopped");
        Ok(())
    }

    fn config_changed(&self) -> bool {
        match self.last_modified {
            Some(last_modified) => self
                .loader
                .is_config_modified(last_modified)
                .unwrap_or_else(|e| {
                    debug!("Could not check configuration file: {:#}", e);
                    false
                }),
            None => self.loader.config_exists(),
        }
    }

    // A file that fails to load leaves the running configuration in place
    fn reload<C: DeviceCatalog, T: NotificationSender>(
        &mut self,
        coordinator: &mut ChangeCoordinator<C>,
        notifications: &mut NotificationManager<T>,
    ) {
        self.last_modified = self.loader.modified_time();

        let config = match self.loader.reload_config() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to reload configuration, keeping current: {:#}", e);
                return;
            }
        };

        for warning in config.warnings() {
            warn!("{}", warning);
        }

        coordinator.set_preferences(config.preferences.clone());
        notifications.update_config(&config.notifications);
        self.config = config;
        info!("Configuration reloaded successfully");
    }
}

fn log_outcome(event: DeviceEvent, outcome: &PassOutcome) {
    match outcome {
        PassOutcome::Unchanged(reason) => debug!("{:?} handled, no change: {}", event, reason),
        PassOutcome::Switched(device) => info!("{:?} handled, switched to {}", event, device),
        PassOutcome::SwitchFailed { device, error } => {
            warn!("{:?} handled, switch to {} failed: {}", event, device, error)
        }
    }
}

fn present<T: NotificationSender>(
    notifications: &NotificationManager<T>,
    signal: &CoordinatorSignal,
) {
    if *signal == CoordinatorSignal::RefreshRequested {
        debug!("Device state refreshed");
        return;
    }

    if let Err(e) = notifications.handle_signal(signal) {
        warn!("Failed to send notification: {}", e);
    }
}
