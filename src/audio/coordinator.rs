//! Change coordinator: turns device events into reconciliation passes.
//!
//! Every pass queries a fresh snapshot, asks the engine for a decision and
//! applies it. While a switch it initiated is being applied the coordinator
//! holds no listeners, so the audio system's echo of that switch never comes
//! back in as a new event. Passes take `&mut self`, so at most one is in
//! flight.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::audio::{Device, Role};
use crate::config::Preferences;
use crate::priority::{Decision, NoActionReason, ReconciliationEngine};
use crate::system::{DeviceCatalog, DeviceEvent, EventCallback, ListenerId};

const SIGNAL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Listening,
    Applying,
}

/// Published to whoever presents state to the user (notifications, logs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorSignal {
    /// Device state changed enough that a device list on screen is stale
    RefreshRequested,
    Switched {
        role: Role,
        device_name: String,
    },
    SwitchFailed {
        role: Role,
        device_name: String,
        error: String,
    },
}

/// What a single pass ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Unchanged(NoActionReason),
    Switched(Device),
    SwitchFailed { device: Device, error: String },
}

impl PassOutcome {
    pub fn is_switch(&self) -> bool {
        matches!(self, PassOutcome::Switched(_))
    }
}

pub struct ChangeCoordinator<C: DeviceCatalog> {
    catalog: C,
    engine: ReconciliationEngine,
    state: CoordinatorState,
    subscriptions: Vec<ListenerId>,
    callback: EventCallback,
    fallback_input_name: Option<String>,
    signals: broadcast::Sender<CoordinatorSignal>,
}

impl<C: DeviceCatalog> ChangeCoordinator<C> {
    /// `callback` is what the audio system invokes for every subscribed event,
    /// typically a channel sender feeding [`ChangeCoordinator::handle_event`].
    pub fn new(catalog: C, preferences: Preferences, callback: EventCallback) -> Self {
        let fallback_input_name = match catalog.default_device(Role::Input) {
            Ok(device) => device.map(|d| d.name),
            Err(e) => {
                warn!("Could not read default input at startup: {:#}", e);
                None
            }
        };
        debug!("Initial fallback input: {:?}", fallback_input_name);

        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        Self {
            catalog,
            engine: ReconciliationEngine::new(preferences),
            state: CoordinatorState::Listening,
            subscriptions: Vec::new(),
            callback,
            fallback_input_name,
            signals,
        }
    }

    /// Subscribe, then run one output pass and one input pass.
    pub fn start(&mut self) -> Result<()> {
        info!("Starting change coordinator");
        self.subscribe()?;

        let output = self.run_output_pass();
        let input = self.run_input_pass();
        debug!("Startup passes: output {:?}, input {:?}", output, input);
        Ok(())
    }

    /// Remove every listener. Safe to call any number of times.
    pub fn shutdown(&mut self) {
        if self.subscriptions.is_empty() {
            debug!("Change coordinator already unsubscribed");
            return;
        }
        info!("Stopping change coordinator");
        self.unsubscribe();
    }

    pub fn handle_event(&mut self, event: DeviceEvent) -> PassOutcome {
        debug!("Handling {:?}", event);
        match event {
            DeviceEvent::DeviceListChanged => self.run_output_pass(),
            DeviceEvent::DefaultDeviceChanged(_) => self.run_input_pass(),
        }
    }

    /// Proactive pass: move the output to the best available priority device.
    /// A switch is followed by one input pass against the new output.
    pub fn run_output_pass(&mut self) -> PassOutcome {
        self.state = CoordinatorState::Applying;

        let outcome = match self.catalog.list_devices(Role::Output) {
            Ok(outputs) => {
                let decision = self.engine.select_output_device(&outputs);
                self.apply(decision)
            }
            Err(e) => query_failed("output devices", e),
        };

        // Our own switch is never observed, so the input check it may have
        // made necessary runs here
        if outcome.is_switch() {
            let follow_up = self.run_input_pass();
            debug!("Input pass after output switch: {:?}", follow_up);
        }

        self.publish(CoordinatorSignal::RefreshRequested);
        self.state = CoordinatorState::Listening;
        outcome
    }

    /// Reactive pass: correct the input when a priority output pulled in its microphone.
    pub fn run_input_pass(&mut self) -> PassOutcome {
        self.state = CoordinatorState::Applying;

        let outcome = match self.input_snapshot() {
            Ok((current_input, current_output, inputs)) => {
                let decision = self.engine.select_input_device(
                    current_input.as_ref(),
                    current_output.as_ref(),
                    &inputs,
                );

                if let Some(name) = decision.fallback_input_name() {
                    if self.fallback_input_name.as_deref() != Some(name) {
                        debug!("Fallback input is now '{}'", name);
                        self.fallback_input_name = Some(name.to_string());
                    }
                }

                self.apply(decision)
            }
            Err(e) => query_failed("input state", e),
        };

        if outcome.is_switch() {
            self.publish(CoordinatorSignal::RefreshRequested);
        }
        self.state = CoordinatorState::Listening;
        outcome
    }

    /// Register for all device events. A no-op while already subscribed;
    /// a partial registration is rolled back.
    pub fn subscribe(&mut self) -> Result<()> {
        if !self.subscriptions.is_empty() {
            debug!("Already subscribed to device events");
            return Ok(());
        }

        for event in DeviceEvent::ALL {
            match self.catalog.add_listener(event, Arc::clone(&self.callback)) {
                Ok(id) => self.subscriptions.push(id),
                Err(e) => {
                    self.unsubscribe();
                    return Err(e).with_context(|| format!("Failed to listen for {:?}", event));
                }
            }
        }

        debug!("Subscribed to {} device events", self.subscriptions.len());
        Ok(())
    }

    pub fn is_subscribed(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Last input seen as acceptable. Kept for diagnostics only.
    pub fn fallback_input_name(&self) -> Option<&str> {
        self.fallback_input_name.as_deref()
    }

    pub fn preferences(&self) -> &Preferences {
        self.engine.preferences()
    }

    /// New preferences take effect on the next pass.
    pub fn set_preferences(&mut self, preferences: Preferences) {
        info!(
            "Preferences updated: enabled={}, {} priority outputs, {} priority inputs",
            preferences.enabled,
            preferences.priority_outputs.len(),
            preferences.priority_inputs.len()
        );
        self.engine.set_preferences(preferences);
    }

    pub fn signals(&self) -> broadcast::Receiver<CoordinatorSignal> {
        self.signals.subscribe()
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    fn input_snapshot(&self) -> Result<(Option<Device>, Option<Device>, Vec<Device>)> {
        let current_input = self.catalog.default_device(Role::Input)?;
        let current_output = self.catalog.default_device(Role::Output)?;
        let inputs = self.catalog.list_devices(Role::Input)?;
        Ok((current_input, current_output, inputs))
    }

    fn apply(&mut self, decision: Decision) -> PassOutcome {
        let action = match decision {
            Decision::NoAction(reason) => {
                debug!("No change: {}", reason);
                return PassOutcome::Unchanged(reason);
            }
            Decision::Switch(action) => action,
        };

        let role = action.role();
        let device = action.device().clone();
        info!("Switching default {} to '{}'", role, device.name);

        let result = self.with_listeners_suspended(|catalog| {
            catalog.set_default_device(role, device.id)
        });

        match result {
            Ok(()) => {
                info!("Default {} is now '{}'", role, device.name);
                self.publish(CoordinatorSignal::Switched {
                    role,
                    device_name: device.name.clone(),
                });
                PassOutcome::Switched(device)
            }
            Err(e) => {
                error!("Failed to set default {} to '{}': {:#}", role, device.name, e);
                let error = format!("{:#}", e);
                self.publish(CoordinatorSignal::SwitchFailed {
                    role,
                    device_name: device.name.clone(),
                    error: error.clone(),
                });
                PassOutcome::SwitchFailed { device, error }
            }
        }
    }

    // Listeners come back whatever the outcome of `change`
    fn with_listeners_suspended<T>(&mut self, change: impl FnOnce(&C) -> T) -> T {
        let was_subscribed = self.is_subscribed();
        if was_subscribed {
            self.unsubscribe();
        }

        let result = change(&self.catalog);

        if was_subscribed {
            if let Err(e) = self.subscribe() {
                error!("Failed to restore device listeners: {:#}", e);
            }
        }
        result
    }

    fn unsubscribe(&mut self) {
        for id in self.subscriptions.drain(..) {
            if let Err(e) = self.catalog.remove_listener(id) {
                warn!("Failed to remove listener {:?}: {:#}", id, e);
            }
        }
    }

    fn publish(&self, signal: CoordinatorSignal) {
        // No receivers is fine: nobody is presenting anything
        let _ = self.signals.send(signal);
    }
}

impl<C: DeviceCatalog> Drop for ChangeCoordinator<C> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn query_failed(what: &str, error: anyhow::Error) -> PassOutcome {
    warn!("Could not read {}, skipping pass: {:#}", what, error);
    PassOutcome::Unchanged(NoActionReason::QueryFailed(format!("{:#}", error)))
}
