//! Replays an AirPods connect/disconnect against the in-memory catalog,
//! driving the real coordinator the same way the daemon does.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::audio::{ChangeCoordinator, Device, DeviceId, PassOutcome, Role};
use crate::config::Preferences;
use crate::system::{DeviceCatalog, DeviceEvent, EventCallback, MockDeviceCatalog};

const SPEAKERS: DeviceId = DeviceId(1);
const MICROPHONE: DeviceId = DeviceId(2);
const AIRPODS_OUT: DeviceId = DeviceId(10);
const AIRPODS_IN: DeviceId = DeviceId(11);

pub const AIRPODS: &str = "AirPods Pro";
pub const BUILT_IN_OUTPUT: &str = "MacBook Pro Speakers";
pub const BUILT_IN_INPUT: &str = "MacBook Pro Microphone";

/// What happened, step by step, plus where the defaults ended up after each step.
#[derive(Debug, Default)]
pub struct SimulationReport {
    pub lines: Vec<String>,
    pub defaults_after_step: Vec<(Option<String>, Option<String>)>,
}

pub fn simulation_preferences() -> Preferences {
    Preferences {
        enabled: true,
        priority_outputs: [AIRPODS].into_iter().collect(),
        priority_inputs: [BUILT_IN_INPUT].into_iter().collect(),
    }
}

pub fn run_airpods_scenario(preferences: Preferences) -> Result<SimulationReport> {
    let catalog = MockDeviceCatalog::new();
    catalog.add_device(Device::new(SPEAKERS, BUILT_IN_OUTPUT, Role::Output).set_default(true));
    catalog.add_device(Device::new(MICROPHONE, BUILT_IN_INPUT, Role::Input).set_default(true));

    let queue = Arc::new(Mutex::new(VecDeque::new()));
    let sink = Arc::clone(&queue);
    let callback: EventCallback = Arc::new(move |event| {
        if let Ok(mut queue) = sink.lock() {
            queue.push_back(event);
        }
    });

    let mut coordinator = ChangeCoordinator::new(catalog.clone(), preferences, callback);
    let mut report = SimulationReport::default();

    coordinator.start()?;
    report.step(&catalog, "Started with built-in speakers and microphone");

    catalog.connect_device(Device::new(AIRPODS_OUT, AIRPODS, Role::Output));
    catalog.connect_device(Device::new(AIRPODS_IN, AIRPODS, Role::Input));
    report.drain(&mut coordinator, &queue)?;
    report.step(&catalog, "AirPods connected");

    // macOS hands the headset microphone the default input as well
    catalog.change_default(Role::Input, AIRPODS_IN);
    report.drain(&mut coordinator, &queue)?;
    report.step(&catalog, "System made the AirPods microphone the default input");

    catalog.disconnect_device(AIRPODS_OUT);
    catalog.disconnect_device(AIRPODS_IN);
    report.drain(&mut coordinator, &queue)?;
    report.step(&catalog, "AirPods disconnected");

    coordinator.shutdown();
    Ok(report)
}

impl SimulationReport {
    fn drain(
        &mut self,
        coordinator: &mut ChangeCoordinator<MockDeviceCatalog>,
        queue: &Mutex<VecDeque<DeviceEvent>>,
    ) -> Result<()> {
        loop {
            let next = queue
                .lock()
                .map_err(|_| anyhow::anyhow!("Event queue poisoned"))?
                .pop_front();
            let Some(event) = next else {
                return Ok(());
            };

            debug!("Simulated {:?}", event);
            let outcome = match coordinator.handle_event(event) {
                PassOutcome::Unchanged(reason) => format!("no change ({})", reason),
                PassOutcome::Switched(device) => {
                    format!("switched {} to '{}'", device.role, device.name)
                }
                PassOutcome::SwitchFailed { device, error } => {
                    format!("failed to switch to '{}': {}", device.name, error)
                }
            };
            self.lines.push(format!("    {:?}: {}", event, outcome));
        }
    }

    fn step(&mut self, catalog: &MockDeviceCatalog, description: &str) {
        let output = default_name(catalog, Role::Output);
        let input = default_name(catalog, Role::Input);

        self.lines.push(description.to_string());
        self.lines.push(format!(
            "  => output: {}, input: {}",
            output.as_deref().unwrap_or("none"),
            input.as_deref().unwrap_or("none")
        ));
        self.defaults_after_step.push((output, input));
    }
}

fn default_name(catalog: &MockDeviceCatalog, role: Role) -> Option<String> {
    catalog.default_device(role).ok().flatten().map(|device| device.name)
}
