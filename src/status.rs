//! Read-only view of the current defaults next to what a pass would do now.

use anyhow::Result;
use std::fmt;

use crate::audio::{Device, Role};
use crate::config::Preferences;
use crate::priority::{Decision, ReconciliationEngine};
use crate::system::DeviceCatalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceStatus {
    pub current_output: Option<Device>,
    pub current_input: Option<Device>,
    pub output_decision: Decision,
    pub input_decision: Decision,
}

impl PreferenceStatus {
    /// Query the catalog once and run both engine functions without applying anything.
    pub fn collect<C: DeviceCatalog>(catalog: &C, preferences: &Preferences) -> Result<Self> {
        let engine = ReconciliationEngine::new(preferences.clone());

        let outputs = catalog.list_devices(Role::Output)?;
        let inputs = catalog.list_devices(Role::Input)?;
        let current_output = catalog.default_device(Role::Output)?;
        let current_input = catalog.default_device(Role::Input)?;

        let output_decision = engine.select_output_device(&outputs);
        let input_decision =
            engine.select_input_device(current_input.as_ref(), current_output.as_ref(), &inputs);

        Ok(Self {
            current_output,
            current_input,
            output_decision,
            input_decision,
        })
    }

    pub fn is_settled(&self) -> bool {
        self.output_decision.action().is_none() && self.input_decision.action().is_none()
    }
}

impl fmt::Display for PreferenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current default devices:")?;
        writeln!(f, "  Output: {}", describe(self.current_output.as_ref()))?;
        writeln!(f, "  Input:  {}", describe(self.current_input.as_ref()))?;
        writeln!(f, "Next pass would:")?;
        writeln!(f, "  Output: {}", describe_decision(&self.output_decision))?;
        write!(f, "  Input:  {}", describe_decision(&self.input_decision))
    }
}

fn describe(device: Option<&Device>) -> String {
    device.map_or_else(|| "None available".to_string(), |d| d.name.clone())
}

fn describe_decision(decision: &Decision) -> String {
    match decision {
        Decision::Switch(action) => format!("switch to '{}'", action.device().name),
        Decision::NoAction(reason) => format!("nothing ({})", reason),
    }
}
