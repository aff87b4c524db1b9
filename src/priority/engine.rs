//! Reconciliation engine: pure decisions about which device should be default.
//!
//! Nothing here touches the audio system. Callers hand in a fresh snapshot
//! and get back at most one switch per call.

use std::fmt;
use tracing::{debug, info};

use crate::audio::{Device, Role, find_by_name};
use crate::config::Preferences;

/// A device switch the coordinator should apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchAction {
    SetDefaultOutput(Device),
    SetDefaultInput(Device),
}

/// Why a pass ended without a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoActionReason {
    /// Automatic switching is turned off.
    Disabled,
    /// The highest-priority available device is already the default.
    AlreadyDefault { name: String },
    /// No priority output name matches an available device.
    NoPriorityDeviceAvailable,
    /// The input needs correcting but no priority input is available.
    NoCorrectionAvailable { current_input: String },
    /// A priority output is active and the input is not one to avoid.
    InputAcceptable { current_input: String },
    /// The current output is not priority-listed, so the input is left alone.
    PriorityOutputInactive { current_input: String },
    /// The system reports no default device for the role.
    DefaultUnavailable(Role),
    /// The audio system could not be queried.
    QueryFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Switch(SwitchAction),
    NoAction(NoActionReason),
}

impl SwitchAction {
    pub fn role(&self) -> Role {
        match self {
            SwitchAction::SetDefaultOutput(_) => Role::Output,
            SwitchAction::SetDefaultInput(_) => Role::Input,
        }
    }

    pub fn device(&self) -> &Device {
        match self {
            SwitchAction::SetDefaultOutput(device) | SwitchAction::SetDefaultInput(device) => {
                device
            }
        }
    }
}

impl fmt::Display for NoActionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoActionReason::Disabled => write!(f, "automatic switching is disabled"),
            NoActionReason::AlreadyDefault { name } => {
                write!(f, "'{}' is already the default", name)
            }
            NoActionReason::NoPriorityDeviceAvailable => {
                write!(f, "no priority device is available, system default left unchanged")
            }
            NoActionReason::NoCorrectionAvailable { current_input } => write!(
                f,
                "input '{}' should be replaced but no priority input is available",
                current_input
            ),
            NoActionReason::InputAcceptable { current_input } => {
                write!(f, "input '{}' is acceptable", current_input)
            }
            NoActionReason::PriorityOutputInactive { current_input } => write!(
                f,
                "priority output not active, keeping input '{}'",
                current_input
            ),
            NoActionReason::DefaultUnavailable(role) => {
                write!(f, "no default {} device", role)
            }
            NoActionReason::QueryFailed(error) => write!(f, "audio system query failed: {}", error),
        }
    }
}

impl Decision {
    /// Input name to remember as the last known good input, if this decision says so.
    pub fn fallback_input_name(&self) -> Option<&str> {
        match self {
            Decision::NoAction(
                NoActionReason::InputAcceptable { current_input }
                | NoActionReason::PriorityOutputInactive { current_input },
            ) => Some(current_input.as_str()),
            _ => None,
        }
    }

    pub fn action(&self) -> Option<&SwitchAction> {
        match self {
            Decision::Switch(action) => Some(action),
            Decision::NoAction(_) => None,
        }
    }
}

/// Holds the user's preferences and turns device snapshots into decisions.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    preferences: Preferences,
}

impl ReconciliationEngine {
    pub fn new(preferences: Preferences) -> Self {
        Self { preferences }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
    }

    /// Proactive selection: the first priority output that is present wins,
    /// whether or not it is already the default.
    pub fn select_output_device(&self, outputs: &[Device]) -> Decision {
        if !self.preferences.enabled {
            info!("Automatic output switching is disabled");
            return Decision::NoAction(NoActionReason::Disabled);
        }

        for name in self.preferences.priority_outputs.iter() {
            let Some(device) = find_by_name(outputs, name) else {
                debug!("Priority output '{}' is not available", name);
                continue;
            };

            if device.is_default {
                debug!("Highest priority output '{}' is already default", name);
                return Decision::NoAction(NoActionReason::AlreadyDefault {
                    name: name.to_string(),
                });
            }

            info!("Highest priority available output is '{}'", name);
            return Decision::Switch(SwitchAction::SetDefaultOutput(device.clone()));
        }

        info!("No priority output devices available, system default unchanged");
        Decision::NoAction(NoActionReason::NoPriorityDeviceAvailable)
    }

    /// Reactive correction: when a priority output is active and the default
    /// input is itself one of the priority *output* names (an AirPods-style
    /// headset microphone), move the input to the first available priority input.
    pub fn select_input_device(
        &self,
        current_input: Option<&Device>,
        current_output: Option<&Device>,
        inputs: &[Device],
    ) -> Decision {
        if !self.preferences.enabled {
            info!("Input correction is disabled");
            return Decision::NoAction(NoActionReason::Disabled);
        }

        let (current_input, current_output) = match (current_input, current_output) {
            (Some(input), Some(output)) => (input, output),
            (None, _) => {
                info!("Could not get current default input for input check");
                return Decision::NoAction(NoActionReason::DefaultUnavailable(Role::Input));
            }
            (_, None) => {
                info!("Could not get current default output for input check");
                return Decision::NoAction(NoActionReason::DefaultUnavailable(Role::Output));
            }
        };

        let priority_outputs = &self.preferences.priority_outputs;
        let priority_output_active = priority_outputs.contains(&current_output.name);
        // The output list doubles as the list of microphones to avoid
        let input_undesired = priority_outputs.contains(&current_input.name);

        if !priority_output_active {
            debug!(
                "Priority output not active, keeping input '{}' as fallback",
                current_input.name
            );
            return Decision::NoAction(NoActionReason::PriorityOutputInactive {
                current_input: current_input.name.clone(),
            });
        }

        if !input_undesired {
            debug!(
                "Output is '{}', input '{}' is acceptable",
                current_output.name, current_input.name
            );
            return Decision::NoAction(NoActionReason::InputAcceptable {
                current_input: current_input.name.clone(),
            });
        }

        for name in self.preferences.priority_inputs.iter() {
            let Some(target) = find_by_name(inputs, name) else {
                continue;
            };

            if target.id == current_input.id {
                debug!("Preferred input '{}' is already the current input", name);
                return Decision::NoAction(NoActionReason::AlreadyDefault {
                    name: name.to_string(),
                });
            }

            info!(
                "Output is '{}', input '{}' should be corrected to '{}'",
                current_output.name, current_input.name, name
            );
            return Decision::Switch(SwitchAction::SetDefaultInput(target.clone()));
        }

        info!(
            "Output is '{}', input is '{}', but no preferred input device is available",
            current_output.name, current_input.name
        );
        Decision::NoAction(NoActionReason::NoCorrectionAvailable {
            current_input: current_input.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceId;

    fn preferences(outputs: &[&str], inputs: &[&str]) -> Preferences {
        Preferences {
            enabled: true,
            priority_outputs: outputs.iter().copied().collect(),
            priority_inputs: inputs.iter().copied().collect(),
        }
    }

    fn output(id: u32, name: &str) -> Device {
        Device::new(DeviceId(id), name, Role::Output)
    }

    fn input(id: u32, name: &str) -> Device {
        Device::new(DeviceId(id), name, Role::Input)
    }

    #[test]
    fn output_switches_to_first_available_priority() {
        let engine = ReconciliationEngine::new(preferences(&["Missing", "Speakers"], &[]));
        let outputs = vec![output(1, "Built-in").set_default(true), output(2, "Speakers")];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::Switch(SwitchAction::SetDefaultOutput(output(2, "Speakers")))
        );
    }

    #[test]
    fn output_stops_at_first_match_even_when_default() {
        let engine = ReconciliationEngine::new(preferences(&["Speakers", "AirPods"], &[]));
        let outputs = vec![output(1, "Speakers").set_default(true), output(2, "AirPods")];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::NoAction(NoActionReason::AlreadyDefault {
                name: "Speakers".to_string()
            })
        );
    }

    #[test]
    fn output_without_matches_leaves_default_alone() {
        let engine = ReconciliationEngine::new(preferences(&["AirPods"], &[]));
        let outputs = vec![output(1, "Built-in").set_default(true)];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::NoAction(NoActionReason::NoPriorityDeviceAvailable)
        );
    }

    #[test]
    fn input_missing_defaults_is_no_action() {
        let engine = ReconciliationEngine::new(preferences(&["AirPods"], &["Mic"]));
        let airpods_out = output(1, "AirPods");

        assert_eq!(
            engine.select_input_device(None, Some(&airpods_out), &[]),
            Decision::NoAction(NoActionReason::DefaultUnavailable(Role::Input))
        );
        let airpods_in = input(2, "AirPods");
        assert_eq!(
            engine.select_input_device(Some(&airpods_in), None, &[]),
            Decision::NoAction(NoActionReason::DefaultUnavailable(Role::Output))
        );
    }

    #[test]
    fn input_already_preferred_stops_scanning() {
        // The headset itself is listed as an input: nothing to correct
        let engine = ReconciliationEngine::new(preferences(&["AirPods"], &["AirPods", "Mic"]));
        let airpods_out = output(1, "AirPods");
        let airpods_in = input(2, "AirPods");
        let inputs = vec![airpods_in.clone(), input(3, "Mic")];

        assert_eq!(
            engine.select_input_device(Some(&airpods_in), Some(&airpods_out), &inputs),
            Decision::NoAction(NoActionReason::AlreadyDefault {
                name: "AirPods".to_string()
            })
        );
    }

    #[test]
    fn fallback_name_only_for_acceptable_or_inactive() {
        let acceptable = Decision::NoAction(NoActionReason::InputAcceptable {
            current_input: "Mic".to_string(),
        });
        let no_correction = Decision::NoAction(NoActionReason::NoCorrectionAvailable {
            current_input: "AirPods".to_string(),
        });

        assert_eq!(acceptable.fallback_input_name(), Some("Mic"));
        assert_eq!(no_correction.fallback_input_name(), None);
    }
}
